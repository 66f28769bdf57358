//! Quantities in consensus JSON are decimal strings. This module serializes
//! integers as strings and accepts either form on input.

use core::{
    fmt::{self, Display},
    marker::PhantomData,
    str::FromStr,
};

use serde::{
    de::{Error as _, Visitor},
    Deserializer, Serializer,
};

pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: FromStr + TryFrom<u64>,
    <T as FromStr>::Err: Display,
    D: Deserializer<'de>,
{
    struct StringOrNative<T>(PhantomData<T>);

    impl<T> Visitor<'_> for StringOrNative<T>
    where
        T: FromStr + TryFrom<u64>,
        <T as FromStr>::Err: Display,
    {
        type Value = T;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a decimal string or an integer")
        }

        fn visit_str<E: serde::de::Error>(self, string: &str) -> Result<T, E> {
            string.parse().map_err(E::custom)
        }

        fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<T, E> {
            T::try_from(value).map_err(|_| E::custom("integer out of range"))
        }
    }

    deserializer.deserialize_any(StringOrNative(PhantomData))
}
