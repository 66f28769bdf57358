use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};

use crate::Error;

pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let string = String::deserialize(deserializer)?;
    decode(&string).map_err(D::Error::custom)
}

pub fn decode(string: &str) -> Result<Vec<u8>, Error> {
    let digits = string.strip_prefix("0x").ok_or(Error::MissingHexPrefix)?;
    hex::decode(digits).map_err(|_| Error::InvalidHexDigits)
}
