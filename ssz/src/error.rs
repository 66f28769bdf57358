use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("bit index {index} is out of bounds for length {length}")]
    BitIndexOutOfBounds { index: usize, length: usize },
    #[error("container holds {actual} elements, more than the maximum of {maximum}")]
    TooManyElements { actual: usize, maximum: usize },
    #[error("byte container holds {actual} bytes, more than the maximum of {maximum}")]
    TooManyBytes { actual: usize, maximum: usize },
    #[error("hex string is missing the 0x prefix")]
    MissingHexPrefix,
    #[error("hex string contains invalid digits")]
    InvalidHexDigits,
    #[error("bit list encoding is missing the delimiter bit")]
    MissingDelimiterBit,
    #[error("fixed-size container encoding has wrong length (actual: {actual}, expected: {expected})")]
    WrongEncodingLength { actual: usize, expected: usize },
}
