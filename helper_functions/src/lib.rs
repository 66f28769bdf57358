pub mod error;
pub mod misc;
pub mod predicates;
pub mod signing;
