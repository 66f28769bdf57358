pub mod altair;
pub mod bellatrix;
pub mod combined;
pub mod config;
pub mod nonstandard;
pub mod phase0;
pub mod preset;
