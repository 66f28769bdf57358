//! The subset of SSZ the duty engine needs: hash tree roots and the bounded
//! container types that appear in consensus objects. Serialization to JSON
//! uses the canonical `0x`-prefixed hex form for bit and byte containers and
//! is provided through `serde`. Full SSZ byte-level encoding is not needed
//! here; collaborators that persist state own their own formats.

pub use primitive_types::H256;

pub use crate::{
    bitfields::{BitList, BitVector},
    bytes::{ByteList, ByteVector},
    contiguous_list::ContiguousList,
    error::Error,
    merkle::{merkleize_bytes, merkleize_chunks, merkleize_fields, mix_in_length},
    ssz_hash::SszHash,
};

mod bitfields;
mod bytes;
mod contiguous_list;
mod error;
mod merkle;
mod ssz_hash;

pub(crate) mod hex_string;

pub const BYTES_PER_CHUNK: usize = 32;
