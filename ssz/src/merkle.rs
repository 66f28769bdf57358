use hashing::{hash_256_256, zero_hash};
use primitive_types::H256;

use crate::BYTES_PER_CHUNK;

/// Merkleizes `chunks` into a tree padded with zero hashes up to `chunk_limit`
/// leaves. `chunks` must not be longer than `chunk_limit`.
#[must_use]
pub fn merkleize_chunks(chunks: &[H256], chunk_limit: u64) -> H256 {
    assert!(
        (chunks.len() as u64) <= chunk_limit.max(1),
        "merkleize_chunks called with more chunks than the limit allows",
    );

    let depth = chunk_limit
        .max(1)
        .next_power_of_two()
        .trailing_zeros() as usize;

    if chunks.is_empty() {
        return zero_hash(depth);
    }

    let mut layer = chunks.to_vec();

    for height in 0..depth {
        if layer.len() % 2 == 1 {
            layer.push(zero_hash(height));
        }

        layer = layer
            .chunks_exact(2)
            .map(|pair| hash_256_256(pair[0], pair[1]))
            .collect();
    }

    layer[0]
}

/// Packs `bytes` into 32-byte chunks and merkleizes them with `chunk_limit`.
#[must_use]
pub fn merkleize_bytes(bytes: &[u8], chunk_limit: u64) -> H256 {
    let chunks = bytes
        .chunks(BYTES_PER_CHUNK)
        .map(|chunk| {
            let mut padded = [0_u8; BYTES_PER_CHUNK];
            padded[..chunk.len()].copy_from_slice(chunk);
            H256(padded)
        })
        .collect::<Vec<_>>();

    merkleize_chunks(&chunks, chunk_limit)
}

/// Merkleizes the field roots of a container. The limit is the field count.
#[must_use]
pub fn merkleize_fields(roots: &[H256]) -> H256 {
    merkleize_chunks(roots, roots.len() as u64)
}

#[must_use]
pub fn mix_in_length(root: H256, length: usize) -> H256 {
    let mut length_chunk = [0_u8; BYTES_PER_CHUNK];
    length_chunk[..8].copy_from_slice(&(length as u64).to_le_bytes());
    hash_256_256(root, H256(length_chunk))
}

#[must_use]
pub(crate) fn chunk_count(bit_or_byte_count: usize, per_chunk: usize) -> u64 {
    (bit_or_byte_count as u64).div_ceil(per_chunk as u64)
}
