//! Canonical block digest
//!
//! Blocks are rendered through `serde_json::Value`, whose object maps keep
//! their keys sorted, so the same logical block always produces the same
//! bytes no matter how the struct fields are declared.

use crate::core::Block;
use crate::error::Result;
use crate::utils::sha256_hex;

/// Canonical JSON encoding of a block with lexicographically ordered keys
pub fn canonical_bytes(block: &Block) -> Result<Vec<u8>> {
    let value = serde_json::to_value(block)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Lowercase hex SHA-256 of the canonical encoding
pub fn hash_block(block: &Block) -> Result<String> {
    Ok(sha256_hex(&canonical_bytes(block)?))
}
