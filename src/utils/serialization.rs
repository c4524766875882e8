// Bincode layer for everything the ledger writes into sled
use crate::error::{LedgerError, Result};

/// Encode a store record with the standard bincode configuration
pub fn serialize<T: bincode::Encode>(record: &T) -> Result<Vec<u8>> {
    bincode::encode_to_vec(record, bincode::config::standard())
        .map_err(|e| LedgerError::Serialization(format!("Failed to encode record: {e}")))
}

/// Decode a store record, rejecting trailing bytes
pub fn deserialize<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T> {
    let (record, read) = bincode::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| LedgerError::Serialization(format!("Failed to decode record: {e}")))?;
    if read != bytes.len() {
        return Err(LedgerError::Serialization(format!(
            "Record has {} trailing bytes",
            bytes.len() - read
        )));
    }
    Ok(record)
}
