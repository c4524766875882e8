//! Test utilities for ledger testing

use crate::config::LedgerConfig;
use crate::core::{Address, Amount, Blockchain};
use crate::error::{LedgerError, Result};
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| LedgerError::Io(e.to_string()))
}

/// Configuration pointing into `dir`, at difficulty 1 for fast tests
pub fn test_config(dir: &TempDir) -> LedgerConfig {
    LedgerConfig {
        db_path: dir.path().join("test_ledger"),
        initial_difficulty: 1,
        ..LedgerConfig::default()
    }
}

/// Create a test blockchain with temporary storage
pub fn create_test_blockchain() -> Result<(Blockchain, TempDir)> {
    create_test_blockchain_with(|_| {})
}

/// Same as [`create_test_blockchain`], with a chance to tweak the config
pub fn create_test_blockchain_with<F>(customize: F) -> Result<(Blockchain, TempDir)>
where
    F: FnOnce(&mut LedgerConfig),
{
    let temp_dir = create_temp_dir()?;
    let mut config = test_config(&temp_dir);
    customize(&mut config);
    let blockchain = Blockchain::open(&config)?;
    Ok((blockchain, temp_dir))
}

pub fn address(name: &str) -> Address {
    Address::new(name).unwrap()
}

pub fn amount(value: f64) -> Amount {
    Amount::new(value).unwrap()
}
