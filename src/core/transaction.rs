use crate::core::Amount;
use crate::error::{LedgerError, Result};
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reserved sender of subsidy transactions
pub const MINT_SENDER: &str = "0";

/// Opaque account identifier. The core never interprets its contents.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Boundary constructor: rejects empty and whitespace-only identifiers
    pub fn new(address: impl Into<String>) -> Result<Address> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(LedgerError::InvalidAddress(
                "address must not be empty".to_string(),
            ));
        }
        Ok(Address(address))
    }

    pub fn mint() -> Address {
        Address(MINT_SENDER.to_string())
    }

    pub fn is_mint(&self) -> bool {
        self.0 == MINT_SENDER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Address> {
        Address::new(s)
    }
}

/// A transfer of `amount` from `sender` to `recipient`.
///
/// Transactions sent by [`MINT_SENDER`] credit the recipient without
/// debiting anyone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    sender: Address,
    recipient: Address,
    amount: Amount,
    timestamp: f64,
}

impl Transaction {
    pub fn new(sender: Address, recipient: Address, amount: Amount) -> Result<Transaction> {
        Ok(Transaction {
            sender,
            recipient,
            amount,
            timestamp: current_timestamp()?,
        })
    }

    /// Subsidy paid to a miner
    pub fn new_mint(recipient: Address, amount: Amount) -> Result<Transaction> {
        Self::new(Address::mint(), recipient, amount)
    }

    /// Rebuild a transaction read back from the store
    pub(crate) fn from_parts(
        sender: Address,
        recipient: Address,
        amount: Amount,
        timestamp: f64,
    ) -> Transaction {
        Transaction {
            sender,
            recipient,
            amount,
            timestamp,
        }
    }

    pub fn is_mint(&self) -> bool {
        self.sender.is_mint()
    }

    pub fn get_sender(&self) -> &Address {
        &self.sender
    }

    pub fn get_recipient(&self) -> &Address {
        &self.recipient
    }

    pub fn get_amount(&self) -> Amount {
        self.amount
    }

    pub fn get_timestamp(&self) -> f64 {
        self.timestamp
    }
}
