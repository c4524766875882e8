//! Monetary types and the block subsidy schedule
//!
//! Amounts are real-valued like the rest of the ledger, so the subsidy
//! halves forever without ever reaching zero. Supply exhaustion is detected
//! only by comparing against the cap.

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

/// Base subsidy paid to the miner of a block before any halving
pub const INITIAL_BLOCK_REWARD: f64 = 50.0;

/// Number of blocks between two subsidy halvings
pub const HALVING_INTERVAL: u64 = 210_000;

/// Maximum amount that can ever be minted
pub const MAX_SUPPLY: f64 = 21_000_000.0;

/// A ledger amount. Always finite; its sign is left to the amount policy.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
#[serde(transparent)]
pub struct Amount(f64);

impl Amount {
    pub const ZERO: Amount = Amount(0.0);

    pub fn new(value: f64) -> Result<Amount> {
        if !value.is_finite() {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} is not a finite number"
            )));
        }
        Ok(Amount(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0.0
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Amount> {
        let value = s
            .trim()
            .parse::<f64>()
            .map_err(|e| LedgerError::InvalidAmount(format!("{s}: {e}")))?;
        Amount::new(value)
    }
}

/// Halving subsidy bounded by a maximum supply
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardSchedule {
    base_reward: Amount,
    halving_interval: u64,
    max_supply: Amount,
}

impl Default for RewardSchedule {
    fn default() -> Self {
        RewardSchedule {
            base_reward: Amount(INITIAL_BLOCK_REWARD),
            halving_interval: HALVING_INTERVAL,
            max_supply: Amount(MAX_SUPPLY),
        }
    }
}

impl RewardSchedule {
    pub fn new(base_reward: Amount, halving_interval: u64, max_supply: Amount) -> Result<Self> {
        if halving_interval == 0 {
            return Err(LedgerError::Config(
                "Halving interval must be at least one block".to_string(),
            ));
        }
        if base_reward.value() < 0.0 || max_supply.value() < 0.0 {
            return Err(LedgerError::Config(format!(
                "Reward ({base_reward}) and max supply ({max_supply}) must not be negative"
            )));
        }
        Ok(RewardSchedule {
            base_reward,
            halving_interval,
            max_supply,
        })
    }

    /// Subsidy for the block sealed on top of a chain of `chain_length` blocks.
    pub fn reward(&self, chain_length: usize) -> Amount {
        let halvings = chain_length as u64 / self.halving_interval;
        // 0.5^1075 is already zero in f64; clamping keeps powi in range
        let exponent = halvings.min(i32::MAX as u64) as i32;
        Amount(self.base_reward.0 * 0.5f64.powi(exponent))
    }

    /// Whether minting `reward` on top of `current_supply` stays within the cap
    pub fn within_cap(&self, current_supply: Amount, reward: Amount) -> bool {
        current_supply.0 + reward.0 <= self.max_supply.0
    }

    pub fn remaining(&self, current_supply: Amount) -> Amount {
        Amount((self.max_supply.0 - current_supply.0).max(0.0))
    }

    pub fn base_reward(&self) -> Amount {
        self.base_reward
    }

    pub fn halving_interval(&self) -> u64 {
        self.halving_interval
    }

    pub fn max_supply(&self) -> Amount {
        self.max_supply
    }
}
