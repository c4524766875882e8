use crate::core::{Amount, DifficultyAdjustment, RewardSchedule};
use crate::core::{HALVING_INTERVAL, INITIAL_BLOCK_REWARD, MAX_SUPPLY};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

static DEFAULT_DB_PATH: &str = "data";

const DB_PATH_KEY: &str = "LEDGER_DB_PATH";
const INITIAL_DIFFICULTY_KEY: &str = "LEDGER_INITIAL_DIFFICULTY";
const NODE_ID_KEY: &str = "LEDGER_NODE_ID";
const AMOUNT_POLICY_KEY: &str = "LEDGER_AMOUNT_POLICY";

/// What a submission may carry as its amount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountPolicy {
    /// Any finite amount, zero and negative included
    #[default]
    Permissive,
    /// Strictly positive amounts only
    PositiveOnly,
}

impl AmountPolicy {
    pub fn check(self, amount: Amount) -> Result<()> {
        match self {
            AmountPolicy::Permissive => Ok(()),
            AmountPolicy::PositiveOnly if amount.is_positive() => Ok(()),
            AmountPolicy::PositiveOnly => Err(LedgerError::InvalidAmount(format!(
                "{amount} is not positive"
            ))),
        }
    }
}

impl FromStr for AmountPolicy {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "permissive" => Ok(AmountPolicy::Permissive),
            "positive_only" | "positive-only" => Ok(AmountPolicy::PositiveOnly),
            _ => Err(LedgerError::Config(format!(
                "Invalid amount policy: {s}. Valid options: permissive, positive_only"
            ))),
        }
    }
}

impl fmt::Display for AmountPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountPolicy::Permissive => write!(f, "permissive"),
            AmountPolicy::PositiveOnly => write!(f, "positive_only"),
        }
    }
}

/// Everything needed to open a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub db_path: PathBuf,
    pub initial_difficulty: u32,
    pub base_reward: f64,
    pub halving_interval: u64,
    pub max_supply: f64,
    pub adjustment_interval: usize,
    pub fast_span_secs: f64,
    pub slow_span_secs: f64,
    pub amount_policy: AmountPolicy,
    /// Identity of this node; generated and persisted on first open when unset
    pub node_id: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            initial_difficulty: DifficultyAdjustment::get_initial_difficulty(),
            base_reward: INITIAL_BLOCK_REWARD,
            halving_interval: HALVING_INTERVAL,
            max_supply: MAX_SUPPLY,
            adjustment_interval: 10,
            fast_span_secs: 50.0,
            slow_span_secs: 100.0,
            amount_policy: AmountPolicy::Permissive,
            node_id: None,
        }
    }
}

impl LedgerConfig {
    /// Defaults, then the optional TOML file, then environment overrides
    pub fn load(file: Option<&Path>) -> Result<LedgerConfig> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => LedgerConfig::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<LedgerConfig> {
        let text = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<LedgerConfig> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `LEDGER_*` overrides looked up through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(DB_PATH_KEY) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(difficulty) = lookup(INITIAL_DIFFICULTY_KEY) {
            self.initial_difficulty = difficulty.trim().parse().map_err(|e| {
                LedgerError::Config(format!("{INITIAL_DIFFICULTY_KEY}={difficulty}: {e}"))
            })?;
        }
        if let Some(node_id) = lookup(NODE_ID_KEY) {
            self.node_id = Some(node_id);
        }
        if let Some(policy) = lookup(AMOUNT_POLICY_KEY) {
            self.amount_policy = policy.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_difficulty == 0 {
            return Err(LedgerError::Config(
                "Initial difficulty must be at least 1".to_string(),
            ));
        }
        if self.adjustment_interval == 0 {
            return Err(LedgerError::Config(
                "Adjustment interval must be at least 1 block".to_string(),
            ));
        }
        if !(self.fast_span_secs.is_finite() && self.slow_span_secs.is_finite())
            || self.fast_span_secs > self.slow_span_secs
        {
            return Err(LedgerError::Config(format!(
                "Span thresholds must be finite with fast ({}) <= slow ({})",
                self.fast_span_secs, self.slow_span_secs
            )));
        }
        if let Some(node_id) = &self.node_id {
            if node_id.trim().is_empty() {
                return Err(LedgerError::Config("Node id must not be empty".to_string()));
            }
        }
        self.reward_schedule().map(|_| ())
    }

    pub fn reward_schedule(&self) -> Result<RewardSchedule> {
        let base = Amount::new(self.base_reward)
            .map_err(|e| LedgerError::Config(format!("base_reward: {e}")))?;
        let cap = Amount::new(self.max_supply)
            .map_err(|e| LedgerError::Config(format!("max_supply: {e}")))?;
        RewardSchedule::new(base, self.halving_interval, cap)
    }

    pub fn difficulty_adjustment(&self) -> DifficultyAdjustment {
        DifficultyAdjustment::new(
            self.adjustment_interval,
            self.fast_span_secs,
            self.slow_span_secs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_ledger_constants() {
        let config = LedgerConfig::default();
        assert_eq!(config.initial_difficulty, 4);
        assert_eq!(config.base_reward, 50.0);
        assert_eq!(config.halving_interval, 210_000);
        assert_eq!(config.max_supply, 21_000_000.0);
        assert_eq!(config.amount_policy, AmountPolicy::Permissive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LedgerConfig::from_toml_str(
            r#"
            db_path = "/tmp/ledger"
            initial_difficulty = 2
            amount_policy = "positive_only"
            "#,
        )
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/ledger"));
        assert_eq!(config.initial_difficulty, 2);
        assert_eq!(config.amount_policy, AmountPolicy::PositiveOnly);
        assert_eq!(config.halving_interval, HALVING_INTERVAL);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let result = LedgerConfig::from_toml_str("initial_difficulty = \"hard\"");
        assert!(matches!(result, Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (DB_PATH_KEY, "/var/lib/ledger"),
            (INITIAL_DIFFICULTY_KEY, "3"),
            (NODE_ID_KEY, "node-7"),
            (AMOUNT_POLICY_KEY, "positive-only"),
        ]
        .into_iter()
        .collect();

        let mut config = LedgerConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/var/lib/ledger"));
        assert_eq!(config.initial_difficulty, 3);
        assert_eq!(config.node_id.as_deref(), Some("node-7"));
        assert_eq!(config.amount_policy, AmountPolicy::PositiveOnly);
    }

    #[test]
    fn test_bad_override_rejected() {
        let mut config = LedgerConfig::default();
        let result = config.apply_overrides(|key| {
            (key == INITIAL_DIFFICULTY_KEY).then(|| "many".to_string())
        });
        assert!(matches!(result, Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let invalid = [
            LedgerConfig {
                initial_difficulty: 0,
                ..LedgerConfig::default()
            },
            LedgerConfig {
                halving_interval: 0,
                ..LedgerConfig::default()
            },
            LedgerConfig {
                adjustment_interval: 0,
                ..LedgerConfig::default()
            },
            LedgerConfig {
                fast_span_secs: 200.0,
                ..LedgerConfig::default()
            },
            LedgerConfig {
                max_supply: f64::NAN,
                ..LedgerConfig::default()
            },
            LedgerConfig {
                base_reward: -1.0,
                ..LedgerConfig::default()
            },
        ];
        for config in invalid {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn test_amount_policy() {
        let zero = Amount::ZERO;
        let negative = Amount::new(-1.0).unwrap();
        let positive = Amount::new(0.5).unwrap();

        assert!(AmountPolicy::Permissive.check(zero).is_ok());
        assert!(AmountPolicy::Permissive.check(negative).is_ok());
        assert!(AmountPolicy::PositiveOnly.check(positive).is_ok());
        assert!(AmountPolicy::PositiveOnly.check(zero).is_err());
        assert!(AmountPolicy::PositiveOnly.check(negative).is_err());
        assert!("strict".parse::<AmountPolicy>().is_err());
    }
}
