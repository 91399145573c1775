use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::domain::DEFAULT_TRADE_LOCK_WEEKS;
use crate::engine::quota::{DEFAULT_FA_LIMIT, DEFAULT_TRADE_LIMIT};
use crate::engine::rating::{DEFAULT_K_FACTOR, DEFAULT_PLACEMENT_BASE, DEFAULT_PLACEMENT_SEASON_STEP};
use crate::engine::{PlacementTable, QuotaLimits, RatingModel};
use crate::ledger::{LedgerConfig, DEFAULT_MAX_TRADE_UNITS};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Admin endpoints are open when unset.
    pub admin_token: Option<String>,
    pub k_factor: f64,
    pub placement_base: f64,
    pub placement_season_step: f64,
    pub placement_divisions: Vec<(String, f64)>,
    pub trade_lock_weeks: i32,
    pub fa_transaction_limit: i64,
    pub trade_transaction_limit: i64,
    pub enforce_transaction_limits: bool,
    pub max_trade_units: usize,
    pub replay_fetch_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let admin_token = env_map
            .get("ADMIN_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let k_factor = parse_or(&env_map, "ELO_K_FACTOR", DEFAULT_K_FACTOR, "must be a number")?;
        if !(k_factor.is_finite() && k_factor > 0.0) {
            return Err(ConfigError::InvalidValue(
                "ELO_K_FACTOR".to_string(),
                "must be positive".to_string(),
            ));
        }
        let placement_base = parse_or(
            &env_map,
            "PLACEMENT_BASE",
            DEFAULT_PLACEMENT_BASE,
            "must be a number",
        )?;
        if !placement_base.is_finite() {
            return Err(ConfigError::InvalidValue(
                "PLACEMENT_BASE".to_string(),
                "must be finite".to_string(),
            ));
        }
        // Later seasons never seed lower than earlier ones.
        let placement_season_step = parse_or(
            &env_map,
            "PLACEMENT_SEASON_STEP",
            DEFAULT_PLACEMENT_SEASON_STEP,
            "must be a number",
        )?;
        if !(placement_season_step.is_finite() && placement_season_step >= 0.0) {
            return Err(ConfigError::InvalidValue(
                "PLACEMENT_SEASON_STEP".to_string(),
                "must be a non-negative number".to_string(),
            ));
        }
        let placement_divisions = match env_map.get("PLACEMENT_DIVISIONS") {
            Some(raw) => parse_division_bonuses(raw)?,
            None => Vec::new(),
        };

        let trade_lock_weeks = parse_or(
            &env_map,
            "TRADE_LOCK_WEEKS",
            DEFAULT_TRADE_LOCK_WEEKS,
            "must be a valid i32",
        )?;
        if trade_lock_weeks < 0 {
            return Err(ConfigError::InvalidValue(
                "TRADE_LOCK_WEEKS".to_string(),
                "must not be negative".to_string(),
            ));
        }
        let fa_transaction_limit = parse_or(
            &env_map,
            "FA_TRANSACTION_LIMIT",
            DEFAULT_FA_LIMIT,
            "must be a valid i64",
        )?;
        let trade_transaction_limit = parse_or(
            &env_map,
            "TRADE_TRANSACTION_LIMIT",
            DEFAULT_TRADE_LIMIT,
            "must be a valid i64",
        )?;
        for (key, limit) in [
            ("FA_TRANSACTION_LIMIT", fa_transaction_limit),
            ("TRADE_TRANSACTION_LIMIT", trade_transaction_limit),
        ] {
            if limit < 0 {
                return Err(ConfigError::InvalidValue(
                    key.to_string(),
                    "must not be negative".to_string(),
                ));
            }
        }
        let enforce_transaction_limits = match env_map
            .get("ENFORCE_TRANSACTION_LIMITS")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "ENFORCE_TRANSACTION_LIMITS".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };
        let max_trade_units = parse_or(
            &env_map,
            "MAX_TRADE_UNITS",
            DEFAULT_MAX_TRADE_UNITS,
            "must be a valid usize",
        )?;
        if !(1..=DEFAULT_MAX_TRADE_UNITS).contains(&max_trade_units) {
            return Err(ConfigError::InvalidValue(
                "MAX_TRADE_UNITS".to_string(),
                format!("must be between 1 and {}", DEFAULT_MAX_TRADE_UNITS),
            ));
        }

        let timeout_secs = parse_or(
            &env_map,
            "REPLAY_FETCH_TIMEOUT_SECS",
            30u64,
            "must be a whole number of seconds",
        )?;

        Ok(Config {
            port,
            database_path,
            admin_token,
            k_factor,
            placement_base,
            placement_season_step,
            placement_divisions,
            trade_lock_weeks,
            fa_transaction_limit,
            trade_transaction_limit,
            enforce_transaction_limits,
            max_trade_units,
            replay_fetch_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn rating_model(&self) -> RatingModel {
        RatingModel::new(
            self.k_factor,
            PlacementTable::new(
                self.placement_base,
                self.placement_season_step,
                self.placement_divisions.clone(),
            ),
        )
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            trade_lock_weeks: self.trade_lock_weeks,
            max_trade_units: self.max_trade_units,
            quota: QuotaLimits {
                fa_limit: self.fa_transaction_limit,
                trade_limit: self.trade_transaction_limit,
            },
            enforce_quota: self.enforce_transaction_limits,
        }
    }
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    expectation: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), expectation.to_string())),
        None => Ok(default),
    }
}

/// `Premier:50,Challenger:0` into (division, bonus) pairs.
fn parse_division_bonuses(raw: &str) -> Result<Vec<(String, f64)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let invalid = || {
                ConfigError::InvalidValue(
                    "PLACEMENT_DIVISIONS".to_string(),
                    format!("expected name:bonus, got {}", pair),
                )
            };
            let (name, bonus) = pair.rsplit_once(':').ok_or_else(invalid)?;
            let name = name.trim();
            if name.is_empty() {
                return Err(invalid());
            }
            let bonus = bonus.trim().parse::<f64>().map_err(|_| invalid())?;
            if !(bonus.is_finite() && bonus >= 0.0) {
                return Err(ConfigError::InvalidValue(
                    "PLACEMENT_DIVISIONS".to_string(),
                    format!("bonus for {} must be a non-negative number", name),
                ));
            }
            Ok((name.to_string(), bonus))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.admin_token, None);
        assert_eq!(config.k_factor, 32.0);
        assert_eq!(config.trade_lock_weeks, 2);
        assert_eq!(config.max_trade_units, 3);
        assert!(!config.enforce_transaction_limits);
        assert_eq!(config.replay_fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.ledger_config(), LedgerConfig::default());
        assert_eq!(config.rating_model().placement, PlacementTable::default());
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_placement_divisions() {
        let mut env_map = setup_required_env();
        env_map.insert(
            "PLACEMENT_DIVISIONS".to_string(),
            " Premier:50, Challenger:0 ,".to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(
            config.placement_divisions,
            vec![("Premier".to_string(), 50.0), ("Challenger".to_string(), 0.0)]
        );
        assert_eq!(config.rating_model().placement_rating(2, "premier"), 1060.0);
    }

    #[test]
    fn test_invalid_placement_divisions() {
        let mut env_map = setup_required_env();
        env_map.insert("PLACEMENT_DIVISIONS".to_string(), "Premier=50".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PLACEMENT_DIVISIONS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_enforced_limits_and_admin_token() {
        let mut env_map = setup_required_env();
        env_map.insert("ENFORCE_TRANSACTION_LIMITS".to_string(), "TRUE".to_string());
        env_map.insert("FA_TRANSACTION_LIMIT".to_string(), "4".to_string());
        env_map.insert("ADMIN_TOKEN".to_string(), "s3cret".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        let ledger = config.ledger_config();
        assert!(ledger.enforce_quota);
        assert_eq!(ledger.quota.fa_limit, 4);
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_invalid_k_factor() {
        let mut env_map = setup_required_env();
        env_map.insert("ELO_K_FACTOR".to_string(), "-4".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "ELO_K_FACTOR"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    fn rejected_key(key: &str, value: &str) -> String {
        let mut env_map = setup_required_env();
        env_map.insert(key.to_string(), value.to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => k,
            other => panic!("Expected InvalidValue for {}={}, got {:?}", key, value, other),
        }
    }

    #[test]
    fn test_placement_step_must_not_lower_later_seasons() {
        assert_eq!(rejected_key("PLACEMENT_SEASON_STEP", "-50"), "PLACEMENT_SEASON_STEP");
        assert_eq!(rejected_key("PLACEMENT_SEASON_STEP", "NaN"), "PLACEMENT_SEASON_STEP");
        assert_eq!(rejected_key("PLACEMENT_BASE", "inf"), "PLACEMENT_BASE");

        let mut env_map = setup_required_env();
        env_map.insert("PLACEMENT_SEASON_STEP".to_string(), "0".to_string());
        let model = Config::from_env_map(env_map).unwrap().rating_model();
        assert!(model.placement_rating(3, "Premier") >= model.placement_rating(1, "Premier"));
    }

    #[test]
    fn test_division_bonus_must_be_non_negative() {
        assert_eq!(rejected_key("PLACEMENT_DIVISIONS", "Premier:-10"), "PLACEMENT_DIVISIONS");
        assert_eq!(rejected_key("PLACEMENT_DIVISIONS", "Premier:inf"), "PLACEMENT_DIVISIONS");
    }

    #[test]
    fn test_trade_units_capped_at_three() {
        assert_eq!(rejected_key("MAX_TRADE_UNITS", "0"), "MAX_TRADE_UNITS");
        assert_eq!(rejected_key("MAX_TRADE_UNITS", "10"), "MAX_TRADE_UNITS");

        let mut env_map = setup_required_env();
        env_map.insert("MAX_TRADE_UNITS".to_string(), "2".to_string());
        assert_eq!(Config::from_env_map(env_map).unwrap().max_trade_units, 2);
    }

    #[test]
    fn test_transaction_limits_must_not_be_negative() {
        assert_eq!(rejected_key("FA_TRANSACTION_LIMIT", "-1"), "FA_TRANSACTION_LIMIT");
        assert_eq!(rejected_key("TRADE_TRANSACTION_LIMIT", "-3"), "TRADE_TRANSACTION_LIMIT");
    }
}
