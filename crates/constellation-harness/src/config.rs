//! Campaign configuration.
//!
//! Values come from the environment first and are then overridden by CLI flags:
//! - `CONSTELLATION_SCAN_LIMIT`: upper bound of the verification scan (default 100000).
//! - `CONSTELLATION_PAIR_BUDGET`: S-pair budget per derivation (default unbounded;
//!   `0`, `none` or `off` also mean unbounded).
//! - `CONSTELLATION_FALSE_NEGATIVES`: `1|true|yes|on` enables the reverse check.
//!
//! Unparseable values fall back to the default.

use constellation_core::{EliminationConfig, ScanOptions};
use serde::{Deserialize, Serialize};

pub const ENV_SCAN_LIMIT: &str = "CONSTELLATION_SCAN_LIMIT";
pub const ENV_PAIR_BUDGET: &str = "CONSTELLATION_PAIR_BUDGET";
pub const ENV_FALSE_NEGATIVES: &str = "CONSTELLATION_FALSE_NEGATIVES";

pub const DEFAULT_SCAN_LIMIT: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub scan_limit: u64,
    pub pair_budget: Option<usize>,
    pub check_false_negatives: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            scan_limit: DEFAULT_SCAN_LIMIT,
            pair_budget: None,
            check_false_negatives: false,
        }
    }
}

impl HarnessConfig {
    /// Resolve from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            scan_limit: lookup(ENV_SCAN_LIMIT)
                .and_then(|raw| parse_count(&raw))
                .filter(|&limit| limit > 0)
                .unwrap_or(defaults.scan_limit),
            pair_budget: lookup(ENV_PAIR_BUDGET)
                .and_then(|raw| parse_budget(&raw))
                .unwrap_or(defaults.pair_budget),
            check_false_negatives: lookup(ENV_FALSE_NEGATIVES)
                .map(|raw| parse_flag_loose(&raw))
                .unwrap_or(defaults.check_false_negatives),
        }
    }

    /// Apply explicit CLI values on top. A pair budget of 0 means unbounded, as in
    /// the environment.
    #[must_use]
    pub fn with_overrides(
        mut self,
        scan_limit: Option<u64>,
        pair_budget: Option<usize>,
        check_false_negatives: bool,
    ) -> Self {
        if let Some(limit) = scan_limit {
            self.scan_limit = limit;
        }
        if let Some(budget) = pair_budget {
            self.pair_budget = (budget > 0).then_some(budget);
        }
        self.check_false_negatives |= check_false_negatives;
        self
    }

    #[must_use]
    pub fn elimination(&self) -> EliminationConfig {
        EliminationConfig {
            pair_budget: self.pair_budget,
        }
    }

    #[must_use]
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            check_false_negatives: self.check_false_negatives,
        }
    }
}

/// Decimal count, allowing `_` separators.
fn parse_count(raw: &str) -> Option<u64> {
    raw.trim().replace('_', "").parse().ok()
}

/// `Some(None)` for explicit "unbounded" spellings.
fn parse_budget(raw: &str) -> Option<Option<usize>> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "none" | "off" | "unbounded" => Some(None),
        other => other.replace('_', "").parse().ok().map(Some),
    }
}

#[must_use]
pub fn parse_flag_loose(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        assert_eq!(HarnessConfig::from_lookup(|_| None), HarnessConfig::default());
    }

    #[test]
    fn environment_values_are_parsed_loosely() {
        let config = HarnessConfig::from_lookup(lookup(&[
            (ENV_SCAN_LIMIT, " 250_000 "),
            (ENV_PAIR_BUDGET, "64"),
            (ENV_FALSE_NEGATIVES, "Yes"),
        ]));
        assert_eq!(config.scan_limit, 250_000);
        assert_eq!(config.pair_budget, Some(64));
        assert!(config.check_false_negatives);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = HarnessConfig::from_lookup(lookup(&[
            (ENV_SCAN_LIMIT, "lots"),
            (ENV_PAIR_BUDGET, "-3"),
            (ENV_FALSE_NEGATIVES, "maybe"),
        ]));
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn zero_limit_and_budget_mean_default_and_unbounded() {
        let config = HarnessConfig::from_lookup(lookup(&[
            (ENV_SCAN_LIMIT, "0"),
            (ENV_PAIR_BUDGET, "off"),
        ]));
        assert_eq!(config.scan_limit, DEFAULT_SCAN_LIMIT);
        assert_eq!(config.pair_budget, None);
    }

    #[test]
    fn zero_budget_means_unbounded_from_either_source() {
        let from_env = HarnessConfig::from_lookup(lookup(&[(ENV_PAIR_BUDGET, "0")]));
        let from_cli = HarnessConfig::from_lookup(lookup(&[(ENV_PAIR_BUDGET, "64")]))
            .with_overrides(None, Some(0), false);
        assert_eq!(from_env.pair_budget, None);
        assert_eq!(from_cli.pair_budget, None);
        assert_eq!(from_cli.elimination(), from_env.elimination());
    }

    #[test]
    fn cli_overrides_win() {
        let config = HarnessConfig::from_lookup(lookup(&[(ENV_SCAN_LIMIT, "10")]))
            .with_overrides(Some(5_000), Some(12), true);
        assert_eq!(config.scan_limit, 5_000);
        assert_eq!(config.elimination().pair_budget, Some(12));
        assert!(config.scan_options().check_false_negatives);
    }
}
