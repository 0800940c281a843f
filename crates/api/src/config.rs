//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use common::Money;
use domain::PricingConfig;
use fulfillment::SequencerConfig;
use rust_decimal::Decimal;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parses `LOG_FORMAT`; anything other than `json` means text.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset means in-memory store
/// - `CATALOG_SEED`: JSON file of products loaded into the in-memory store
/// - `FREE_SHIPPING_THRESHOLD`: minor units (default: `500000`)
/// - `STANDARD_SHIPPING_FEE`: minor units (default: `30000`)
/// - `TAX_RATE`: decimal fraction (default: `0.10`)
/// - `ORDER_NUMBER_UTC_OFFSET_MINUTES`: day boundary for order numbers (default: `0`)
/// - `CHECKOUT_MAX_ATTEMPTS`: checkout retries on number conflicts (default: `3`)
///
/// Invalid values fall back to the default and are listed in `rejected`,
/// to be reported once logging is up.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `EnvFilter` directive for the tracing subscriber.
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub catalog_seed: Option<PathBuf>,
    pub pricing: PricingConfig,
    pub sequencer: SequencerConfig,
    /// `(variable, value)` pairs that failed to parse.
    pub rejected: Vec<(String, String)>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut rejected = Vec::new();
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let pricing = PricingConfig {
            free_shipping_threshold: parse_or(
                &var,
                &mut rejected,
                "FREE_SHIPPING_THRESHOLD",
                defaults.pricing.free_shipping_threshold,
                |v| i64::from_str(v).ok().filter(|n| *n >= 0).map(Money::new),
            ),
            standard_shipping_fee: parse_or(
                &var,
                &mut rejected,
                "STANDARD_SHIPPING_FEE",
                defaults.pricing.standard_shipping_fee,
                |v| i64::from_str(v).ok().filter(|n| *n >= 0).map(Money::new),
            ),
            tax_rate: parse_or(&var, &mut rejected, "TAX_RATE", defaults.pricing.tax_rate, |v| {
                Decimal::from_str(v)
                    .ok()
                    .filter(|rate| !rate.is_sign_negative() && *rate <= Decimal::ONE)
            }),
        };

        let sequencer = SequencerConfig::default();
        let sequencer = parse_or(
            &var,
            &mut rejected,
            "ORDER_NUMBER_UTC_OFFSET_MINUTES",
            sequencer,
            |v| {
                i32::from_str(v)
                    .ok()
                    .and_then(|minutes| sequencer.with_offset_minutes(minutes))
            },
        );
        let sequencer = parse_or(&var, &mut rejected, "CHECKOUT_MAX_ATTEMPTS", sequencer, |v| {
            u32::from_str(v)
                .ok()
                .filter(|n| *n >= 1)
                .map(|n| sequencer.with_max_attempts(n))
        });

        let port = parse_or(&var, &mut rejected, "PORT", defaults.port, |v| v.parse().ok());

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: LogFormat::parse(var("LOG_FORMAT").as_deref()),
            database_url: var("DATABASE_URL"),
            catalog_seed: var("CATALOG_SEED").map(PathBuf::from),
            pricing,
            sequencer,
            rejected,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    rejected: &mut Vec<(String, String)>,
    key: &str,
    default: T,
    parse: impl FnOnce(&str) -> Option<T>,
) -> T {
    let Some(raw) = var(key) else {
        return default;
    };
    parse(&raw).unwrap_or_else(|| {
        rejected.push((key.to_string(), raw));
        default
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            catalog_seed: None,
            pricing: PricingConfig::default(),
            sequencer: SequencerConfig::default(),
            rejected: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = config_from(&[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.pricing, PricingConfig::default());
        assert_eq!(config.sequencer, SequencerConfig::default());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_reads_all_variables() {
        let config = config_from(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("CATALOG_SEED", "catalog.json"),
            ("FREE_SHIPPING_THRESHOLD", "1000000"),
            ("STANDARD_SHIPPING_FEE", "15000"),
            ("TAX_RATE", "0.08"),
            ("ORDER_NUMBER_UTC_OFFSET_MINUTES", "420"),
            ("CHECKOUT_MAX_ATTEMPTS", "5"),
        ]);
        assert_eq!(config.port, 8081);
        assert!(config.rejected.is_empty());
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/shop"));
        assert_eq!(config.catalog_seed, Some(PathBuf::from("catalog.json")));
        assert_eq!(config.pricing.free_shipping_threshold, Money::new(1_000_000));
        assert_eq!(config.pricing.standard_shipping_fee, Money::new(15_000));
        assert_eq!(config.pricing.tax_rate, Decimal::new(8, 2));
        assert_eq!(config.sequencer.utc_offset.local_minus_utc(), 420 * 60);
        assert_eq!(config.sequencer.max_attempts, 5);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("TAX_RATE", "1.5"),
            ("FREE_SHIPPING_THRESHOLD", "-1"),
            ("ORDER_NUMBER_UTC_OFFSET_MINUTES", "100000"),
            ("CHECKOUT_MAX_ATTEMPTS", "0"),
            ("DATABASE_URL", "   "),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.pricing, PricingConfig::default());
        assert_eq!(config.sequencer, SequencerConfig::default());
        assert!(config.database_url.is_none());

        let mut keys: Vec<_> = config.rejected.iter().map(|(k, _)| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "CHECKOUT_MAX_ATTEMPTS",
                "FREE_SHIPPING_THRESHOLD",
                "ORDER_NUMBER_UTC_OFFSET_MINUTES",
                "PORT",
                "TAX_RATE"
            ]
        );
    }

    #[test]
    fn test_log_level_from_rust_log() {
        let config = config_from(&[("RUST_LOG", "fulfillment=debug,info")]);
        assert_eq!(config.log_level, "fulfillment=debug,info");
    }
}
