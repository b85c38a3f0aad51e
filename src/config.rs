use std::time::Duration;

use crate::error::{Error, Result};

/// The only interpreter this crate embeds.
const ENGINE_NAME: &str = "rhai";

const MEMORY_RANGE: (u64, u64) = (10, 1000);
const TIMEOUT_RANGE: (u64, u64) = (10, 600);
const STATEMENT_RANGE: (u64, u64) = (100, 10_000);

/// Validated limits for one script execution.
///
/// Parsed from a `Key=Value;Key=Value` configuration string. A successfully
/// parsed config is immutable and always fully valid; parsing doubles as the
/// connection test for callers that only want to validate their settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    limit_memory_mb: u64,
    timeout_secs: u64,
    max_statements: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limit_memory_mb: 100,
            timeout_secs: 30,
            max_statements: 2000,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration string.
    ///
    /// Recognized keys, matched case-insensitively: `Engine` (required, must
    /// be `"rhai"`), `LimitMemory` (MB, 10..=1000), `TimeoutInterval`
    /// (seconds, 10..=600), `MaxStatements` (100..=10000). Unknown keys are
    /// ignored; for duplicate keys the last occurrence wins.
    pub fn parse(config: &str) -> Result<Self> {
        if config.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "missing required configuration string".into(),
            ));
        }

        let mut engine_seen = false;
        let mut parsed = Self::default();

        for segment in config.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                Error::ConfigValidation(format!("malformed configuration segment `{segment}`"))
            })?;
            let key = key.trim();
            let value = value.trim();

            if key.eq_ignore_ascii_case("engine") {
                if !value.eq_ignore_ascii_case(ENGINE_NAME) {
                    return Err(Error::ConfigValidation(format!(
                        "Engine must be '{ENGINE_NAME}'"
                    )));
                }
                engine_seen = true;
            } else if key.eq_ignore_ascii_case("limitmemory") {
                parsed.limit_memory_mb =
                    parse_bounded(value, MEMORY_RANGE, "LimitMemory", "MB")?;
            } else if key.eq_ignore_ascii_case("timeoutinterval") {
                parsed.timeout_secs =
                    parse_bounded(value, TIMEOUT_RANGE, "TimeoutInterval", "seconds")?;
            } else if key.eq_ignore_ascii_case("maxstatements") {
                parsed.max_statements =
                    parse_bounded(value, STATEMENT_RANGE, "MaxStatements", "statements")?;
            }
        }

        if !engine_seen {
            return Err(Error::ConfigValidation(
                "missing required configuration key 'Engine'".into(),
            ));
        }
        Ok(parsed)
    }

    /// Memory ceiling in megabytes.
    pub fn limit_memory_mb(&self) -> u64 {
        self.limit_memory_mb
    }

    /// Wall-clock timeout for one execution.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Maximum number of evaluated statements per execution.
    pub fn max_statements(&self) -> u64 {
        self.max_statements
    }

    #[cfg(test)]
    pub(crate) fn for_tests(limit_memory_mb: u64, timeout_secs: u64, max_statements: u64) -> Self {
        Self {
            limit_memory_mb,
            timeout_secs,
            max_statements,
        }
    }
}

fn parse_bounded(value: &str, (lo, hi): (u64, u64), key: &str, unit: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(n) if (lo..=hi).contains(&n) => Ok(n),
        _ => Err(Error::ConfigValidation(format!(
            "{key} must be an integer between {lo} and {hi} ({unit})"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_engine_given() {
        let config = EngineConfig::parse("Engine=rhai").unwrap();
        assert_eq!(config.limit_memory_mb(), 100);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_statements(), 2000);
    }

    #[test]
    fn all_keys_parsed_case_insensitively() {
        let config =
            EngineConfig::parse("ENGINE=Rhai; limitmemory=10; TimeoutInterval=600; MAXSTATEMENTS=100")
                .unwrap();
        assert_eq!(config.limit_memory_mb(), 10);
        assert_eq!(config.timeout(), Duration::from_secs(600));
        assert_eq!(config.max_statements(), 100);
    }

    #[test]
    fn last_duplicate_key_wins() {
        let config = EngineConfig::parse("Engine=rhai;LimitMemory=10;LimitMemory=20").unwrap();
        assert_eq!(config.limit_memory_mb(), 20);
    }

    #[test]
    fn unknown_keys_ignored() {
        assert!(EngineConfig::parse("Engine=rhai;Whatever=yes").is_ok());
    }

    #[test]
    fn empty_string_rejected() {
        assert!(matches!(
            EngineConfig::parse("   "),
            Err(Error::ConfigValidation(_))
        ));
    }

    #[test]
    fn missing_engine_rejected() {
        assert!(matches!(
            EngineConfig::parse("LimitMemory=100"),
            Err(Error::ConfigValidation(_))
        ));
    }

    #[test]
    fn wrong_engine_rejected() {
        assert!(matches!(
            EngineConfig::parse("Engine=jint"),
            Err(Error::ConfigValidation(_))
        ));
    }

    #[test]
    fn malformed_segment_rejected() {
        assert!(matches!(
            EngineConfig::parse("Engine=rhai;nonsense"),
            Err(Error::ConfigValidation(_))
        ));
    }

    #[test]
    fn out_of_range_values_rejected() {
        for bad in [
            "Engine=rhai;LimitMemory=9",
            "Engine=rhai;LimitMemory=1001",
            "Engine=rhai;TimeoutInterval=9",
            "Engine=rhai;TimeoutInterval=601",
            "Engine=rhai;MaxStatements=99",
            "Engine=rhai;MaxStatements=10001",
            "Engine=rhai;MaxStatements=lots",
        ] {
            assert!(
                matches!(EngineConfig::parse(bad), Err(Error::ConfigValidation(_))),
                "expected rejection for {bad}"
            );
        }
    }

    #[test]
    fn boundary_values_accepted() {
        let config = EngineConfig::parse(
            "Engine=rhai;LimitMemory=1000;TimeoutInterval=10;MaxStatements=10000",
        )
        .unwrap();
        assert_eq!(config.limit_memory_mb(), 1000);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.max_statements(), 10000);
    }
}
