//! Task-level configuration. Only the options the task itself acts on are parsed here, everything
//! else is kept verbatim and handed to the [crate::engine::SinkEngineBuilder].

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::Result;
use crate::error::Error;

pub const ERRORS_TOLERANCE: &str = "errors.tolerance";
const DEFAULT_ERRORS_TOLERANCE: ErrorTolerance = ErrorTolerance::None;

/// How delivery failures are handled by the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorTolerance {
    /// Any failed batch is returned to the host, which stops (or restarts) the task.
    #[default]
    None,
    /// Failed batches are counted, routed to the dead-letter reporter and skipped.
    All,
}

impl FromStr for ErrorTolerance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(ErrorTolerance::None),
            "all" => Ok(ErrorTolerance::All),
            other => Err(Error::Config(format!(
                "Invalid value {other:?} for {ERRORS_TOLERANCE}, expected one of [none, all]"
            ))),
        }
    }
}

impl Display for ErrorTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTolerance::None => write!(f, "none"),
            ErrorTolerance::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    pub errors_tolerance: ErrorTolerance,
    /// All properties the task was started with, including the ones parsed above.
    pub props: HashMap<String, String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig {
            errors_tolerance: DEFAULT_ERRORS_TOLERANCE,
            props: HashMap::new(),
        }
    }
}

impl SinkConfig {
    pub fn load(props: HashMap<String, String>) -> Result<Self> {
        let errors_tolerance = props
            .get(ERRORS_TOLERANCE)
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or(DEFAULT_ERRORS_TOLERANCE);

        Ok(SinkConfig {
            errors_tolerance,
            props,
        })
    }

    pub fn is_errors_tolerance(&self) -> bool {
        self.errors_tolerance == ErrorTolerance::All
    }

    /// Raw option lookup for the engine builders.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_tolerance_is_none() {
        let config = SinkConfig::load(HashMap::new()).unwrap();
        assert_eq!(config.errors_tolerance, ErrorTolerance::None);
        assert!(!config.is_errors_tolerance());
    }

    #[test]
    fn test_tolerance_all_case_insensitive() {
        let config = SinkConfig::load(props(&[(ERRORS_TOLERANCE, " ALL ")])).unwrap();
        assert!(config.is_errors_tolerance());
    }

    #[test]
    fn test_invalid_tolerance() {
        let result = SinkConfig::load(props(&[(ERRORS_TOLERANCE, "some")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_other_props_kept() {
        let config =
            SinkConfig::load(props(&[(ERRORS_TOLERANCE, "none"), ("sink.type", "log")])).unwrap();
        assert_eq!(config.get("sink.type"), Some("log"));
        assert_eq!(config.get(ERRORS_TOLERANCE), Some("none"));
        assert_eq!(config.get("missing"), None);
    }
}
