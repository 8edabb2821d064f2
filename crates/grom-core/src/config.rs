//! Client configuration: engine dialect, id generation, debug tracing.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`GROM_` prefix)
//! 2. Config file (`grom.toml`)
//! 3. Defaults

use std::env;
use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::value::Id;

/// Environment variable enabling the query debug trace.
pub const DEBUG_ENV: &str = "GROM_DEBUG";

/// Target engine flavor.
///
/// Controls how multi-valued properties are encoded: Gremlin Server takes
/// a collection as one single-cardinality value, Neptune requires one
/// set-cardinality property step per element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Gremlin,
    Neptune,
}

/// Callback supplying externally generated vertex ids at create time.
///
/// Returning `None` lets the engine assign the id.
pub type IdGenerator = Arc<dyn Fn() -> Option<Id> + Send + Sync>;

/// An [`IdGenerator`] producing random v4 UUIDs.
pub fn uuid_id_generator() -> IdGenerator {
    Arc::new(|| Some(Id::Uuid(Uuid::new_v4())))
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Engine dialect (default: gremlin).
    #[serde(default)]
    pub dialect: Dialect,

    /// Mirror builder mutations into a human-readable trace logged before
    /// each execution. Defaults from `GROM_DEBUG=true`.
    #[serde(default = "debug_from_env")]
    pub debug: bool,
}

fn debug_from_env() -> bool {
    env::var(DEBUG_ENV).map(|v| v == "true").unwrap_or(false)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            debug: debug_from_env(),
        }
    }
}

impl ClientConfig {
    /// Load from `<prefix>.toml` (optional) and `GROM_`-prefixed
    /// environment variables.
    pub fn load(prefix: &str) -> Result<Self, config::ConfigError> {
        let cfg: Self = config::Config::builder()
            .add_source(config::File::with_name(prefix).required(false))
            .add_source(config::Environment::with_prefix("GROM"))
            .build()?
            .try_deserialize()?;
        tracing::debug!(?cfg, "loaded client configuration");
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dialect_is_gremlin() {
        assert_eq!(Dialect::default(), Dialect::Gremlin);
    }

    #[test]
    fn dialect_deserializes_lowercase() {
        let dialect: Dialect = serde_json::from_str("\"neptune\"").unwrap();
        assert_eq!(dialect, Dialect::Neptune);
    }

    #[test]
    fn uuid_generator_yields_uuid_ids() {
        let generate = uuid_id_generator();
        assert!(matches!(generate(), Some(Id::Uuid(_))));
    }
}
