use std::sync::atomic::{AtomicUsize, Ordering};

use sqlshim_core::{ConfigError, Connection, ConnectionConfig, Dialect, Result};

const REJECT_KEY: &str = "passthrough.reject";

/// Dialect that hands the base connection back unchanged.
#[derive(Debug, Default)]
pub struct PassthroughDialect {
    adapted: AtomicUsize,
}

impl PassthroughDialect {
    pub fn adapted(&self) -> usize {
        self.adapted.load(Ordering::SeqCst)
    }
}

impl Dialect for PassthroughDialect {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        Err(ConfigError::MissingField { field: "host" }.into())
    }

    fn adapt(
        &self,
        inner: Box<dyn Connection>,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Connection>> {
        if let Some(value) = config.extra_value(REJECT_KEY) {
            return Err(ConfigError::InvalidValue {
                key: REJECT_KEY.to_string(),
                value: value.to_string(),
                reason: "rejected by testcase",
            }
            .into());
        }

        self.adapted.fetch_add(1, Ordering::SeqCst);
        Ok(inner)
    }
}
