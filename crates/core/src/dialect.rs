use crate::{Connection, ConnectionConfig, Result};

pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Opens a live connection already adapted to this dialect.
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>>;

    /// Wraps an existing base connection so statements routed through it
    /// follow this dialect.
    fn adapt(
        &self,
        inner: Box<dyn Connection>,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Connection>>;
}
