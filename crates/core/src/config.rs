use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub extra: BTreeMap<String, String>,
}

impl ConnectionConfig {
    /// Trimmed value of a dialect-specific key; blank values count as unset.
    #[must_use]
    pub fn extra_value(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}
