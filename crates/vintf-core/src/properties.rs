use std::collections::BTreeMap;

/// Read access to system properties such as `ro.product.first_api_level`.
pub trait PropertyFetcher: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }

    /// An unsigned property; unset and unparsable values are `None`.
    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticProperties {
    values: BTreeMap<String, String>,
}

impl StaticProperties {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl PropertyFetcher for StaticProperties {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
