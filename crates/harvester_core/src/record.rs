use serde::Serialize;
use serde_json::Value;

/// A platform-native JSON record together with the key used for dedup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    key: String,
    value: Value,
}

impl Record {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}
