use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A completed workout as the application encodes it.
///
/// Only `timestamp` is interpreted here: it is the record key. Everything else
/// (reps, duration, the variant used) is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub timestamp: i64,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl WorkoutRecord {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            payload: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}
