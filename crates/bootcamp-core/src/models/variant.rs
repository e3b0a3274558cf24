use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key of the single preference record.
pub const CURRENT_VARIANT_ID: &str = "current";

/// The exercise variant the user picked. Its shape belongs to the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BurpeeVariant(pub Value);

impl BurpeeVariant {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// `null` means "never set" on the wire, so it is not a storable variant.
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

/// Stored form of the preference, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantPreference {
    pub id: String,
    pub value: BurpeeVariant,
}

impl VariantPreference {
    pub fn current(value: BurpeeVariant) -> Self {
        Self {
            id: CURRENT_VARIANT_ID.to_string(),
            value,
        }
    }
}
