//! Messages crossing the boundary between the application and this layer.
//!
//! Inbound events arrive as `{ "tag": ..., "data": ... }` objects and are
//! parsed into the closed `ShellEvent` enum. Outbound messages are encoded
//! to a JSON string before being handed to the application.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{BurpeeVariant, WorkoutRecord};

use super::InteropError;

#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    StoreBurpeeVariant(BurpeeVariant),
    StoreWorkout(WorkoutRecord),
    LogError(String),
    PlaySound(String),
    /// A tag this layer does not know. Logged and ignored.
    Unhandled { tag: String, data: Value },
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    data: Value,
}

impl ShellEvent {
    pub fn tag(&self) -> &str {
        match self {
            ShellEvent::StoreBurpeeVariant(_) => "StoreBurpeeVariant",
            ShellEvent::StoreWorkout(_) => "StoreWorkout",
            ShellEvent::LogError(_) => "LogError",
            ShellEvent::PlaySound(_) => "PlaySound",
            ShellEvent::Unhandled { tag, .. } => tag.as_str(),
        }
    }
}

impl TryFrom<Value> for ShellEvent {
    type Error = InteropError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let raw: RawEvent = serde_json::from_value(value).map_err(InteropError::Malformed)?;
        let tag = raw.tag.ok_or(InteropError::MissingTag)?;

        let event = match tag.as_str() {
            "StoreBurpeeVariant" => ShellEvent::StoreBurpeeVariant(BurpeeVariant(raw.data)),
            "StoreWorkout" => ShellEvent::StoreWorkout(
                serde_json::from_value(raw.data).map_err(|source| {
                    InteropError::InvalidPayload {
                        tag: "StoreWorkout",
                        source,
                    }
                })?,
            ),
            "LogError" => ShellEvent::LogError(match raw.data {
                Value::String(message) => message,
                other => other.to_string(),
            }),
            "PlaySound" => ShellEvent::PlaySound(serde_json::from_value(raw.data).map_err(
                |source| InteropError::InvalidPayload {
                    tag: "PlaySound",
                    source,
                },
            )?),
            _ => ShellEvent::Unhandled {
                tag,
                data: raw.data,
            },
        };
        Ok(event)
    }
}

/// Payload of the one-off startup message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitData {
    pub workout_history: Vec<WorkoutRecord>,
    pub current_burpee_variant: Option<BurpeeVariant>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tag", content = "data")]
pub enum ElmMessage {
    InitData(InitData),
}

impl ElmMessage {
    /// Encode for the outbound port, which carries strings.
    pub fn to_port_string(&self) -> Result<String, InteropError> {
        serde_json::to_string(self).map_err(InteropError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_store_workout() {
        let event = ShellEvent::try_from(json!({
            "tag": "StoreWorkout",
            "data": { "timestamp": 1_700_000_000_000i64, "reps": 20 }
        }))
        .unwrap();

        match event {
            ShellEvent::StoreWorkout(workout) => {
                assert_eq!(workout.timestamp, 1_700_000_000_000);
                assert_eq!(workout.field("reps"), Some(&json!(20)));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_store_variant_keeps_shape() {
        let data = json!({ "name": "Navy Seal", "pushups": 2 });
        let event = ShellEvent::try_from(json!({ "tag": "StoreBurpeeVariant", "data": data })).unwrap();
        assert_eq!(event, ShellEvent::StoreBurpeeVariant(BurpeeVariant(data)));
    }

    #[test]
    fn test_parse_log_error_accepts_non_string() {
        let event = ShellEvent::try_from(json!({ "tag": "LogError", "data": { "code": 3 } })).unwrap();
        assert_eq!(event, ShellEvent::LogError(r#"{"code":3}"#.to_string()));
    }

    #[test]
    fn test_parse_play_sound() {
        let event = ShellEvent::try_from(json!({ "tag": "PlaySound", "data": "beep" })).unwrap();
        assert_eq!(event, ShellEvent::PlaySound("beep".to_string()));
        assert_eq!(event.tag(), "PlaySound");
    }

    #[test]
    fn test_unknown_tag_is_unhandled() {
        let event = ShellEvent::try_from(json!({ "tag": "CopyToClipboard", "data": "x" })).unwrap();
        assert_eq!(
            event,
            ShellEvent::Unhandled {
                tag: "CopyToClipboard".to_string(),
                data: json!("x")
            }
        );
    }

    #[test]
    fn test_missing_or_null_tag() {
        assert!(matches!(
            ShellEvent::try_from(json!({ "data": 1 })),
            Err(InteropError::MissingTag)
        ));
        assert!(matches!(
            ShellEvent::try_from(json!({ "tag": null })),
            Err(InteropError::MissingTag)
        ));
    }

    #[test]
    fn test_bad_workout_payload() {
        assert!(matches!(
            ShellEvent::try_from(json!({ "tag": "StoreWorkout", "data": { "reps": 1 } })),
            Err(InteropError::InvalidPayload { tag: "StoreWorkout", .. })
        ));
    }

    #[test]
    fn test_non_object_event_is_malformed() {
        assert!(matches!(
            ShellEvent::try_from(json!("StoreWorkout")),
            Err(InteropError::Malformed(_))
        ));
    }

    #[test]
    fn test_init_data_wire_format() {
        let message = ElmMessage::InitData(InitData {
            workout_history: vec![WorkoutRecord::new(5).with_field("reps", 10)],
            current_burpee_variant: None,
            version: "v18".to_string(),
        });

        let encoded = message.to_port_string().unwrap();
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(
            decoded,
            json!({
                "tag": "InitData",
                "data": {
                    "workoutHistory": [{ "timestamp": 5, "reps": 10 }],
                    "currentBurpeeVariant": null,
                    "version": "v18"
                }
            })
        );
    }
}
