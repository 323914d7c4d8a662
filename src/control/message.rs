use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Sender/recipient name the supervisor uses on the control channel.
pub const SUPERVISOR_NAME: &str = "gamebot";

/// Recipient name for messages addressed to every worker.
pub const BROADCAST: &str = "all";

/// Control envelope exchanged between supervisor and worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub from: String,
    pub to: String,
    pub message: String,
    #[serde(default = "empty_object")]
    pub data: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl ControlMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            message: message.into(),
            data: if data.is_null() { empty_object() } else { data },
        }
    }

    /// Readiness notification a worker sends once its datastore is up.
    pub fn starting(tenant: &str, project: &str) -> Self {
        Self::new(
            tenant,
            SUPERVISOR_NAME,
            format!("Bot {tenant} started with project {project}"),
            json!({ "starting": true }),
        )
    }

    /// `data.starting == true` marks a liveness signal rather than operator traffic.
    pub fn is_starting(&self) -> bool {
        self.data.get("starting").and_then(Value::as_bool) == Some(true)
    }

    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_flag_detection() {
        assert!(ControlMessage::starting("acme", "Gamebot").is_starting());

        let plain = ControlMessage::new("acme", SUPERVISOR_NAME, "hello", json!({}));
        assert!(!plain.is_starting());

        let stringly = ControlMessage::new(
            "acme",
            SUPERVISOR_NAME,
            "hello",
            json!({ "starting": "true" }),
        );
        assert!(!stringly.is_starting());
    }

    #[test]
    fn null_data_becomes_empty_object() {
        let msg = ControlMessage::new("a", "b", "c", Value::Null);
        assert_eq!(msg.data, json!({}));
    }

    #[test]
    fn missing_data_deserializes_to_empty_object() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"from":"a","to":"all","message":"m"}"#).unwrap();
        assert_eq!(msg.data, json!({}));
        assert!(msg.is_broadcast());
    }
}
