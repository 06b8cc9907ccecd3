//! # Command Frame Encoder
//!
//! Outbound frames are structured objects of the shape
//! `{"type": "command", "command": <name>, "params": <object>}`.

use serde::Serialize;
use serde_json::Value;

/// Command name for the one-time start configuration handshake
pub const START_COMMAND: &str = "setConfig";

/// Outbound command frame
#[derive(Debug, Serialize)]
pub struct CommandFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    command: &'a str,
    params: &'a Value,
}

impl<'a> CommandFrame<'a> {
    /// Build a command frame for `command` with the given parameters
    pub fn new(command: &'a str, params: &'a Value) -> Self {
        Self {
            kind: "command",
            command,
            params,
        }
    }
}

/// Serialize a command into its wire text
pub fn encode_command(command: &str, params: &Value) -> serde_json::Result<String> {
    serde_json::to_string(&CommandFrame::new(command, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_command_shape() {
        let params = json!({"freq": 1});
        let text = encode_command("setConfig", &params).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["type"], json!("command"));
        assert_eq!(parsed["command"], json!("setConfig"));
        assert_eq!(parsed["params"], json!({"freq": 1}));
    }

    #[test]
    fn test_encode_command_empty_params() {
        let params = json!({});
        let text = encode_command("resetBuffer", &params).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["params"], json!({}));
    }

    #[test]
    fn test_start_command_name() {
        assert_eq!(START_COMMAND, "setConfig");
    }
}
