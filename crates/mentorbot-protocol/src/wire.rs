//! The wire format between a client and the gateway.
//!
//! Every frame is one [`Envelope`]. The message inside is internally
//! tagged, so a client sends things like:
//!
//! ```text
//! {"seq":1,"timestamp":0,"message":{"type":"Handshake","version":1,"token":"42","username":"ada"}}
//! {"seq":2,"timestamp":0,"message":{"type":"Text","text":"/start"}}
//! {"seq":3,"timestamp":0,"message":{"type":"Press","button":"call_mentor"}}
//! ```
//!
//! and receives `HandshakeAck`, `HeartbeatAck`, `Deliver` and `Error`.

use serde::{Deserialize, Serialize};

use crate::{Button, Identity, Outbound};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// A button as rendered on the client: its id plus a caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonView {
    pub id: Button,
    pub label: String,
}

impl From<Button> for ButtonView {
    fn from(button: Button) -> Self {
        Self {
            id: button,
            label: button.label().to_string(),
        }
    }
}

/// Messages exchanged over a gateway connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    // -- Connection lifecycle --
    /// Client → Server: first frame on every connection. `token` is handed
    /// to the gateway's authenticator; `username` is the display name the
    /// client already has, if any.
    Handshake {
        version: u32,
        token: Option<String>,
        #[serde(default)]
        username: Option<String>,
    },

    /// Server → Client: the handshake was accepted.
    HandshakeAck { identity: Identity, server_time: u64 },

    /// Either direction: closing the connection.
    Disconnect { reason: String },

    // -- Keep-alive --
    /// Client → Server: "still here". Resets the idle timer.
    Heartbeat { client_time: u64 },

    /// Server → Client: reply to a heartbeat.
    HeartbeatAck { client_time: u64, server_time: u64 },

    // -- Conversation --
    /// Client → Server: typed text. Text starting with `/` is treated as
    /// a command.
    Text { text: String },

    /// Client → Server: a button was pressed.
    Press { button: Button },

    /// Server → Client: a message for the user, with an optional keyboard.
    Deliver {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        buttons: Vec<ButtonView>,
    },

    // -- Errors --
    /// Server → Client: protocol-level failure. `code` follows HTTP
    /// conventions (400 bad request, 401 unauthorized).
    Error { code: u16, message: String },
}

impl WireMessage {
    /// Builds the `Deliver` frame body for a broker directive.
    pub fn deliver(outbound: &Outbound) -> Self {
        Self::Deliver {
            text: outbound.text.clone(),
            buttons: outbound.buttons.iter().copied().map(ButtonView::from).collect(),
        }
    }
}

/// The top-level frame: a sequence number, a timestamp (milliseconds
/// since the sender started), and the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    pub timestamp: u64,
    pub message: WireMessage,
}

impl Envelope {
    pub fn new(seq: u64, timestamp: u64, message: WireMessage) -> Self {
        Self {
            seq,
            timestamp,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_json_format() {
        let msg = WireMessage::Handshake {
            version: 1,
            token: Some("42".into()),
            username: Some("ada".into()),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "Handshake");
        assert_eq!(json["version"], 1);
        assert_eq!(json["token"], "42");
        assert_eq!(json["username"], "ada");
    }

    #[test]
    fn test_handshake_username_defaults_to_none_when_missing() {
        let json = r#"{"type":"Handshake","version":1,"token":"7"}"#;
        let msg: WireMessage = serde_json::from_str(json).unwrap();

        assert_eq!(
            msg,
            WireMessage::Handshake {
                version: 1,
                token: Some("7".into()),
                username: None,
            }
        );
    }

    #[test]
    fn test_press_uses_button_id() {
        let json = r#"{"type":"Press","button":"mentor_join"}"#;
        let msg: WireMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            WireMessage::Press {
                button: Button::MentorJoin
            }
        );
    }

    #[test]
    fn test_deliver_from_outbound_carries_labels() {
        let out = Outbound::notice(Identity(5), "registered")
            .with_buttons([Button::CallMentor]);

        let json: serde_json::Value =
            serde_json::to_value(WireMessage::deliver(&out)).unwrap();

        assert_eq!(json["type"], "Deliver");
        assert_eq!(json["text"], "registered");
        assert_eq!(json["buttons"][0]["id"], "call_mentor");
        assert_eq!(json["buttons"][0]["label"], "Call mentor");
    }

    #[test]
    fn test_deliver_without_buttons_omits_field() {
        let out = Outbound::notice(Identity(5), "plain");
        let json: serde_json::Value =
            serde_json::to_value(WireMessage::deliver(&out)).unwrap();
        assert!(json.get("buttons").is_none());
    }

    #[test]
    fn test_unknown_message_type_is_rejected() {
        let unknown = r#"{"type":"FlyToMoon","speed":9000}"#;
        let result: Result<WireMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }

    #[test]
    fn test_envelope_missing_message_is_rejected() {
        let wrong = r#"{"seq":1,"timestamp":0}"#;
        let result: Result<Envelope, _> = serde_json::from_str(wrong);
        assert!(result.is_err());
    }
}
