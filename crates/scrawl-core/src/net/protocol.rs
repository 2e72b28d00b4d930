use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::messages::{ClientMessage, ServerMessage};
use crate::canvas::PixelMessage;

/// Maximum frame size accepted from a client.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    PayloadTooLarge(usize),
    UnknownMessageType(String),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::UnknownMessageType(t) => write!(f, "unknown message type: {t:?}"),
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// The outer frame: `type` selects the schema `data` is parsed with.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

fn payload<T: DeserializeOwned>(data: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode a raw text frame into a `ClientMessage`.
///
/// Decoding is two-phase: the envelope `type` is read first, then `data` is
/// parsed with the schema bound to that type, so an unknown type and a
/// schema mismatch surface as distinct errors.
pub fn decode_client_message(raw: &str) -> Result<ClientMessage, ProtocolError> {
    if raw.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if raw.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(raw.len()));
    }
    let envelope: Envelope =
        serde_json::from_str(raw).map_err(|e| ProtocolError::DeserializeError(e.to_string()))?;
    match envelope.msg_type.as_str() {
        "player_ready" => Ok(ClientMessage::PlayerReady(payload(envelope.data)?)),
        "word_selection" => Ok(ClientMessage::WordSelection(payload(envelope.data)?)),
        "guess_message" => Ok(ClientMessage::GuessMessage(payload(envelope.data)?)),
        "pixel_draw" => Ok(ClientMessage::PixelDraw(payload::<PixelMessage>(envelope.data)?)),
        "clear_canvas" => Ok(ClientMessage::ClearCanvas),
        "start_game" => Ok(ClientMessage::StartGame),
        other => Err(ProtocolError::UnknownMessageType(other.to_string())),
    }
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Decode a raw text frame into a `ServerMessage`.
pub fn decode_server_message(raw: &str) -> Result<ServerMessage, ProtocolError> {
    serde_json::from_str(raw).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{PixelKind, PixelMessage};
    use crate::net::messages::{GuessResultData, TimerUpdateData};
    use crate::phase::GamePhase;

    #[test]
    fn roundtrip_player_ready() {
        let msg = ClientMessage::PlayerReady(true);
        let encoded = encode_client_message(&msg).unwrap();
        let decoded = decode_client_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_word_selection() {
        let msg = ClientMessage::WordSelection("cat".to_string());
        let encoded = encode_client_message(&msg).unwrap();
        let decoded = decode_client_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_pixel_draw() {
        let msg = ClientMessage::PixelDraw(PixelMessage {
            kind: PixelKind::Pixel,
            x: Some(3),
            y: Some(9),
            color: "#102030".to_string(),
            timestamp: 7,
            pixels: Vec::new(),
        });
        let encoded = encode_client_message(&msg).unwrap();
        let decoded = decode_client_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn envelope_shape_on_the_wire() {
        let msg = ClientMessage::GuessMessage("cat".to_string());
        let encoded = encode_client_message(&msg).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["type"], "guess_message");
        assert_eq!(value["data"], "cat");
    }

    #[test]
    fn dataless_types_decode_without_data_field() {
        let decoded = decode_client_message(r#"{"type":"clear_canvas"}"#).unwrap();
        assert_eq!(decoded, ClientMessage::ClearCanvas);
        let decoded = decode_client_message(r#"{"type":"start_game","data":null}"#).unwrap();
        assert_eq!(decoded, ClientMessage::StartGame);
    }

    #[test]
    fn unknown_type_is_distinct_from_malformed_data() {
        let err = decode_client_message(r#"{"type":"teleport","data":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageType(ref t) if t == "teleport"));

        let err = decode_client_message(r#"{"type":"player_ready","data":"yes"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::DeserializeError(_)));
    }

    #[test]
    fn empty_message_fails() {
        assert!(matches!(
            decode_client_message(""),
            Err(ProtocolError::EmptyMessage)
        ));
    }

    #[test]
    fn bad_json_fails() {
        assert!(matches!(
            decode_client_message("{nope"),
            Err(ProtocolError::DeserializeError(_))
        ));
    }

    #[test]
    fn oversized_message_rejected() {
        let raw = format!(
            r#"{{"type":"guess_message","data":"{}"}}"#,
            "a".repeat(MAX_MESSAGE_SIZE)
        );
        assert!(matches!(
            decode_client_message(&raw),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn roundtrip_server_timer_update() {
        let msg = ServerMessage::TimerUpdate(TimerUpdateData {
            time_remaining_ms: 14_000,
            phase: GamePhase::Drawing,
            is_active: true,
        });
        let encoded = encode_server_message(&msg).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["type"], "timer_update");
        assert_eq!(value["data"]["phase"], "drawing");
        let decoded = decode_server_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_server_guess_result() {
        let msg = ServerMessage::GuessResult(GuessResultData {
            player_id: "abc123xy".to_string(),
            username: "Bob".to_string(),
            is_correct: true,
            points: 150,
            position: 1,
            time_to_guess_ms: 4_200,
        });
        let encoded = encode_server_message(&msg).unwrap();
        let decoded = decode_server_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn pixel_fanout_uses_the_operation_kind_as_type() {
        let op = PixelMessage {
            kind: PixelKind::BatchErase,
            x: None,
            y: None,
            color: String::new(),
            timestamp: 1,
            pixels: vec![crate::canvas::GridPosition { grid_x: 1, grid_y: 2 }],
        };
        let encoded = encode_server_message(&ServerMessage::BatchErase(op)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["type"], "batch_erase");
        assert_eq!(value["data"]["type"], "batch_erase");
    }

    #[test]
    fn protocol_error_display() {
        assert_eq!(format!("{}", ProtocolError::EmptyMessage), "empty message");
        assert!(format!("{}", ProtocolError::PayloadTooLarge(99_999)).contains("99999"));
        assert!(
            format!("{}", ProtocolError::UnknownMessageType("warp".into())).contains("warp")
        );
        assert!(format!("{}", ProtocolError::DeserializeError("oops".into())).contains("oops"));
    }
}
