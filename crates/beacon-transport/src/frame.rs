//! Wire frames of the hub protocol.
//!
//! Every frame is one line of JSON, discriminated by `type`. Call payloads
//! travel as pre-serialized strings: the hub routes them opaquely and only
//! the endpoints parse them.

use serde::{Deserialize, Serialize};

/// A frame exchanged with the bus hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Client → hub, once after connecting: the bus name this client serves.
    Hello { identity: String },

    /// Client → hub: issue a call. `subscribe` keeps the call open for
    /// multiple replies.
    Call {
        token: u64,
        url: String,
        payload: String,
        subscribe: bool,
    },

    /// Client → hub: cancel an open call. Replies still in flight may arrive
    /// afterwards and are dropped by the client.
    Cancel { token: u64 },

    /// Client → hub: serve a method under `category`/`name`.
    Register { category: String, name: String },

    /// Hub → client: a reply on an open call.
    Reply { token: u64, payload: String },

    /// Hub → client: a request for a served method.
    Request {
        token: u64,
        category: String,
        name: String,
        payload: String,
    },

    /// Client → hub: the response to a [`Frame::Request`].
    Response { token: u64, payload: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(frame: Frame) {
        let line = serde_json::to_string(&frame).unwrap();
        let decoded: Frame = serde_json::from_str(&line).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_frames_round_trip() {
        round_trip(Frame::Hello {
            identity: "com.webos.service.beacon".to_string(),
        });
        round_trip(Frame::Call {
            token: 7,
            url: "luna://com.webos.settingsservice/getSystemSettings".to_string(),
            payload: r#"{"subscribe":true}"#.to_string(),
            subscribe: true,
        });
        round_trip(Frame::Cancel { token: 7 });
        round_trip(Frame::Register {
            category: "/myPlugin".to_string(),
            name: "getStatus".to_string(),
        });
        round_trip(Frame::Reply {
            token: 7,
            payload: r#"{"returnValue":true}"#.to_string(),
        });
        round_trip(Frame::Request {
            token: 9,
            category: "/myPlugin".to_string(),
            name: "getStatus".to_string(),
            payload: "{}".to_string(),
        });
        round_trip(Frame::Response {
            token: 9,
            payload: r#"{"returnValue":true}"#.to_string(),
        });
    }

    #[test]
    fn test_unknown_frame_type_is_rejected() {
        assert!(serde_json::from_str::<Frame>(r#"{"type":"dance","token":1}"#).is_err());
    }

    #[test]
    fn test_type_tag_shape() {
        let line = serde_json::to_string(&Frame::Cancel { token: 3 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "cancel");
        assert_eq!(value["token"], 3);
    }
}
