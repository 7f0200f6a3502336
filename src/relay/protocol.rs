/// rosbridge v2 wire protocol (the subset the relay speaks)
///
/// Outbound: `subscribe` operations.
/// Inbound: `publish` (topic data) and `status` (bridge diagnostics).
/// Anything else is ignored.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::TopicSubscription;
use crate::errors::{RelayError, RelayResult};

#[derive(Serialize)]
struct SubscribeOp<'a> {
    op: &'static str,
    id: String,
    topic: &'a str,
    #[serde(rename = "type")]
    message_type: &'a str,
}

/// Raw inbound frame; `msg` is an object for publish and a string for status
#[derive(Deserialize)]
struct RawFrame {
    op: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    msg: Option<Value>,
    #[serde(default)]
    level: Option<String>,
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Publish { topic: String, msg: Value },
    Status { level: String, text: String },
    Ignored { op: String },
}

/// Encode a subscribe operation; `seq` keeps ids unique per connection
pub fn subscribe_frame(subscription: &TopicSubscription, seq: u64) -> RelayResult<String> {
    let op = SubscribeOp {
        op: "subscribe",
        id: format!("subscribe:{}:{}", subscription.topic(), seq),
        topic: subscription.topic(),
        message_type: subscription.message_kind(),
    };
    Ok(serde_json::to_string(&op)?)
}

/// Decode one text frame
pub fn parse_frame(text: &str) -> RelayResult<InboundFrame> {
    let raw: RawFrame = serde_json::from_str(text)
        .map_err(|e| RelayError::Protocol(format!("not a rosbridge operation: {}", e)))?;

    match raw.op.as_str() {
        "publish" => {
            let topic = raw
                .topic
                .ok_or_else(|| RelayError::Protocol("publish without topic".to_string()))?;
            let msg = raw
                .msg
                .ok_or_else(|| RelayError::Protocol(format!("publish on {} without msg", topic)))?;
            Ok(InboundFrame::Publish { topic, msg })
        }
        "status" => Ok(InboundFrame::Status {
            level: raw.level.unwrap_or_else(|| "info".to_string()),
            text: match raw.msg {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => String::new(),
            },
        }),
        _ => Ok(InboundFrame::Ignored { op: raw.op }),
    }
}

/// Turn a published message into the text relayed to observers
///
/// `std_msgs/*` kinds must carry a scalar `data` field; other kinds are
/// relayed as compact JSON.
pub fn extract_payload(message_kind: &str, msg: &Value) -> RelayResult<String> {
    if message_kind.starts_with("std_msgs/") {
        return match msg.get("data") {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(other) => Err(RelayError::Protocol(format!(
                "{} data must be a scalar, got {}",
                message_kind, other
            ))),
            None => Err(RelayError::Protocol(format!(
                "{} message without data field: {}",
                message_kind, msg
            ))),
        };
    }

    if msg.is_object() {
        Ok(msg.to_string())
    } else {
        Err(RelayError::Protocol(format!(
            "{} message is not an object: {}",
            message_kind, msg
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_frame() {
        let sub = TopicSubscription::new("/talker", "std_msgs/String");
        let frame: Value = serde_json::from_str(&subscribe_frame(&sub, 1).unwrap()).unwrap();
        assert_eq!(
            frame,
            json!({
                "op": "subscribe",
                "id": "subscribe:/talker:1",
                "topic": "/talker",
                "type": "std_msgs/String",
            })
        );
    }

    #[test]
    fn test_parse_publish() {
        let frame =
            parse_frame(r#"{"op":"publish","topic":"/talker","msg":{"data":"hello"}}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Publish {
                topic: "/talker".to_string(),
                msg: json!({"data": "hello"}),
            }
        );
    }

    #[test]
    fn test_parse_status_and_unknown_ops() {
        let status =
            parse_frame(r#"{"op":"status","level":"error","msg":"no such topic"}"#).unwrap();
        assert_eq!(
            status,
            InboundFrame::Status {
                level: "error".to_string(),
                text: "no such topic".to_string(),
            }
        );

        let other = parse_frame(r#"{"op":"png","data":"..."}"#).unwrap();
        assert_eq!(
            other,
            InboundFrame::Ignored {
                op: "png".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_frame("hello world").is_err());
        assert!(parse_frame(r#"{"topic":"/talker"}"#).is_err());
        assert!(parse_frame(r#"{"op":"publish","msg":{"data":"x"}}"#).is_err());
        assert!(parse_frame(r#"{"op":"publish","topic":"/talker"}"#).is_err());
    }

    #[test]
    fn test_extract_std_msgs_payloads() {
        assert_eq!(
            extract_payload("std_msgs/String", &json!({"data": "Hello World: 3"})).unwrap(),
            "Hello World: 3"
        );
        assert_eq!(
            extract_payload("std_msgs/Int32", &json!({"data": 42})).unwrap(),
            "42"
        );
        assert_eq!(
            extract_payload("std_msgs/Bool", &json!({"data": true})).unwrap(),
            "true"
        );
        assert!(extract_payload("std_msgs/String", &json!({"text": "hi"})).is_err());
        assert!(extract_payload("std_msgs/String", &json!({"data": ["a"]})).is_err());
    }

    #[test]
    fn test_extract_structured_payload() {
        let msg = json!({"linear": {"x": 0.5}, "angular": {"z": 0.1}});
        let payload = extract_payload("geometry_msgs/Twist", &msg).unwrap();
        let back: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(back, msg);

        assert!(extract_payload("geometry_msgs/Twist", &json!("flat")).is_err());
    }
}
