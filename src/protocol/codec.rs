//! Envelope codec: `encode` to a single JSON line, `decode` back to the
//! typed union. Decoding always returns a result, never panics.

use serde_json::{json, Map, Value};

use crate::{
    domain::presence::{OnlineUser, PresenceStatus},
    protocol::envelope::{AuthAction, DecodeError, Envelope},
};

/// Serializes an envelope as one JSON object with no embedded newline.
pub fn encode(envelope: &Envelope) -> String {
    let value = match envelope {
        Envelope::Auth {
            action,
            user_id,
            username,
            timestamp_ms,
        } => {
            let mut object = json!({
                "type": "AUTH",
                "action": action.wire_name(),
                "userId": user_id,
                "timestamp": timestamp_ms,
            });
            if let (Some(fields), Some(username)) = (object.as_object_mut(), username) {
                fields.insert("username".to_owned(), Value::from(username.as_str()));
            }
            object
        }
        Envelope::Message {
            sender_id,
            receiver_id,
            content,
            timestamp_ms,
        } => json!({
            "type": "MESSAGE",
            "senderId": sender_id,
            "receiverId": receiver_id,
            "content": content,
            "timestamp": timestamp_ms,
        }),
        Envelope::Presence {
            user_id,
            status,
            timestamp_ms,
        } => json!({
            "type": "PRESENCE",
            "userId": user_id,
            "status": status.wire_name(),
            "timestamp": timestamp_ms,
        }),
        Envelope::Typing {
            sender_id,
            receiver_id,
            is_typing,
            timestamp_ms,
        } => json!({
            "type": "TYPING",
            "senderId": sender_id,
            "receiverId": receiver_id,
            "isTyping": is_typing,
            "timestamp": timestamp_ms,
        }),
        Envelope::Ack {
            message_id,
            success,
            timestamp_ms,
        } => json!({
            "type": "ACK",
            "messageId": message_id,
            "success": success,
            "timestamp": timestamp_ms,
        }),
        Envelope::UserList {
            users,
            timestamp_ms,
        } => json!({
            "type": "USER_LIST",
            "users": users
                .iter()
                .map(|user| {
                    json!({
                        "userId": user.user_id,
                        "username": user.username,
                        "status": user.status.wire_name(),
                    })
                })
                .collect::<Vec<Value>>(),
            "timestamp": timestamp_ms,
        }),
        Envelope::Error {
            message,
            timestamp_ms,
        } => json!({
            "type": "ERROR",
            "message": message,
            "timestamp": timestamp_ms,
        }),
    };

    value.to_string()
}

/// Parses one wire line into a typed envelope.
pub fn decode(line: &str) -> Result<Envelope, DecodeError> {
    let value: Value = serde_json::from_str(line).map_err(|_| DecodeError::Malformed)?;
    let fields = value.as_object().ok_or(DecodeError::Malformed)?;

    let kind = fields
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::NoType)?;

    match kind {
        "AUTH" => decode_auth(fields),
        "MESSAGE" => Ok(Envelope::Message {
            sender_id: i64_field(fields, "senderId")?,
            receiver_id: i64_field(fields, "receiverId")?,
            content: str_field(fields, "content")?.to_owned(),
            timestamp_ms: i64_field(fields, "timestamp")?,
        }),
        "PRESENCE" => Ok(Envelope::Presence {
            user_id: i64_field(fields, "userId")?,
            status: status_field(fields, "status")?,
            timestamp_ms: i64_field(fields, "timestamp")?,
        }),
        "TYPING" => Ok(Envelope::Typing {
            sender_id: i64_field(fields, "senderId")?,
            receiver_id: i64_field(fields, "receiverId")?,
            is_typing: bool_field(fields, "isTyping")?,
            timestamp_ms: i64_field(fields, "timestamp")?,
        }),
        "ACK" => Ok(Envelope::Ack {
            message_id: str_field(fields, "messageId")?.to_owned(),
            success: bool_field(fields, "success")?,
            timestamp_ms: i64_field(fields, "timestamp")?,
        }),
        "USER_LIST" => Ok(Envelope::UserList {
            users: users_field(fields)?,
            timestamp_ms: i64_field(fields, "timestamp")?,
        }),
        "ERROR" => Ok(Envelope::Error {
            message: str_field(fields, "message")?.to_owned(),
            timestamp_ms: i64_field(fields, "timestamp")?,
        }),
        other => Err(DecodeError::UnknownType(other.to_owned())),
    }
}

fn decode_auth(fields: &Map<String, Value>) -> Result<Envelope, DecodeError> {
    let action = AuthAction::from_wire(str_field(fields, "action")?)
        .ok_or(DecodeError::MissingField("action"))?;
    let user_id = i64_field(fields, "userId")?;
    let timestamp_ms = i64_field(fields, "timestamp")?;

    // LOGIN binds a display name; LOGOUT carries only the id.
    let username = match action {
        AuthAction::Login => Some(str_field(fields, "username")?.to_owned()),
        AuthAction::Logout => fields
            .get("username")
            .and_then(Value::as_str)
            .map(str::to_owned),
    };

    Ok(Envelope::Auth {
        action,
        user_id,
        username,
        timestamp_ms,
    })
}

fn str_field<'a>(
    fields: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a str, DecodeError> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingField(name))
}

fn i64_field(fields: &Map<String, Value>, name: &'static str) -> Result<i64, DecodeError> {
    fields
        .get(name)
        .and_then(Value::as_i64)
        .ok_or(DecodeError::MissingField(name))
}

fn bool_field(fields: &Map<String, Value>, name: &'static str) -> Result<bool, DecodeError> {
    fields
        .get(name)
        .and_then(Value::as_bool)
        .ok_or(DecodeError::MissingField(name))
}

fn status_field(
    fields: &Map<String, Value>,
    name: &'static str,
) -> Result<PresenceStatus, DecodeError> {
    PresenceStatus::from_wire(str_field(fields, name)?).ok_or(DecodeError::MissingField(name))
}

fn users_field(fields: &Map<String, Value>) -> Result<Vec<OnlineUser>, DecodeError> {
    let entries = fields
        .get("users")
        .and_then(Value::as_array)
        .ok_or(DecodeError::MissingField("users"))?;

    entries
        .iter()
        .map(|entry| {
            let entry = entry.as_object().ok_or(DecodeError::MissingField("users"))?;
            Ok(OnlineUser {
                user_id: i64_field(entry, "userId")?,
                username: str_field(entry, "username")?.to_owned(),
                status: status_field(entry, "status")?,
            })
        })
        .collect()
}
