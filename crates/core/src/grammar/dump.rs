use super::ast::Message;

/// Serialize a message tree to a pretty-printed JSON string.
pub fn to_pretty_json(message: &Message) -> String {
    serde_json::to_string_pretty(message).expect("Message serialization cannot fail")
}

/// Deserialize a message tree previously produced by [`to_pretty_json`].
pub fn from_json(json: &str) -> Result<Message, serde_json::Error> {
    serde_json::from_str(json)
}
