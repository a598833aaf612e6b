use serde_json::Value;

/// Why a message was dropped without any write. Never retried: the
/// message is already consumed from the queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscardReason {
    #[error("payload is not UTF-8: {0}")]
    NotUtf8(String),

    #[error("payload is not JSON: {0}")]
    InvalidJson(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("event has no eventType")]
    MissingEventType,

    #[error("re-serialize: {0}")]
    Serialize(String),
}

/// Why an event's `userId` got no per-user file. The event itself is
/// still stored by type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserIdRejected {
    #[error("userId '{0}' is not a single path segment")]
    NotAPathSegment(String),
}

/// One decoded user-behavior event. The full received document is kept
/// and persisted as-is; the routing fields are extracted from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_type: String,
    timestamp: Option<String>,
    user_id: Option<String>,
    user_rejected: Option<UserIdRejected>,
    document: Value,
}

impl Event {
    pub fn parse(raw: &[u8]) -> Result<Self, DiscardReason> {
        let text = std::str::from_utf8(raw).map_err(|e| DiscardReason::NotUtf8(e.to_string()))?;
        let document: Value =
            serde_json::from_str(text).map_err(|e| DiscardReason::InvalidJson(e.to_string()))?;
        let obj = document.as_object().ok_or(DiscardReason::NotAnObject)?;

        let event_type = match obj.get("eventType") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(DiscardReason::MissingEventType),
        };
        let timestamp = obj.get("timestamp").and_then(Value::as_str).map(str::to_string);
        let (user_id, user_rejected) = match obj.get("userId").map(user_segment) {
            Some(Ok(id)) => (id, None),
            Some(Err(rejected)) => (None, Some(rejected)),
            None => (None, None),
        };

        Ok(Self {
            event_type,
            timestamp,
            user_id,
            user_rejected,
            document,
        })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Set when a `userId` was present but unusable as a directory name.
    pub fn user_rejected(&self) -> Option<&UserIdRejected> {
        self.user_rejected.as_ref()
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Compact JSON plus `\n` (one JSON Lines record). Keys come out sorted.
    pub fn to_json_line(&self) -> Result<Vec<u8>, DiscardReason> {
        let mut line =
            serde_json::to_vec(&self.document).map_err(|e| DiscardReason::Serialize(e.to_string()))?;
        line.push(b'\n');
        Ok(line)
    }
}

/// `userId` as a single path segment. Strings and numbers qualify;
/// empty or non-scalar ids mean "no user"; ids that would escape the
/// user directory are rejected.
fn user_segment(value: &Value) -> Result<Option<String>, UserIdRejected> {
    let id = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Ok(None),
    };
    if id.is_empty() {
        return Ok(None);
    }
    if id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(UserIdRejected::NotAPathSegment(id));
    }
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_routing_fields() {
        let ev = Event::parse(br#"{"eventType":"SEARCH_PERFORMED","timestamp":"2024-05-01T10:00:00Z","userId":42,"data":{"q":"tacos"}}"#).unwrap();
        assert_eq!(ev.event_type(), "SEARCH_PERFORMED");
        assert_eq!(ev.timestamp(), Some("2024-05-01T10:00:00Z"));
        assert_eq!(ev.user_id(), Some("42"));
        assert_eq!(ev.document()["data"]["q"], "tacos");
    }

    #[test]
    fn missing_or_blank_event_type_is_discarded() {
        assert_eq!(Event::parse(br#"{"data":{}}"#).unwrap_err(), DiscardReason::MissingEventType);
        assert_eq!(Event::parse(br#"{"eventType":""}"#).unwrap_err(), DiscardReason::MissingEventType);
        assert_eq!(Event::parse(br#"{"eventType":7}"#).unwrap_err(), DiscardReason::MissingEventType);
        assert_eq!(Event::parse(br#"{"eventType":null}"#).unwrap_err(), DiscardReason::MissingEventType);
    }

    #[test]
    fn malformed_payloads_are_discarded() {
        assert!(matches!(Event::parse(&[0xff, 0xfe]), Err(DiscardReason::NotUtf8(_))));
        assert!(matches!(Event::parse(b"{not json"), Err(DiscardReason::InvalidJson(_))));
        assert_eq!(Event::parse(b"[1,2]").unwrap_err(), DiscardReason::NotAnObject);
    }

    #[test]
    fn user_id_edge_cases() {
        let uid = |raw: &str| Event::parse(raw.as_bytes()).unwrap().user_id().map(str::to_string);
        assert_eq!(uid(r#"{"eventType":"X","userId":""}"#), None);
        assert_eq!(uid(r#"{"eventType":"X","userId":null}"#), None);
        assert_eq!(uid(r#"{"eventType":"X","userId":0}"#), Some("0".into()));
        assert_eq!(uid(r#"{"eventType":"X","userId":"../etc"}"#), None);
        assert_eq!(uid(r#"{"eventType":"X","userId":".."}"#), None);
        assert_eq!(uid(r#"{"eventType":"X","userId":"u-9"}"#), Some("u-9".into()));
    }

    #[test]
    fn unsafe_user_id_carries_a_reason() {
        let ev = Event::parse(br#"{"eventType":"X","userId":"a/b"}"#).unwrap();
        assert_eq!(ev.user_id(), None);
        assert_eq!(ev.user_rejected(), Some(&UserIdRejected::NotAPathSegment("a/b".into())));

        let blank = Event::parse(br#"{"eventType":"X","userId":""}"#).unwrap();
        assert_eq!(blank.user_rejected(), None);
    }

    #[test]
    fn json_line_is_compact_with_newline() {
        let ev = Event::parse(br#"{ "userId": "42", "eventType": "FOO" }"#).unwrap();
        let line = ev.to_json_line().unwrap();
        assert_eq!(line, b"{\"eventType\":\"FOO\",\"userId\":\"42\"}\n");
    }
}
