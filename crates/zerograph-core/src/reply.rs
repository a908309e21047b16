//! Reply stream decoding.
//!
//! A reply payload is a YAML document stream with one document per pipelined
//! request, each shaped as:
//!
//! ```text
//! ---
//! head: {"columns":["a","b"]}
//! body:
//!   - [!Node {"id":1,"labels":["Person"]}, 42]
//! foot: {"nodes_created":1}
//! ```
//!
//! or `error: <message>` when that request failed. Tagged values (`!Node`,
//! `!Rel`, `!Rev`, `!Path`, `!Graph`, `!Pointer`) are left in raw form here;
//! turning them into live entities needs the owning graph as context.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{GraphError, RemoteError, Result, Status};

/// One undecoded reply document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub head: Option<Value>,
    pub body: Option<Value>,
    pub foot: Option<Value>,
}

impl Document {
    pub fn is_empty(&self) -> bool {
        self.head.is_none() && self.body.is_none() && self.foot.is_none()
    }

    /// Body items; a non-sequence body counts as a single item.
    pub fn body_items(&self) -> Vec<Value> {
        match &self.body {
            None => Vec::new(),
            Some(Value::Sequence(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }
}

/// Split a reassembled payload into per-request documents.
///
/// Each slot is either the document or the error it carried; a malformed
/// document only fails its own slot. A stream that is not valid YAML fails
/// as a whole because document boundaries can no longer be trusted.
pub fn decode_stream(payload: &str) -> Result<Vec<Result<Document>>> {
    if payload.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut documents = Vec::new();
    for de in serde_yaml::Deserializer::from_str(payload) {
        let value = Value::deserialize(de)
            .map_err(|e| GraphError::Protocol(format!("Unparseable reply stream: {e}")))?;
        documents.push(decode_document(value));
    }
    tracing::trace!(documents = documents.len(), "Decoded reply stream");
    Ok(documents)
}

/// Interpret one parsed document.
pub fn decode_document(value: Value) -> Result<Document> {
    let mapping = match value {
        Value::Null => return Ok(Document::default()),
        Value::Mapping(m) => m,
        other => {
            return Err(GraphError::Protocol(format!(
                "Reply document is not a mapping: {other:?}"
            )))
        }
    };

    if let Some(error) = mapping.get("error") {
        return Err(remote_error(error).into());
    }

    Ok(Document {
        head: non_null(&mapping, "head"),
        body: non_null(&mapping, "body"),
        foot: non_null(&mapping, "foot"),
    })
}

fn non_null(mapping: &Mapping, key: &str) -> Option<Value> {
    mapping.get(key).filter(|v| !v.is_null()).cloned()
}

/// Build a remote error from an `error` entry, either a bare message or a
/// mapping carrying `code`/`status` and `message`.
fn remote_error(value: &Value) -> RemoteError {
    match value {
        Value::String(message) => RemoteError::from_message(message),
        Value::Mapping(m) => {
            let message = m
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let code = m
                .get("code")
                .or_else(|| m.get("status"))
                .and_then(Value::as_u64)
                .and_then(|c| u16::try_from(c).ok());
            match code {
                Some(code) => RemoteError::new(Status::from_code(code), message),
                None => RemoteError::from_message(&message),
            }
        }
        Value::Null => RemoteError::new(Status::ServerError, "Unspecified error"),
        other => RemoteError::from_message(&format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_one_document_per_request() {
        let payload = "---\nbody:\n  - 1\n---\nhead: {\"columns\":[\"n\"]}\nbody:\n  - [2]\n  - [3]\nfoot: {\"rows\":2}\n---\n";
        let docs = decode_stream(payload).unwrap();
        assert_eq!(docs.len(), 3);

        let first = docs[0].as_ref().unwrap();
        assert_eq!(first.body_items(), vec![Value::from(1)]);

        let second = docs[1].as_ref().unwrap();
        assert!(second.head.is_some());
        assert_eq!(second.body_items().len(), 2);
        assert!(second.foot.is_some());

        assert!(docs[2].as_ref().unwrap().is_empty());
    }

    #[test]
    fn error_document_fails_only_its_slot() {
        let payload = "---\nbody:\n  - 1\n---\nerror: Node 99 not found\n---\nbody:\n  - 3\n";
        let docs = decode_stream(payload).unwrap();
        assert_eq!(docs.len(), 3);
        assert!(docs[0].is_ok());
        let err = docs[1].as_ref().unwrap_err();
        assert!(err.is_not_found());
        assert!(docs[2].is_ok());
    }

    #[test]
    fn structured_error_carries_status() {
        let payload = "---\nerror: {\"code\": 409, \"message\": \"exists\"}\n";
        let docs = decode_stream(payload).unwrap();
        match &docs[0] {
            Err(GraphError::Remote(e)) => {
                assert_eq!(e.status, Status::Conflict);
                assert_eq!(e.message, "exists");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn tagged_values_survive_raw() {
        let payload = "---\nbody:\n  - !Node {\"id\":7,\"labels\":[\"Person\"]}\n";
        let docs = decode_stream(payload).unwrap();
        let items = docs[0].as_ref().unwrap().body_items();
        match &items[0] {
            Value::Tagged(tagged) => assert_eq!(tagged.tag.to_string(), "!Node"),
            other => panic!("expected tagged value, got {other:?}"),
        }
    }

    #[test]
    fn non_mapping_document_is_protocol_error() {
        let docs = decode_stream("--- 42\n").unwrap();
        assert!(matches!(docs[0], Err(GraphError::Protocol(_))));
    }

    #[test]
    fn empty_payload_has_no_documents() {
        assert!(decode_stream("").unwrap().is_empty());
        assert!(decode_stream("\n").unwrap().is_empty());
    }

    #[test]
    fn broken_yaml_fails_whole_stream() {
        assert!(decode_stream("---\nbody: [unclosed\n").is_err());
    }
}
