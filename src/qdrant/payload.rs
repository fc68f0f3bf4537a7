//! Helpers for building and reading chunk payloads.

use crate::index::SearchResult;
use serde_json::{Map, Value, json};

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_payload(document_id: &str, chunk_index: usize, text: &str) -> Value {
    json!({
        "document_id": document_id,
        "chunk_index": chunk_index,
        "text": text,
    })
}

/// Map a scored payload back into a search result.
///
/// Points written by other tools may lack fields; those are skipped rather than failing the
/// whole query.
pub(crate) fn search_result_from_payload(
    score: f32,
    payload: Option<Map<String, Value>>,
) -> Option<SearchResult> {
    let mut map = payload?;
    let document_id = match map.remove("document_id") {
        Some(Value::String(value)) => value,
        _ => return None,
    };
    let chunk_index = map
        .get("chunk_index")
        .and_then(Value::as_u64)
        .and_then(|value| usize::try_from(value).ok())?;
    let text = match map.remove("text") {
        Some(Value::String(value)) => value,
        _ => return None,
    };
    Some(SearchResult {
        document_id,
        chunk_index,
        text,
        score,
    })
}
