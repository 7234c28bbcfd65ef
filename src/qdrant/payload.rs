//! Helpers for constructing payloads and deterministic point identifiers.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Metadata describing one retrieval chunk, stored alongside its vector.
#[derive(Debug, Clone)]
pub struct ChunkPayloadArgs<'a> {
    /// Ticker the filing belongs to.
    pub ticker: &'a str,
    /// Accession of the filing.
    pub accession: &'a str,
    /// Canonical section the chunk came from.
    pub section: &'a str,
    /// Order of the chunk within its section.
    pub chunk_index: usize,
    /// Text-store key holding the chunk body.
    pub text_key: &'a str,
    /// Character count of the chunk.
    pub char_count: usize,
}

/// Build the payload object stored alongside each indexed chunk.
pub fn build_chunk_payload(args: &ChunkPayloadArgs<'_>, chunk_hash: &str, timestamp_rfc3339: &str) -> Value {
    let mut payload = Map::new();
    payload.insert("ticker".into(), Value::String(args.ticker.to_string()));
    payload.insert("accession".into(), Value::String(args.accession.to_string()));
    payload.insert("section".into(), Value::String(args.section.to_string()));
    payload.insert("chunk_index".into(), Value::from(args.chunk_index));
    payload.insert("text_key".into(), Value::String(args.text_key.to_string()));
    payload.insert("char_count".into(), Value::from(args.char_count));
    payload.insert("chunk_hash".into(), Value::String(chunk_hash.to_string()));
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Deterministic point identifier for a chunk. Re-running the indexer produces the same
/// id for the same chunk, so upserts overwrite instead of duplicating.
pub fn chunk_point_id(accession: &str, section: &str, chunk_index: usize) -> String {
    let name = format!("{accession}/{section}/{chunk_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_hash_is_stable() {
        let text = "Revenue increased 12% year over year.";
        assert_eq!(compute_chunk_hash(text), compute_chunk_hash(text));
    }

    #[test]
    fn point_id_is_deterministic_and_distinct() {
        let a = chunk_point_id("acc-1", "Risk Factors", 0);
        let b = chunk_point_id("acc-1", "Risk Factors", 0);
        let c = chunk_point_id("acc-1", "Risk Factors", 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn payload_carries_all_retrieval_fields() {
        let args = ChunkPayloadArgs {
            ticker: "ACME",
            accession: "acc-1",
            section: "Business",
            chunk_index: 3,
            text_key: "chunks/acc-1/Business/embed/3",
            char_count: 812,
        };
        let payload = build_chunk_payload(&args, "hash", "2026-01-01T00:00:00Z");
        assert_eq!(payload["ticker"], "ACME");
        assert_eq!(payload["accession"], "acc-1");
        assert_eq!(payload["section"], "Business");
        assert_eq!(payload["chunk_index"], 3);
        assert_eq!(payload["text_key"], "chunks/acc-1/Business/embed/3");
        assert_eq!(payload["char_count"], 812);
        assert_eq!(payload["chunk_hash"], "hash");
    }

    #[test]
    fn timestamp_is_rfc3339_like() {
        let ts = current_timestamp_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }
}
