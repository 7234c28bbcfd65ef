//! Filter helpers for retrieval queries.

use serde_json::{Value, json};

use super::types::ChunkFilterArgs;

/// Compose the standard Qdrant filter payload from optional retrieval scoping.
pub fn build_chunk_filter(args: &ChunkFilterArgs) -> Option<Value> {
    let mut must: Vec<Value> = Vec::new();

    if let Some(ticker) = args.ticker.as_ref().and_then(|value| non_empty(value)) {
        must.push(json!({
            "key": "ticker",
            "match": { "value": ticker }
        }));
    }

    if let Some(accession) = args.accession.as_ref().and_then(|value| non_empty(value)) {
        must.push(json!({
            "key": "accession",
            "match": { "value": accession }
        }));
    }

    if let Some(section) = args.section.as_ref().and_then(|value| non_empty(value)) {
        must.push(json!({
            "key": "section",
            "match": { "value": section }
        }));
    }

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

fn non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_scopes_to_accession_and_ticker() {
        let filter = build_chunk_filter(&ChunkFilterArgs {
            ticker: Some("ACME".into()),
            accession: Some("acc-1".into()),
            ..Default::default()
        })
        .expect("filter");

        assert_eq!(
            filter,
            json!({
                "must": [
                    { "key": "ticker", "match": { "value": "ACME" } },
                    { "key": "accession", "match": { "value": "acc-1" } }
                ]
            })
        );
    }

    #[test]
    fn blank_values_are_ignored() {
        let filter = build_chunk_filter(&ChunkFilterArgs {
            ticker: Some("   ".into()),
            section: Some("Risk Factors".into()),
            ..Default::default()
        })
        .expect("filter");

        assert_eq!(
            filter,
            json!({
                "must": [
                    { "key": "section", "match": { "value": "Risk Factors" } }
                ]
            })
        );
    }

    #[test]
    fn empty_args_build_no_filter() {
        assert!(build_chunk_filter(&ChunkFilterArgs::default()).is_none());
    }
}
