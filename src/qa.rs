//! Retrieval-augmented question answering over indexed filings.

use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::llm::{CompletionClient, CompletionError, CompletionRequest, complete_with_backoff};
use crate::qdrant::{ChunkFilterArgs, QdrantError, ScoredPoint, VectorIndex};
use crate::storage::{TextStore, TextStoreError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Answer returned when retrieval finds nothing for the question.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found in the indexed filing.";

const QA_SYSTEM: &str = "You answer questions about SEC filings using only the provided \
excerpts. If the excerpts do not contain the answer, say so. Cite figures exactly.";

/// Errors surfaced while answering a question.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Question embedding failed.
    #[error("Failed to embed question: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store query failed.
    #[error("Retrieval query failed: {0}")]
    Retrieval(#[from] QdrantError),
    /// Chunk text could not be loaded.
    #[error(transparent)]
    Storage(#[from] TextStoreError),
    /// Answer generation failed.
    #[error("Failed to generate answer: {0}")]
    Generation(#[from] CompletionError),
}

/// Provenance of one retrieved chunk used in an answer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    /// Text-store key of the chunk.
    pub text_key: String,
    /// Section the chunk came from.
    pub section: String,
    /// Order of the chunk within its section.
    pub chunk_index: usize,
    /// Similarity score from retrieval.
    pub score: f32,
}

/// Grounded answer with the chunks that supported it.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Generated answer, or [`NO_RELEVANT_INFORMATION`].
    pub answer: String,
    /// Retrieved chunks the answer is grounded on, best first.
    pub sources: Vec<SourceRef>,
}

/// Answers questions against the retrieval index for a single filing.
pub struct AnswerService {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    texts: Arc<dyn TextStore>,
    completion: Arc<dyn CompletionClient>,
    model: String,
    top_k: usize,
}

impl AnswerService {
    /// Create a service retrieving the top `top_k` chunks per question.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        texts: Arc<dyn TextStore>,
        completion: Arc<dyn CompletionClient>,
        model: String,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            texts,
            completion,
            model,
            top_k: top_k.max(1),
        }
    }

    /// Answer a question scoped to one filing, retrieving `top_k` chunks when given and
    /// the configured default otherwise.
    ///
    /// When retrieval returns no hits the fallback answer is returned without calling the
    /// completion provider.
    pub async fn answer(
        &self,
        ticker: &str,
        accession: &str,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<Answer, AnswerError> {
        let mut vectors = self
            .embedder
            .generate_embeddings(vec![question.to_string()])
            .await?;
        let vector = vectors.pop().unwrap_or_default();

        let hits = self
            .index
            .query(
                vector,
                ChunkFilterArgs {
                    ticker: Some(ticker.to_string()),
                    accession: Some(accession.to_string()),
                    section: None,
                },
                top_k.unwrap_or(self.top_k).max(1),
            )
            .await?;

        if hits.is_empty() {
            tracing::debug!(accession, "No retrieval hits for question");
            return Ok(Answer {
                answer: NO_RELEVANT_INFORMATION.to_string(),
                sources: Vec::new(),
            });
        }

        let mut sources = Vec::with_capacity(hits.len());
        let mut excerpts = Vec::with_capacity(hits.len());
        for hit in &hits {
            let Some(source) = source_from_hit(hit) else {
                tracing::warn!(accession, id = %hit.id, "Retrieval hit missing payload fields, skipping");
                continue;
            };
            match self.texts.get(&source.text_key).await? {
                Some(text) => {
                    excerpts.push((source.section.clone(), text));
                    sources.push(source);
                }
                None => {
                    tracing::warn!(accession, text_key = %source.text_key, "Chunk text missing for retrieval hit, skipping");
                }
            }
        }

        if excerpts.is_empty() {
            return Ok(Answer {
                answer: NO_RELEVANT_INFORMATION.to_string(),
                sources: Vec::new(),
            });
        }

        let prompt = build_answer_prompt(question, &excerpts);
        let answer = complete_with_backoff(
            self.completion.as_ref(),
            CompletionRequest {
                model: self.model.clone(),
                system: Some(QA_SYSTEM.to_string()),
                prompt,
            },
        )
        .await?;

        Ok(Answer { answer, sources })
    }
}

fn source_from_hit(hit: &ScoredPoint) -> Option<SourceRef> {
    let payload = hit.payload.as_ref()?;
    Some(SourceRef {
        text_key: payload.get("text_key")?.as_str()?.to_string(),
        section: payload.get("section")?.as_str()?.to_string(),
        chunk_index: payload.get("chunk_index")?.as_u64()? as usize,
        score: hit.score,
    })
}

fn build_answer_prompt(question: &str, excerpts: &[(String, String)]) -> String {
    let mut prompt = String::from("Answer the question using only these filing excerpts.\n\n");
    for (index, (section, text)) in excerpts.iter().enumerate() {
        prompt.push_str(&format!(
            "Excerpt {} (section: {section}):\n{}\n\n",
            index + 1,
            text.trim()
        ));
    }
    prompt.push_str(&format!("Question: {question}\n"));
    prompt
}
