//! Batching and order-preserving re-assembly for embedding requests.
//!
//! Blank inputs are never sent to the embedding server. Their positions stay
//! `None` in the output, every other position is guaranteed to be filled.

use serde_json::Value;

use crate::error::EmbeddingError;

/// Length of the raw-response excerpt carried in schema errors.
const SNIPPET_CHARS: usize = 300;

/// A consecutive run of embeddable texts sent in one request.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    /// Position of the first text within the filtered sequence.
    pub offset: usize,
    pub texts: &'a [String],
}

impl Batch<'_> {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Filtered, order-preserving view of an embedding job.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    input_len: usize,
    indices: Vec<usize>,
    texts: Vec<String>,
    batch_size: usize,
}

impl BatchPlan {
    /// Trim every text and keep the non-blank ones with their original index.
    pub fn new<S: AsRef<str>>(texts: &[S], batch_size: usize) -> Result<Self, EmbeddingError> {
        if batch_size == 0 {
            return Err(EmbeddingError::Configuration(
                "batch size must be at least 1".to_string(),
            ));
        }

        let input_len = texts.len();
        let (indices, texts): (Vec<usize>, Vec<String>) = texts
            .iter()
            .enumerate()
            .filter_map(|(i, t)| {
                let trimmed = t.as_ref().trim();
                (!trimmed.is_empty()).then(|| (i, trimmed.to_string()))
            })
            .unzip();

        if texts.is_empty() {
            return Err(EmbeddingError::Validation);
        }

        Ok(Self {
            input_len,
            indices,
            texts,
            batch_size,
        })
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    pub fn embeddable(&self) -> usize {
        self.texts.len()
    }

    pub fn skipped(&self) -> usize {
        self.input_len - self.texts.len()
    }

    pub fn batches(&self) -> impl Iterator<Item = Batch<'_>> {
        self.texts
            .chunks(self.batch_size)
            .enumerate()
            .map(|(n, chunk)| Batch {
                offset: n * self.batch_size,
                texts: chunk,
            })
    }

    pub fn batch_count(&self) -> usize {
        self.texts.len().div_ceil(self.batch_size)
    }

    pub fn assembler(&self) -> Assembler<'_> {
        Assembler {
            plan: self,
            slots: vec![None; self.input_len],
        }
    }

    /// Drive every batch through `embed_batch` and assemble the result.
    pub fn run<F>(&self, mut embed_batch: F) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError>
    where
        F: FnMut(Batch<'_>) -> Result<Vec<Vec<f32>>, EmbeddingError>,
    {
        let mut assembler = self.assembler();
        for batch in self.batches() {
            let embeddings = embed_batch(batch)?;
            assembler.accept(batch, embeddings)?;
        }
        assembler.finish()
    }
}

/// Scatters per-batch results back to their original positions.
#[derive(Debug)]
pub struct Assembler<'a> {
    plan: &'a BatchPlan,
    slots: Vec<Option<Vec<f32>>>,
}

impl Assembler<'_> {
    pub fn accept(
        &mut self,
        batch: Batch<'_>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), EmbeddingError> {
        if embeddings.len() != batch.len() {
            return Err(EmbeddingError::Schema(format!(
                "embedding count mismatch: sent {} items, got {} embeddings",
                batch.len(),
                embeddings.len()
            )));
        }

        let positions = &self.plan.indices[batch.offset..batch.offset + batch.len()];
        for (&original, embedding) in positions.iter().zip(embeddings) {
            self.slots[original] = Some(embedding);
        }
        Ok(())
    }

    /// Every embeddable position must be filled; blank positions stay `None`.
    pub fn finish(self) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
        let missing = self
            .plan
            .indices
            .iter()
            .filter(|&&i| self.slots[i].is_none())
            .count();
        if missing > 0 {
            return Err(EmbeddingError::IncompleteResult { missing });
        }
        Ok(self.slots)
    }
}

fn snippet(body: &str) -> String {
    let mut out: String = body.chars().take(SNIPPET_CHARS).collect();
    if body.chars().count() > SNIPPET_CHARS {
        out.push_str("...");
    }
    out
}

fn parse_vector(value: &Value, body: &str) -> Result<Vec<f32>, EmbeddingError> {
    let items = value.as_array().ok_or_else(|| {
        EmbeddingError::Schema(format!(
            "embedding is not an array; response (trimmed): {}",
            snippet(body)
        ))
    })?;

    items
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                EmbeddingError::Schema(format!(
                    "embedding contains a non-numeric value; response (trimmed): {}",
                    snippet(body)
                ))
            })
        })
        .collect()
}

/// Validate an `/api/embed` response body for a batch of `sent` texts.
pub fn parse_embed_response(body: &str, sent: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let json: Value = serde_json::from_str(body).map_err(|e| {
        EmbeddingError::Schema(format!(
            "response is not valid JSON ({e}); response (trimmed): {}",
            snippet(body)
        ))
    })?;

    let field = json.get("embeddings").ok_or_else(|| {
        EmbeddingError::Schema(format!(
            "missing 'embeddings' in response: {}",
            snippet(body)
        ))
    })?;

    let items = field.as_array().ok_or_else(|| {
        EmbeddingError::Schema(format!(
            "'embeddings' must be a list; response (trimmed): {}",
            snippet(body)
        ))
    })?;

    if items.len() != sent {
        return Err(EmbeddingError::Schema(format!(
            "embedding count mismatch: sent {} items, got {} embeddings; response (trimmed): {}",
            sent,
            items.len(),
            snippet(body)
        )));
    }

    items.iter().map(|item| parse_vector(item, body)).collect()
}

/// Validate a legacy `/api/embeddings` response body (one prompt per request).
pub fn parse_legacy_response(body: &str) -> Result<Vec<f32>, EmbeddingError> {
    let json: Value = serde_json::from_str(body).map_err(|e| {
        EmbeddingError::Schema(format!(
            "response is not valid JSON ({e}); response (trimmed): {}",
            snippet(body)
        ))
    })?;

    let field = json.get("embedding").ok_or_else(|| {
        EmbeddingError::Schema(format!(
            "missing 'embedding' in response: {}",
            snippet(body)
        ))
    })?;

    parse_vector(field, body)
}
