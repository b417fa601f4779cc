//! In-memory retrieval index with maximal-marginal-relevance selection.
//!
//! The index is built per request from the chunked corpus and discarded
//! afterwards. Querying ranks passages by cosine similarity to the query,
//! then greedily picks `k` of the top `fetch_k` so each pick balances
//! relevance against redundancy with the passages already chosen:
//!
//! ```text
//! score(c) = λ · sim(q, c) − (1 − λ) · max_{s ∈ S} sim(c, s)
//! ```
//!
//! With `λ = 1.0` this is plain similarity ranking.

use anyhow::{bail, Result};
use std::collections::{BTreeSet, HashSet};

use crate::config::RetrievalConfig;
use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::models::{Passage, Provenance};

/// Diversity selection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmrParams {
    /// Passages to return.
    pub k: usize,
    /// Candidates considered before diversity selection.
    pub fetch_k: usize,
    /// Relevance weight in `[0, 1]`.
    pub lambda_mult: f32,
}

impl From<&RetrievalConfig> for MmrParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            k: config.k,
            fetch_k: config.fetch_k,
            lambda_mult: config.lambda_mult,
        }
    }
}

/// One selected passage.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub index: usize,
    pub text: String,
    pub provenance: BTreeSet<Provenance>,
    /// Cosine similarity to the query.
    pub similarity: f32,
}

/// Passages chosen for one query, in selection order.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub passages: Vec<RetrievedPassage>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }
}

/// Embedded passages for one report request.
pub struct RetrievalIndex {
    passages: Vec<Passage>,
}

impl RetrievalIndex {
    /// Embed every passage in batches of `batch_size`.
    ///
    /// Fails if the provider returns the wrong number of vectors or
    /// vectors of differing dimensionality.
    pub async fn build(
        mut passages: Vec<Passage>,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self> {
        let batch_size = batch_size.max(1);
        let mut dims: Option<usize> = None;

        for batch in passages.chunks_mut(batch_size) {
            let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
            let vectors = embedder.embed(&texts).await?;
            if vectors.len() != texts.len() {
                bail!(
                    "Embedding provider returned {} vectors for {} passages",
                    vectors.len(),
                    texts.len()
                );
            }

            for (passage, vector) in batch.iter_mut().zip(vectors) {
                match dims {
                    None => dims = Some(vector.len()),
                    Some(d) if d != vector.len() => bail!(
                        "Embedding dimension mismatch: expected {}, got {}",
                        d,
                        vector.len()
                    ),
                    Some(_) => {}
                }
                passage.embedding = Some(vector);
            }
        }

        if let Some(d) = dims {
            if d != embedder.dims() {
                tracing::warn!(
                    model = embedder.model_name(),
                    configured = embedder.dims(),
                    actual = d,
                    "embedding dims differ from configuration"
                );
            }
        }

        Ok(Self { passages })
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Embed `query_text` and select passages with [`mmr_select`].
    pub async fn query(
        &self,
        query_text: &str,
        embedder: &dyn Embedder,
        params: MmrParams,
    ) -> Result<RetrievalResult> {
        if self.passages.is_empty() || params.k == 0 {
            return Ok(RetrievalResult::default());
        }
        let query_vec = embed_query(embedder, query_text).await?;
        Ok(self.select(&query_vec, params))
    }

    /// Select passages for an already-embedded query.
    pub fn select(&self, query_vec: &[f32], params: MmrParams) -> RetrievalResult {
        let embeddings: Vec<&[f32]> = self
            .passages
            .iter()
            .map(|p| p.embedding.as_deref().unwrap_or(&[]))
            .collect();
        let texts: Vec<&str> = self.passages.iter().map(|p| p.text.as_str()).collect();

        let picks = mmr_select(query_vec, &embeddings, &texts, params);
        RetrievalResult {
            passages: picks
                .into_iter()
                .map(|(i, similarity)| {
                    let p = &self.passages[i];
                    RetrievedPassage {
                        index: p.index,
                        text: p.text.clone(),
                        provenance: p.provenance.clone(),
                        similarity,
                    }
                })
                .collect(),
        }
    }
}

/// Maximal marginal relevance over parallel `embeddings` / `texts`.
///
/// Returns `(position, similarity)` pairs in selection order. Candidates
/// are the `fetch_k` most similar positions (ties broken by position) with
/// exact-duplicate texts removed. Score ties go to the more relevant
/// candidate.
pub fn mmr_select(
    query_vec: &[f32],
    embeddings: &[&[f32]],
    texts: &[&str],
    params: MmrParams,
) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = embeddings
        .iter()
        .enumerate()
        .map(|(i, e)| (i, cosine_similarity(query_vec, e)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(params.fetch_k.max(params.k));

    let mut seen = HashSet::new();
    let mut candidates: Vec<(usize, f32)> = ranked
        .into_iter()
        .filter(|(i, _)| seen.insert(texts[*i]))
        .collect();

    let lambda = params.lambda_mult.clamp(0.0, 1.0);
    let mut selected: Vec<(usize, f32)> = Vec::with_capacity(params.k);

    while selected.len() < params.k && !candidates.is_empty() {
        let mut best = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (pos, &(i, relevance)) in candidates.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&(s, _)| cosine_similarity(embeddings[i], embeddings[s]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };
            let score = lambda * relevance - (1.0 - lambda) * redundancy;
            // Candidates are in relevance order, so strict `>` keeps ties
            // with the more relevant one.
            if score > best_score {
                best = pos;
                best_score = score;
            }
        }
        selected.push(candidates.remove(best));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use async_trait::async_trait;

    fn params(k: usize, fetch_k: usize, lambda_mult: f32) -> MmrParams {
        MmrParams {
            k,
            fetch_k,
            lambda_mult,
        }
    }

    #[test]
    fn test_lambda_one_is_similarity_ranking() {
        let q = [1.0f32, 0.0];
        let a = [0.9f32, 0.1];
        let b = [0.1f32, 0.9];
        let c = [1.0f32, 0.0];
        let embeddings: Vec<&[f32]> = vec![&a, &b, &c];
        let picks = mmr_select(&q, &embeddings, &["a", "b", "c"], params(3, 3, 1.0));
        let order: Vec<usize> = picks.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn test_diversity_skips_near_duplicates() {
        let q = [1.0f32, 0.5];
        let a = [1.0f32, 0.0];
        let a2 = [1.0f32, 0.05];
        let b = [0.0f32, 1.0];
        let embeddings: Vec<&[f32]> = vec![&a, &a2, &b];
        let texts = ["a", "a-again", "b"];

        let relevance_only = mmr_select(&q, &embeddings, &texts, params(2, 3, 1.0));
        assert_eq!(
            relevance_only.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![1, 0]
        );

        let diverse = mmr_select(&q, &embeddings, &texts, params(2, 3, 0.5));
        assert_eq!(diverse.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_identical_text_deduplicated() {
        let v = [1.0f32, 0.0];
        let w = [0.0f32, 1.0];
        let embeddings: Vec<&[f32]> = vec![&v, &v, &w];
        let picks = mmr_select(&v, &embeddings, &["same", "same", "other"], params(3, 3, 0.7));
        assert_eq!(picks.len(), 2);
        assert_eq!(picks[0].0, 0);
        assert_eq!(picks[1].0, 2);
    }

    #[test]
    fn test_selection_bounded_by_k_and_fetch_k() {
        let vs: Vec<[f32; 2]> = (0..10).map(|i| [1.0, i as f32 * 0.1]).collect();
        let embeddings: Vec<&[f32]> = vs.iter().map(|v| v.as_slice()).collect();
        let texts: Vec<String> = (0..10).map(|i| format!("p{}", i)).collect();
        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();

        let picks = mmr_select(&[1.0, 0.0], &embeddings, &texts, params(3, 5, 0.7));
        assert_eq!(picks.len(), 3);
        // Only the five most similar (lowest i) are candidates.
        assert!(picks.iter().all(|(i, _)| *i < 5));

        let picks = mmr_select(&[1.0, 0.0], &embeddings, &texts, params(25, 60, 0.7));
        assert_eq!(picks.len(), 10);
    }

    fn passage(index: usize, text: &str) -> Passage {
        Passage {
            index,
            start: 0,
            end: text.len(),
            text: text.to_string(),
            provenance: BTreeSet::new(),
            embedding: None,
        }
    }

    #[tokio::test]
    async fn test_build_and_query_with_hash_embedder() {
        let embedder = HashEmbedder::new(1024);
        let passages = vec![
            passage(0, "GDP growth slowed to 5.6 percent"),
            passage(1, "Floods displaced thousands of families in Garissa"),
            passage(2, "Cholera cases reported after floods in Garissa"),
        ];
        let index = RetrievalIndex::build(passages, &embedder, 2).await.unwrap();
        assert_eq!(index.len(), 3);

        let result = index
            .query("floods Garissa families", &embedder, params(1, 3, 1.0))
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.passages[0].index, 1);
    }

    #[tokio::test]
    async fn test_query_empty_index() {
        let embedder = HashEmbedder::new(8);
        let index = RetrievalIndex::build(vec![], &embedder, 4).await.unwrap();
        let result = index.query("x", &embedder, params(5, 10, 0.7)).await.unwrap();
        assert!(result.is_empty());
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0]])
        }
    }

    #[tokio::test]
    async fn test_build_rejects_wrong_vector_count() {
        let passages = vec![passage(0, "a"), passage(1, "b")];
        let err = RetrievalIndex::build(passages, &ShortEmbedder, 8)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("returned 1 vectors for 2 passages"));
    }
}
