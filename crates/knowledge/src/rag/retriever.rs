//! Multi-query retrieval over a [`SearchIndex`].

use crate::types::{RetrievalResult, StructuredQuery};
use crate::vector_index::SearchIndex;
use policyqa_core::config::{RetrievalMode, RetrievalSettings};
use policyqa_core::AppResult;
use std::collections::HashSet;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct MultiQueryRetriever {
    top_k: usize,
    pool_size: usize,
    mode: RetrievalMode,
}

impl MultiQueryRetriever {
    pub fn new(top_k: usize, pool_size: usize, mode: RetrievalMode) -> Self {
        Self {
            top_k,
            pool_size,
            mode,
        }
    }

    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self::new(settings.top_k, settings.pool_size, settings.mode)
    }

    /// Search once per descriptor with its enriched query text.
    ///
    /// In `SharedPool` mode every result carries the same pool: all hits,
    /// deduplicated in first-seen order and capped at `pool_size`. In
    /// `PerQuery` mode each result keeps its own capped hits.
    #[instrument(skip(self, descriptors, index), fields(descriptors = descriptors.len(), mode = self.mode.as_str()))]
    pub async fn retrieve(
        &self,
        descriptors: &[StructuredQuery],
        index: &dyn SearchIndex,
    ) -> AppResult<Vec<RetrievalResult>> {
        let mut hits = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let search_text = descriptor.combined_query();
            debug!("Searching: {}", search_text);
            hits.push(index.search(&search_text, self.top_k).await?);
        }

        let results = match self.mode {
            RetrievalMode::SharedPool => {
                let pool = dedup_capped(hits.into_iter().flatten(), self.pool_size);
                descriptors
                    .iter()
                    .map(|descriptor| result_for(descriptor, pool.clone()))
                    .collect()
            }
            RetrievalMode::PerQuery => descriptors
                .iter()
                .zip(hits)
                .map(|(descriptor, docs)| {
                    result_for(descriptor, dedup_capped(docs, self.pool_size))
                })
                .collect(),
        };

        Ok(results)
    }
}

fn result_for(descriptor: &StructuredQuery, docs: Vec<String>) -> RetrievalResult {
    RetrievalResult {
        query: descriptor.query.clone(),
        parsed: descriptor.clone(),
        docs,
    }
}

fn dedup_capped<I>(docs: I, cap: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    docs.into_iter()
        .filter(|doc| seen.insert(doc.clone()))
        .take(cap)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned hits keyed by the first word of the search text.
    struct FixedIndex {
        hits: HashMap<&'static str, Vec<&'static str>>,
        searches: Mutex<Vec<(String, usize)>>,
    }

    impl FixedIndex {
        fn new(hits: &[(&'static str, &[&'static str])]) -> Self {
            Self {
                hits: hits.iter().map(|(k, v)| (*k, v.to_vec())).collect(),
                searches: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SearchIndex for FixedIndex {
        async fn search(&self, query: &str, k: usize) -> AppResult<Vec<String>> {
            self.searches.lock().unwrap().push((query.to_string(), k));
            let first = query.split_whitespace().next().unwrap_or("");
            Ok(self
                .hits
                .get(first)
                .map(|docs| docs.iter().take(k).map(|d| d.to_string()).collect())
                .unwrap_or_default())
        }
    }

    fn descriptor(query: &str) -> StructuredQuery {
        StructuredQuery {
            query: query.to_string(),
            domain: "insurance".to_string(),
            sub_domain: "health".to_string(),
            key_clauses: vec!["clause".to_string()],
            additional_context: vec!["context".to_string()],
        }
    }

    fn index() -> FixedIndex {
        FixedIndex::new(&[
            ("grace", &["A", "B", "C"][..]),
            ("maternity", &["B", "D", "E"][..]),
            ("towing", &["F"][..]),
        ])
    }

    #[tokio::test]
    async fn test_enriched_search_text() {
        let index = index();
        let retriever = MultiQueryRetriever::new(3, 3, RetrievalMode::SharedPool);
        retriever.retrieve(&[descriptor("grace period?")], &index).await.unwrap();

        let searches = index.searches.lock().unwrap().clone();
        assert_eq!(searches, vec![("grace period? clause context".to_string(), 3)]);
    }

    #[tokio::test]
    async fn test_shared_pool_dedup_and_cap() {
        let retriever = MultiQueryRetriever::new(3, 4, RetrievalMode::SharedPool);
        let results = retriever
            .retrieve(&[descriptor("grace"), descriptor("maternity")], &index())
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].docs, vec!["A", "B", "C", "D"]);
        assert_eq!(results[0].docs, results[1].docs);
        assert_eq!(results[1].query, "maternity");
    }

    #[tokio::test]
    async fn test_shared_pool_default_cap() {
        let retriever = MultiQueryRetriever::from_settings(&RetrievalSettings::default());
        let results = retriever
            .retrieve(&[descriptor("towing"), descriptor("grace")], &index())
            .await
            .unwrap();

        assert_eq!(results[0].docs, vec!["F", "A", "B"]);
    }

    #[tokio::test]
    async fn test_per_query_mode() {
        let retriever = MultiQueryRetriever::new(3, 2, RetrievalMode::PerQuery);
        let results = retriever
            .retrieve(
                &[descriptor("grace"), descriptor("maternity"), descriptor("unknown")],
                &index(),
            )
            .await
            .unwrap();

        assert_eq!(results[0].docs, vec!["A", "B"]);
        assert_eq!(results[1].docs, vec!["B", "D"]);
        assert!(results[2].docs.is_empty());
    }

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let docs = ["x", "y", "x", "z", "y"].iter().map(|s| s.to_string());
        assert_eq!(dedup_capped(docs, 10), vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn test_no_descriptors() {
        let retriever = MultiQueryRetriever::new(3, 3, RetrievalMode::SharedPool);
        assert!(retriever.retrieve(&[], &index()).await.unwrap().is_empty());
    }
}
