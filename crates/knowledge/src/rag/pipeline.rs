//! End-to-end answering: document in, one answer per question out.

use crate::chunker::Chunker;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::extract::DocumentLoader;
use crate::rag::query::QueryUnderstander;
use crate::rag::retriever::MultiQueryRetriever;
use crate::rag::synthesizer::AnswerSynthesizer;
use crate::types::{Answer, RetrievalResult};
use crate::vector_index::{SearchIndex, VectorIndex};
use futures::stream::{self, StreamExt, TryStreamExt};
use policyqa_core::{AppConfig, AppError, AppResult};
use policyqa_llm::CompletionModel;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Extracting,
    Indexing,
    Understanding,
    Retrieving,
    Synthesizing,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Indexing => "indexing",
            Self::Understanding => "understanding",
            Self::Retrieving => "retrieving",
            Self::Synthesizing => "synthesizing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of one request; every transition is logged.
#[derive(Debug)]
struct StageTracker {
    current: PipelineStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: PipelineStage::Idle,
        }
    }

    fn enter(&mut self, next: PipelineStage) {
        info!(from = %self.current, to = %next, "Pipeline stage");
        self.current = next;
    }

    fn fail(&mut self, err: &AppError) {
        if !self.current.is_terminal() {
            error!(from = %self.current, error = %err, "Pipeline failed");
            self.current = PipelineStage::Failed;
        }
    }
}

/// Sequences loading, chunking, indexing, understanding, retrieval and
/// synthesis.
pub struct Pipeline {
    loader: DocumentLoader,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    understander: QueryUnderstander,
    retriever: MultiQueryRetriever,
    synthesizer: AnswerSynthesizer,
    index_location: PathBuf,
    max_concurrency: usize,
}

impl Pipeline {
    /// Assemble a pipeline from configuration around `model`.
    pub fn from_config(config: &AppConfig, model: CompletionModel) -> AppResult<Self> {
        let workspace = Some(config.workspace.as_path());

        Ok(Self {
            loader: DocumentLoader::new(Duration::from_secs(config.pipeline.fetch_timeout_secs))?,
            chunker: Chunker::from_settings(&config.chunking)?,
            embedder: create_provider(&config.embedding)?,
            understander: QueryUnderstander::from_workspace(model.clone(), workspace)?,
            retriever: MultiQueryRetriever::from_settings(&config.retrieval),
            synthesizer: AnswerSynthesizer::from_workspace(
                model,
                config.answers.style,
                config.retrieval.max_context_docs,
                workspace,
            )?,
            index_location: config.index_path(),
            max_concurrency: config.pipeline.max_concurrency.max(1),
        })
    }

    pub fn index_location(&self) -> &Path {
        &self.index_location
    }

    /// Load `document_ref`, rebuild the index from it and answer `questions`.
    pub async fn run(&self, document_ref: &str, questions: &[String]) -> AppResult<Vec<Answer>> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", run_id = %run_id, questions = questions.len());

        async {
            let mut stages = StageTracker::new();
            let result = self.run_stages(&mut stages, document_ref, questions).await;
            match &result {
                Ok(answers) => {
                    stages.enter(PipelineStage::Done);
                    info!("Answered {} questions", answers.len());
                }
                Err(e) => stages.fail(e),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Load `document_ref` and replace the persisted index with it.
    pub async fn build_index(&self, document_ref: &str) -> AppResult<VectorIndex> {
        let mut stages = StageTracker::new();
        let result = self.ingest(&mut stages, document_ref).await;
        match &result {
            Ok(_) => stages.enter(PipelineStage::Done),
            Err(e) => stages.fail(e),
        }
        result
    }

    /// Open the persisted index built by [`Pipeline::build_index`].
    pub fn load_index(&self) -> AppResult<VectorIndex> {
        VectorIndex::load(&self.index_location, self.embedder.clone())
    }

    /// Answer `questions` against an existing index.
    ///
    /// Always returns exactly one answer per question, in question order.
    pub async fn answer_all_queries(
        &self,
        questions: &[String],
        index: &dyn SearchIndex,
    ) -> AppResult<Vec<Answer>> {
        let mut stages = StageTracker::new();
        let result = self.answer_stages(&mut stages, questions, index).await;
        match &result {
            Ok(_) => stages.enter(PipelineStage::Done),
            Err(e) => stages.fail(e),
        }
        result
    }

    async fn run_stages(
        &self,
        stages: &mut StageTracker,
        document_ref: &str,
        questions: &[String],
    ) -> AppResult<Vec<Answer>> {
        let index = self.ingest(stages, document_ref).await?;
        self.answer_stages(stages, questions, &index).await
    }

    async fn ingest(&self, stages: &mut StageTracker, document_ref: &str) -> AppResult<VectorIndex> {
        stages.enter(PipelineStage::Extracting);
        let text = self.loader.load(document_ref).await?;

        stages.enter(PipelineStage::Indexing);
        let chunks = self.chunker.chunk(&text, document_ref);
        info!("Indexing {} chunks from {}", chunks.len(), document_ref);
        VectorIndex::build(chunks, self.embedder.clone(), &self.index_location).await
    }

    async fn answer_stages(
        &self,
        stages: &mut StageTracker,
        questions: &[String],
        index: &dyn SearchIndex,
    ) -> AppResult<Vec<Answer>> {
        if questions.is_empty() {
            return Ok(Vec::new());
        }

        stages.enter(PipelineStage::Understanding);
        let descriptors = self.understander.parse(questions).await?;
        if descriptors.is_empty() {
            info!("Query understanding failed; no descriptors for {} questions", questions.len());
            return Ok(questions.iter().map(|_| Answer::unparsed()).collect());
        }

        stages.enter(PipelineStage::Retrieving);
        let results = self.retriever.retrieve(&descriptors, index).await?;
        let aligned = align_results(questions, results);

        stages.enter(PipelineStage::Synthesizing);
        let synthesizer = &self.synthesizer;
        let futures: Vec<_> = questions
            .iter()
            .zip(aligned)
            .map(|(question, result)| async move {
                match result {
                    Some(result) => {
                        synthesizer
                            .synthesize(question, &result.docs, Some(&result.parsed))
                            .await
                    }
                    None => Ok(Answer::unparsed()),
                }
            })
            .collect();
        stream::iter(futures)
        .buffered(self.max_concurrency)
        .try_collect()
        .await
    }
}

/// Assign each question at most one retrieval result.
///
/// Exact query-text matches win; remaining questions take the unused result
/// at their own index, if any.
fn align_results(
    questions: &[String],
    results: Vec<RetrievalResult>,
) -> Vec<Option<RetrievalResult>> {
    let mut pool: Vec<Option<RetrievalResult>> = results.into_iter().map(Some).collect();
    let mut aligned: Vec<Option<RetrievalResult>> = vec![None; questions.len()];

    for (i, question) in questions.iter().enumerate() {
        let matched = pool
            .iter()
            .position(|r| r.as_ref().is_some_and(|r| r.query.trim() == question.trim()));
        if let Some(j) = matched {
            aligned[i] = pool[j].take();
        }
    }

    for (i, slot) in aligned.iter_mut().enumerate() {
        if slot.is_some() {
            continue;
        }
        if let Some(result) = pool.get_mut(i).and_then(Option::take) {
            warn!(
                question = %questions[i],
                descriptor = %result.query,
                "No descriptor matches question text; using descriptor at same position"
            );
            *slot = Some(result);
        }
    }

    aligned
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("chunker", &self.chunker)
            .field("embedder", &self.embedder.identity())
            .field("retriever", &self.retriever)
            .field("style", &self.synthesizer.style())
            .field("index_location", &self.index_location)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}
