//! Query command handler.
//!
//! Answers questions against the index built by `policyqa index`, without
//! fetching the document again.

use super::{build_pipeline, print_answers, AnswerArgs, QuestionArgs};
use clap::Args;
use policyqa_core::{config::AppConfig, AppResult};

/// Answer questions against the persisted index
#[derive(Args, Debug)]
pub struct QueryCommand {
    #[command(flatten)]
    pub questions: QuestionArgs,

    #[command(flatten)]
    pub answer: AnswerArgs,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let questions = self.questions.collect()?;
        let config = self.answer.apply(config)?;
        let pipeline = build_pipeline(&config)?;

        let index = pipeline.load_index()?;
        tracing::info!(
            "Querying index at {} ({} chunks)",
            index.location().display(),
            index.len()
        );

        let answers = pipeline.answer_all_queries(&questions, &index).await?;
        print_answers(&questions, &answers, self.answer.format)
    }
}
