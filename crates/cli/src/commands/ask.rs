//! Ask command handler.
//!
//! Answers questions about one document end to end: load, index, answer.

use super::{build_pipeline, print_answers, AnswerArgs, QuestionArgs};
use clap::Args;
use policyqa_core::{config::AppConfig, AppResult};

/// Answer questions about a document
#[derive(Args, Debug)]
pub struct AskCommand {
    /// Document URL or path (.pdf, .html, .htm, .txt, .docx)
    #[arg(short, long)]
    pub document: String,

    #[command(flatten)]
    pub questions: QuestionArgs,

    #[command(flatten)]
    pub answer: AnswerArgs,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let questions = self.questions.collect()?;
        let config = self.answer.apply(config)?;
        let pipeline = build_pipeline(&config)?;

        let answers = pipeline.run(&self.document, &questions).await?;
        print_answers(&questions, &answers, self.answer.format)
    }
}
