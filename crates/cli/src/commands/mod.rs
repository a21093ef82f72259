//! Command handlers for the PolicyQA CLI.
//!
//! This module organizes all CLI commands into separate submodules, plus the
//! argument groups and output helpers they share.

pub mod ask;
pub mod index;
pub mod query;
pub mod serve;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use index::IndexCommand;
pub use query::QueryCommand;
pub use serve::ServeCommand;

use clap::{Args, ValueEnum};
use policyqa_core::config::{AnswerStyle, AppConfig, RetrievalMode};
use policyqa_core::{AppError, AppResult};
use policyqa_knowledge::{Answer, Pipeline};
use policyqa_llm::create_completion_model;
use std::path::PathBuf;

/// Questions given inline or one per line in a file.
#[derive(Args, Debug)]
pub struct QuestionArgs {
    /// Questions to answer
    pub questions: Vec<String>,

    /// Read questions from a file, one per line
    #[arg(short = 'f', long)]
    pub questions_file: Option<PathBuf>,
}

impl QuestionArgs {
    pub fn collect(&self) -> AppResult<Vec<String>> {
        let mut questions = self.questions.clone();

        if let Some(ref path) = self.questions_file {
            let content = std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("Failed to read questions file {}: {}", path.display(), e))
            })?;
            questions.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string),
            );
        }

        if questions.is_empty() {
            return Err(AppError::Config("No questions provided".to_string()));
        }

        Ok(questions)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `{"answers": [...]}`
    Json,
    /// Question and answer pairs for reading
    Text,
}

/// Answer shaping flags shared by `ask` and `query`.
#[derive(Args, Debug)]
pub struct AnswerArgs {
    /// Answer style (structured, sentence)
    #[arg(long)]
    pub style: Option<String>,

    /// Retrieval mode (shared_pool, per_query)
    #[arg(long)]
    pub mode: Option<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

impl AnswerArgs {
    /// Configuration with this command's style and mode applied.
    pub fn apply(&self, config: &AppConfig) -> AppResult<AppConfig> {
        let mut config = config.clone();
        if let Some(ref style) = self.style {
            config.answers.style = AnswerStyle::parse(style)?;
        }
        if let Some(ref mode) = self.mode {
            config.retrieval.mode = RetrievalMode::parse(mode)?;
        }
        Ok(config)
    }
}

/// Pipeline wired to the configured completion provider.
pub fn build_pipeline(config: &AppConfig) -> AppResult<Pipeline> {
    let model = create_completion_model(config)?;
    tracing::debug!("Using {} model {}", model.provider_name(), model.model());
    Pipeline::from_config(config, model)
}

/// Print answers to stdout.
pub fn print_answers(questions: &[String], answers: &[Answer], format: OutputFormat) -> AppResult<()> {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "answers": answers });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            for (question, answer) in questions.iter().zip(answers) {
                println!("Q: {}", question);
                println!("A: {}", answer.text());
                if let Answer::Structured(record) = answer {
                    for clause in &record.supporting_clauses {
                        println!("   - {}", clause);
                    }
                    if !record.explanation.is_empty() {
                        println!("   {}", record.explanation);
                    }
                }
                println!();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_collect_questions_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "What is the grace period?\n\n  Is maternity covered?  ").unwrap();

        let args = QuestionArgs {
            questions: vec!["Inline question?".to_string()],
            questions_file: Some(file.path().to_path_buf()),
        };

        assert_eq!(
            args.collect().unwrap(),
            vec!["Inline question?", "What is the grace period?", "Is maternity covered?"]
        );
    }

    #[test]
    fn test_no_questions_is_error() {
        let args = QuestionArgs {
            questions: vec![],
            questions_file: None,
        };
        assert!(args.collect().is_err());
    }

    #[test]
    fn test_answer_args_apply() {
        let args = AnswerArgs {
            style: Some("sentence".to_string()),
            mode: Some("per-query".to_string()),
            format: OutputFormat::Json,
        };
        let config = args.apply(&AppConfig::default()).unwrap();
        assert_eq!(config.answers.style, AnswerStyle::Sentence);
        assert_eq!(config.retrieval.mode, RetrievalMode::PerQuery);

        let bad = AnswerArgs {
            style: Some("poem".to_string()),
            mode: None,
            format: OutputFormat::Text,
        };
        assert!(bad.apply(&AppConfig::default()).is_err());
    }
}
