//! Index command handler.

use super::build_pipeline;
use clap::Args;
use policyqa_core::{config::AppConfig, AppResult};

/// Build the persisted index from a document, replacing the previous one
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Document URL or path (.pdf, .html, .htm, .txt, .docx)
    pub document: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Indexing {}", self.document);

        let pipeline = build_pipeline(config)?;
        let index = pipeline.build_index(&self.document).await?;
        let stats = index.stats();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Indexed {} chunks from {}", stats.chunk_count, stats.source);
            println!("  Location:   {}", stats.location.display());
            println!(
                "  Embeddings: {}/{} ({} dims)",
                stats.identity.provider, stats.identity.model, stats.identity.dimensions
            );
            println!("  Built at:   {}", stats.built_at.to_rfc3339());
        }

        Ok(())
    }
}
