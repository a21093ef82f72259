//! Serve command handler.

use crate::server;
use clap::Args;
use policyqa_core::{config::AppConfig, AppError, AppResult};

/// Run the HTTP answering service
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to listen on (default from config: 0.0.0.0:8000)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Bearer secret clients must present (default: $POLICYQA_API_TOKEN)
    #[arg(long)]
    pub token: Option<String>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let mut config = config.clone();
        if let Some(ref bind) = self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(ref token) = self.token {
            config.server.api_token = Some(token.clone());
        }

        let token = config.resolve_api_token().ok_or_else(|| {
            AppError::Config(format!(
                "No API token configured. Set {} or pass --token",
                config.server.api_token_env
            ))
        })?;

        let pipeline = super::build_pipeline(&config)?;
        server::serve(&config.server.bind, server::AppState::new(pipeline, token)).await
    }
}
