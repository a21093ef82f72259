//! Prompt loader for workspace YAML overrides.

use crate::builtin::builtin_prompt;
use crate::types::PromptDefinition;
use policyqa_core::{AppError, AppResult};
use std::path::Path;

/// Load a prompt definition by ID from the workspace.
///
/// Looks for `<id>.yml` in `.policyqa/prompts/`.
///
/// # Example
/// ```no_run
/// use policyqa_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "answer.structured")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompt_path(workspace_path, prompt_id);

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id {} but was loaded as {}",
            prompt_file, definition.id, prompt_id
        )));
    }

    tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Resolve a prompt: the workspace override if one exists, else the built-in.
pub fn resolve_prompt(workspace_path: Option<&Path>, prompt_id: &str) -> AppResult<PromptDefinition> {
    if let Some(workspace) = workspace_path {
        if prompt_path(workspace, prompt_id).exists() {
            return load_prompt(workspace, prompt_id);
        }
    }

    builtin_prompt(prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))
}

fn prompt_path(workspace_path: &Path, prompt_id: &str) -> std::path::PathBuf {
    workspace_path
        .join(".policyqa/prompts")
        .join(format!("{}.yml", prompt_id))
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.api_version.is_empty() {
        return Err(AppError::Prompt(
            "Prompt apiVersion cannot be empty".to_string(),
        ));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if !matches!(def.output.format.as_str(), "text" | "json") {
        return Err(AppError::Prompt(format!(
            "Invalid output format: {}. Expected 'text' or 'json'",
            def.output.format
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::ANSWER_SENTENCE;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_prompt(dir: &Path, id: &str, valid: bool) -> PathBuf {
        let prompts_dir = dir.join(".policyqa/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();

        let content = if valid {
            format!(
                r#"
id: {}
title: "Terse answer"
apiVersion: "1.0"
createdBy: test
input:
  variables: [query, context, parsed_info]
template: "Q: {{{{query}}}} C: {{{{context}}}}"
output:
  format: text
"#,
                id
            )
        } else {
            "invalid: yaml: content:".to_string()
        };

        let file_path = prompts_dir.join(format!("{}.yml", id));
        fs::write(&file_path, content).unwrap();
        file_path
    }

    #[test]
    fn test_load_valid_prompt() {
        let temp_dir = TempDir::new().unwrap();
        create_test_prompt(temp_dir.path(), "answer.sentence", true);

        let prompt = load_prompt(temp_dir.path(), "answer.sentence").unwrap();
        assert_eq!(prompt.id, "answer.sentence");
        assert_eq!(prompt.title, "Terse answer");
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        create_test_prompt(temp_dir.path(), "invalid", false);
        assert!(load_prompt(temp_dir.path(), "invalid").is_err());
    }

    #[test]
    fn test_load_rejects_mismatched_id() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_test_prompt(temp_dir.path(), "answer.sentence", true);
        fs::rename(&path, path.with_file_name("answer.structured.yml")).unwrap();
        assert!(load_prompt(temp_dir.path(), "answer.structured").is_err());
    }

    #[test]
    fn test_resolve_prefers_override() {
        let temp_dir = TempDir::new().unwrap();
        create_test_prompt(temp_dir.path(), ANSWER_SENTENCE, true);

        let resolved = resolve_prompt(Some(temp_dir.path()), ANSWER_SENTENCE).unwrap();
        assert_eq!(resolved.title, "Terse answer");
    }

    #[test]
    fn test_resolve_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let resolved = resolve_prompt(Some(temp_dir.path()), ANSWER_SENTENCE).unwrap();
        assert_eq!(resolved.created_by, "policyqa");

        let resolved = resolve_prompt(None, ANSWER_SENTENCE).unwrap();
        assert_eq!(resolved.id, ANSWER_SENTENCE);
    }

    #[test]
    fn test_resolve_unknown() {
        assert!(resolve_prompt(None, "nope").is_err());
    }
}
