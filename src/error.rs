//! Error taxonomy for pipeline definition and execution
//!
//! Component errors (`TemplateError`, `GenerationError`, `LlmError`,
//! `ConfigError`) are raised where they happen; the orchestrator decides
//! which are fatal and reports them as [`CrewError`]s.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for geo-crew operations
#[derive(Debug, Error)]
pub enum CrewError {
    /// Malformed pipeline: dangling dependency, forward or self reference,
    /// missing agent binding. Raised at construction, never during a run.
    #[error("Pipeline definition error: {message}")]
    Definition { message: String },

    #[error("Task '{task_id}' references an unresolved variable: {message}")]
    UnresolvedVariable { task_id: String, message: String },

    #[error("Task '{task_id}' generation failed: {message}")]
    Generation { task_id: String, message: String },

    #[error("Task '{task_id}' timed out: {message}")]
    Timeout { task_id: String, message: String },

    /// A run input would shadow a task's output variable
    #[error("Run input conflicts with task '{task_id}': {message}")]
    ConflictingInput { task_id: String, message: String },

    #[error("Task '{task_id}' could not write {}: {message}", path.display())]
    FileWrite {
        task_id: String,
        path: PathBuf,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("LLM provider error: {0}")]
    Llm(#[from] crate::llm::provider::LlmError),
}

impl CrewError {
    /// Create definition error
    pub fn definition<S: Into<String>>(message: S) -> Self {
        Self::Definition {
            message: message.into(),
        }
    }

    /// Create generation error
    pub fn generation<T: Into<String>, S: Into<String>>(task_id: T, message: S) -> Self {
        Self::Generation {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    /// Create file write error
    pub fn file_write<T: Into<String>, S: Into<String>>(
        task_id: T,
        path: impl Into<PathBuf>,
        message: S,
    ) -> Self {
        Self::FileWrite {
            task_id: task_id.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Task that caused the error, for run-time failures
    pub fn task_id(&self) -> Option<&str> {
        match self {
            CrewError::UnresolvedVariable { task_id, .. }
            | CrewError::Generation { task_id, .. }
            | CrewError::Timeout { task_id, .. }
            | CrewError::ConflictingInput { task_id, .. }
            | CrewError::FileWrite { task_id, .. } => Some(task_id),
            CrewError::Definition { .. } | CrewError::Config(_) | CrewError::Llm(_) => None,
        }
    }

    /// Short machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            CrewError::Definition { .. } => "definition",
            CrewError::UnresolvedVariable { .. } => "unresolved_variable",
            CrewError::Generation { .. } => "generation",
            CrewError::Timeout { .. } => "timeout",
            CrewError::ConflictingInput { .. } => "conflicting_input",
            CrewError::FileWrite { .. } => "file_write",
            CrewError::Config(_) => "config",
            CrewError::Llm(_) => "llm",
        }
    }

    /// User-facing diagnostic with secrets redacted
    pub fn diagnostic(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

static SECRET_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").ok());

static SENSITIVE_PATH_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+").ok()
});

const MAX_DIAGNOSTIC_LEN: usize = 500;

/// Sanitize error messages before showing them to users
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    if let Some(pattern) = SECRET_PATTERN.as_ref() {
        sanitized = pattern.replace_all(&sanitized, "${1}=***").to_string();
    }

    if let Some(pattern) = SENSITIVE_PATH_PATTERN.as_ref() {
        sanitized = pattern
            .replace_all(&sanitized, "/***REDACTED***/")
            .to_string();
    }

    if sanitized.len() > MAX_DIAGNOSTIC_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_DIAGNOSTIC_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for geo-crew operations
pub type CrewResult<T> = Result<T, CrewError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::llm::provider::LlmError;

    #[test]
    fn test_definition_constructor() {
        let error = CrewError::definition("task 'b' depends on later task 'c'");
        assert!(matches!(error, CrewError::Definition { .. }));
        assert_eq!(
            error.to_string(),
            "Pipeline definition error: task 'b' depends on later task 'c'"
        );
        assert_eq!(error.task_id(), None);
        assert_eq!(error.kind(), "definition");
    }

    #[test]
    fn test_generation_constructor() {
        let error = CrewError::generation("review_data_task", "model timeout");
        assert_eq!(
            error.to_string(),
            "Task 'review_data_task' generation failed: model timeout"
        );
        assert_eq!(error.task_id(), Some("review_data_task"));
        assert_eq!(error.kind(), "generation");
    }

    #[test]
    fn test_conflicting_input_carries_task_id() {
        let error = CrewError::ConflictingInput {
            task_id: "task1".to_string(),
            message: "run input 'task1.output' is reserved".to_string(),
        };
        assert_eq!(error.task_id(), Some("task1"));
        assert_eq!(error.kind(), "conflicting_input");
    }

    #[test]
    fn test_file_write_display_includes_path() {
        let error = CrewError::file_write("reporting_task", "output/report.md", "permission denied");
        let text = error.to_string();
        assert!(text.contains("output/report.md"));
        assert!(text.contains("permission denied"));
        assert_eq!(error.kind(), "file_write");
    }

    #[test]
    fn test_from_config_and_llm_errors() {
        let error: CrewError = ConfigError::EnvVarNotFound("ANTHROPIC_API_KEY".to_string()).into();
        assert_eq!(error.kind(), "config");
        assert!(error.to_string().contains("ANTHROPIC_API_KEY"));

        let error: CrewError = LlmError::NotConfigured("missing key".to_string()).into();
        assert_eq!(error.kind(), "llm");
    }

    #[test]
    fn test_diagnostic_redacts_secrets() {
        let error = CrewError::generation("t", "auth failed: api_key=sk-123 token: abc456");
        let diagnostic = error.diagnostic();

        assert!(!diagnostic.contains("sk-123"));
        assert!(!diagnostic.contains("abc456"));
        assert!(diagnostic.contains("key=***"));
        assert!(diagnostic.contains("token=***"));
    }

    #[test]
    fn test_sanitize_redacts_sensitive_paths() {
        let sanitized = sanitize_error_message("Failed to read /home/user/.aws/credentials");
        assert!(sanitized.contains("/***REDACTED***/"));
        assert!(!sanitized.contains(".aws/credentials"));
    }

    #[test]
    fn test_long_message_truncation() {
        let sanitized = sanitize_error_message(&"x".repeat(600));
        assert!(sanitized.len() <= 500);
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let sanitized = sanitize_error_message(&"ø".repeat(400));
        assert!(sanitized.len() <= 500);
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_sanitize_exactly_500_chars() {
        let sanitized = sanitize_error_message(&"x".repeat(500));
        assert_eq!(sanitized.len(), 500);
        assert!(!sanitized.contains("truncated"));
    }
}
