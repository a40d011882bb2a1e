// ABOUTME: Error types for the deckforge pipeline
// ABOUTME: Provides structured error handling for each stage of the pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Template not found: {0}")]
    MissingTemplate(String),

    #[error("Template '{id}' violates the template schema: {reason}")]
    SchemaViolation { id: String, reason: String },

    #[error("Template '{id}' requires engine {range}, but this engine is {engine}")]
    IncompatibleEngine {
        id: String,
        range: String,
        engine: String,
    },

    #[error("Template inheritance cycle: {}", .0.join(" -> "))]
    InheritanceCycle(Vec<String>),

    #[error("Partial include cycle: {}", .0.join(" -> "))]
    PartialCycle(Vec<String>),

    #[error("Content analysis failed: {0}")]
    AnalysisError(String),

    #[error("Layout decision failed: {0}")]
    LayoutError(String),

    #[error("Theme selection failed: {0}")]
    StyleError(String),

    #[error("Slide composition failed: {message}")]
    ComposeError {
        message: String,
        #[source]
        source: Option<Box<DeckError>>,
    },

    #[error("Generation cancelled before {phase}")]
    Cancelled { phase: String },

    #[error("Failed to read file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid resource path: {0}")]
    InvalidResourcePath(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown error: {0}")]
    UnknownError(String),
}

impl DeckError {
    /// True for the template validation family, which is never recovered internally.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DeckError::MissingTemplate(_)
                | DeckError::SchemaViolation { .. }
                | DeckError::IncompatibleEngine { .. }
                | DeckError::InheritanceCycle(_)
                | DeckError::PartialCycle(_)
        )
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, DeckError::Cancelled { .. })
    }

    pub(crate) fn compose(message: impl Into<String>, source: DeckError) -> Self {
        DeckError::ComposeError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Implement conversion from anyhow::Error to our DeckError
impl From<anyhow::Error> for DeckError {
    fn from(err: anyhow::Error) -> Self {
        DeckError::UnknownError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;
