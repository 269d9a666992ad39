//! Error types for the glslx compiler

use crate::span::Span;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlslxError {
    #[error("Lexer error at {span:?}: {message}")]
    Lexer { message: String, span: Span },

    #[error("Preprocessor error at {span:?}: {message}")]
    Preprocessor { message: String, span: Span },

    #[error("Parser error at {span:?}: {message}")]
    Parser { message: String, span: Span },

    #[error("Config error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GlslxError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        GlslxError::Lexer {
            message: message.into(),
            span,
        }
    }

    pub fn preprocessor(message: impl Into<String>, span: Span) -> Self {
        GlslxError::Preprocessor {
            message: message.into(),
            span,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        GlslxError::Parser {
            message: message.into(),
            span,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        GlslxError::Config {
            message: message.into(),
        }
    }

    /// Bare message without location decoration
    pub fn message(&self) -> String {
        match self {
            GlslxError::Lexer { message, .. }
            | GlslxError::Preprocessor { message, .. }
            | GlslxError::Parser { message, .. }
            | GlslxError::Config { message } => message.clone(),
            GlslxError::Io(e) => e.to_string(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            GlslxError::Lexer { span, .. }
            | GlslxError::Preprocessor { span, .. }
            | GlslxError::Parser { span, .. } => Some(*span),
            _ => None,
        }
    }
}

/// Result type for glslx operations
pub type GlslxResult<T> = Result<T, GlslxError>;
