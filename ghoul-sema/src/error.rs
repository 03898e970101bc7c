use ghoul_ast::{FileId, Span};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("semantic error: {message}")]
#[diagnostic(code(ghoul::sema))]
pub struct SemaError {
    pub message: String,
    #[label]
    pub span: Span,
    /// File the span belongs to, when known; the driver uses it to attach
    /// the right source text (spans are per-file offsets).
    pub file: Option<FileId>,
}

impl SemaError {
    pub fn new(message: impl Into<String>, span: Span) -> SemaError {
        SemaError {
            message: message.into(),
            span,
            file: None,
        }
    }

    pub fn with_file(mut self, file: FileId) -> SemaError {
        self.file = Some(file);
        self
    }
}
