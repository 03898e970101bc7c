use ghoul_ast::Span;
use ghoul_lex::LexError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("parse error: {message}")]
#[diagnostic(code(ghoul::parse))]
pub struct ParseError {
    pub message: String,
    #[label]
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> ParseError {
        ParseError {
            message: message.into(),
            span,
        }
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> ParseError {
        ParseError {
            message: err.message,
            span: err.span,
        }
    }
}
