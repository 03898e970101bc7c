#![forbid(unsafe_code)]

mod error;
mod parser;

pub use error::ParseError;
pub use parser::Parser;

use ghoul_ast::{AsgContext, FileId};

/// Parses an already-registered source file, attaching its top-level
/// declarations to the file entry in the context.
pub fn parse_file(ctx: &mut AsgContext, file: FileId) -> Result<(), ParseError> {
    let text = ctx.file(file).text.clone();
    let mut parser = Parser::new(ctx, file, &text);
    let decls = parser.parse_decls()?;
    ctx.file_mut(file).decls = decls;
    Ok(())
}

/// Convenience used by tests and tools: parses a single anonymous source
/// string into a fresh context.
pub fn parse_source(src: &str) -> Result<(AsgContext, FileId), ParseError> {
    let mut ctx = AsgContext::new();
    let file = ctx.add_file("<source>".to_string(), src.to_string());
    parse_file(&mut ctx, file)?;
    Ok((ctx, file))
}
