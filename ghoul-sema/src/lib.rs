#![forbid(unsafe_code)]

mod code_processor;
mod contracts;
mod decl_instantiator;
mod decl_validator;
mod error;
mod lookup;
mod namespace_prototyper;
mod signatures;
mod target;
mod type_compare;
mod type_resolver;
mod walk;

pub use code_processor::CodeProcessor;
pub use contracts::ContractUtil;
pub use decl_instantiator::DeclInstantiator;
pub use decl_validator::BasicDeclValidator;
pub use error::SemaError;
pub use namespace_prototyper::{find_namespace, NamespaceProto, NamespacePrototyper};
pub use signatures::{ArgMatchResult, CompareResult, SignatureComparer};
pub use target::Target;
pub use type_compare::{
    explicit_cast_allowed, implicit_cast_allowed, TemplateComparePlan, TypeCompareUtil,
};
pub use type_resolver::BasicTypeResolver;

use ghoul_ast::AsgContext;

/// Runs the full resolver pipeline over every file in the context:
/// namespace prototyping, basic declaration validation, type resolution,
/// declaration instantiation, and code processing. Execution is strictly
/// forward; the first error aborts the pipeline.
pub fn run_passes(ctx: &mut AsgContext, target: &Target) -> Result<Vec<NamespaceProto>, SemaError> {
    let protos = NamespacePrototyper::generate_prototypes(ctx);

    let files: Vec<ghoul_ast::FileId> = ctx.files().iter().map(|file| file.id).collect();

    {
        let mut validator = BasicDeclValidator::new(ctx, &protos);
        for &file in &files {
            validator.validate_file(file)?;
        }
        validator.validate_merged_namespaces()?;
    }

    {
        let mut resolver = BasicTypeResolver::new(ctx, &protos);
        for &file in &files {
            resolver.resolve_file(file)?;
        }
    }

    {
        let mut instantiator = DeclInstantiator::new(ctx, &protos, target.clone());
        for &file in &files {
            instantiator.process_file(file)?;
        }
        for &file in &files {
            instantiator.validate_uninstantiated_templates(file)?;
        }
    }

    {
        let mut processor = CodeProcessor::new(ctx, &protos, target.clone());
        for &file in &files {
            processor.process_file(file)?;
        }
    }

    Ok(protos)
}
