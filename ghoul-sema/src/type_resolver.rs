use ghoul_ast::{
    AsgContext, BuiltInKind, DeclId, DeclKind, Expr, ExprKind, FileId, Ident, NamespaceDecl,
    Type, TypeKind,
};
use tracing::debug;

use crate::error::SemaError;
use crate::lookup::{expr_to_unresolved_type, is_type_decl, NameLookup};
use crate::namespace_prototyper::NamespaceProto;
use crate::walk;

/// Rewrites `Unresolved`/`UnresolvedNested` types in place by name lookup
/// rooted at the containing scope. Template invocations become `Templated`
/// types carrying every same-name candidate; template-parameter names
/// become `TemplateTypenameRef`.
pub struct BasicTypeResolver<'a> {
    ctx: &'a mut AsgContext,
    protos: &'a [NamespaceProto],
}

impl<'a> BasicTypeResolver<'a> {
    pub fn new(ctx: &'a mut AsgContext, protos: &'a [NamespaceProto]) -> BasicTypeResolver<'a> {
        BasicTypeResolver { ctx, protos }
    }

    pub fn resolve_file(&mut self, file: FileId) -> Result<(), SemaError> {
        debug!(file = file.index(), "resolving type references");

        let top_decls = self.ctx.file(file).decls.clone();
        for decl_id in top_decls {
            self.resolve_decl(file, decl_id)
                .map_err(|err| err.with_file(file))?;
        }
        Ok(())
    }

    fn resolve_decl(&mut self, file: FileId, decl_id: DeclId) -> Result<(), SemaError> {
        // Resolution works on a copy of the payload so lookups rooted at
        // this very declaration (its template parameters, its members) see
        // the original intact.
        let mut kind = self.ctx.decl(decl_id).kind.clone();

        let ctx = &*self.ctx;
        let protos = self.protos;
        walk::visit_decl_kind(&mut kind, &mut |ty: &mut Type| {
            resolve_type(ctx, protos, file, Some(decl_id), ty)
        })?;

        self.ctx.decl_mut(decl_id).kind = kind;

        let decl = self.ctx.decl(decl_id);
        let mut children = decl.member_ids();
        if let Some(params) = decl.template_params() {
            children.extend_from_slice(params);
        }
        if let Some(func) = decl.function() {
            children.extend_from_slice(&func.params);
        }
        if let DeclKind::Subscript(subscript) = &decl.kind {
            children.extend_from_slice(&subscript.params);
        }

        for child in children {
            self.resolve_decl(file, child)?;
        }
        Ok(())
    }
}

pub(crate) fn resolve_type(
    ctx: &AsgContext,
    protos: &[NamespaceProto],
    file: FileId,
    scope: Option<DeclId>,
    ty: &mut Type,
) -> Result<(), SemaError> {
    match &mut ty.kind {
        TypeKind::Unresolved { path, name, args } => {
            resolve_type_args(ctx, protos, file, scope, args)?;
            let path = std::mem::take(path);
            let name = name.clone();
            let args = std::mem::take(args);
            ty.kind = resolve_named(ctx, protos, file, scope, &path, &name, args, ty.span)?;
            Ok(())
        }
        TypeKind::UnresolvedNested {
            container,
            name,
            args,
        } => {
            resolve_type_args(ctx, protos, file, scope, args)?;

            let member_scope = match &container.kind {
                TypeKind::Struct(id)
                | TypeKind::Enum(id)
                | TypeKind::Trait(id) => Some(*id),
                // The container is itself templated or dependent; nested
                // resolution waits for instantiation.
                _ => None,
            };

            if let Some(container_decl) = member_scope {
                let name = name.clone();
                let args = std::mem::take(args);
                ty.kind = resolve_member_type(ctx, protos, file, container_decl, &name, args, ty.span)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Rewrites template-argument expressions that name types into first-class
/// type expressions, resolving them on the way.
pub(crate) fn resolve_type_args(
    ctx: &AsgContext,
    protos: &[NamespaceProto],
    file: FileId,
    scope: Option<DeclId>,
    args: &mut [Expr],
) -> Result<(), SemaError> {
    for arg in args.iter_mut() {
        if matches!(arg.kind, ExprKind::Type(_) | ExprKind::Literal(_)) {
            continue;
        }
        if let Some(mut ty) = expr_to_unresolved_type(arg) {
            // Only adopt the type reading when the name actually resolves;
            // a const-parameter reference stays an expression.
            if resolve_type(ctx, protos, file, scope, &mut ty).is_ok() {
                arg.kind = ExprKind::Type(Box::new(ty));
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn resolve_named(
    ctx: &AsgContext,
    protos: &[NamespaceProto],
    file: FileId,
    scope: Option<DeclId>,
    path: &[Ident],
    name: &Ident,
    args: Vec<Expr>,
    span: ghoul_ast::Span,
) -> Result<TypeKind, SemaError> {
    if path.is_empty() {
        if let Some(builtin) = BuiltInKind::from_name(&name.node) {
            if !args.is_empty() {
                return Err(SemaError::new(
                    format!("built-in type `{}` is not a template", name.node),
                    span,
                ));
            }
            return Ok(TypeKind::BuiltIn(builtin));
        }

        if name.node == "Self" {
            return Ok(TypeKind::SelfType);
        }
    }

    let lookup = NameLookup::new(ctx, protos);

    let candidates: Vec<DeclId> = if path.is_empty() {
        lookup
            .lookup(file, scope, &name.node)
            .into_iter()
            .filter(|&id| is_type_decl(&ctx.decl(id).kind))
            .collect()
    } else {
        let path_strings: Vec<String> = path.iter().map(|seg| seg.node.clone()).collect();
        match lookup.resolve_namespace(file, &path_strings) {
            Some(proto) => proto
                .members
                .iter()
                .copied()
                .filter(|&id| {
                    ctx.decl(id).name.node == name.node && is_type_decl(&ctx.decl(id).kind)
                })
                .collect(),
            None => {
                // Dotted names can also be nested types: resolve the head
                // as a type and walk the members.
                let (first, rest) = path.split_first().expect("path is non-empty");
                let head_kind =
                    resolve_named(ctx, protos, file, scope, &[], first, Vec::new(), span)?;
                let mut container = match head_kind {
                    TypeKind::Struct(id) | TypeKind::Enum(id) | TypeKind::Trait(id) => id,
                    _ => {
                        return Err(SemaError::new(
                            format!("`{}` is not a namespace or type", first.node),
                            span,
                        ));
                    }
                };
                for segment in rest {
                    let kind =
                        resolve_member_type(ctx, protos, file, container, segment, Vec::new(), span)?;
                    container = match kind {
                        TypeKind::Struct(id) | TypeKind::Enum(id) | TypeKind::Trait(id) => id,
                        _ => {
                            return Err(SemaError::new(
                                format!("`{}` is not a type container", segment.node),
                                span,
                            ));
                        }
                    };
                }
                return resolve_member_type(ctx, protos, file, container, name, args, span);
            }
        }
    };

    let Some(&first) = candidates.first() else {
        return Err(SemaError::new(
            format!("unresolved type `{}`", name.node),
            span,
        ));
    };

    decl_to_type_kind(ctx, protos, file, scope, &candidates, first, name, args, span)
}

pub(crate) fn resolve_member_type(
    ctx: &AsgContext,
    protos: &[NamespaceProto],
    file: FileId,
    container: DeclId,
    name: &Ident,
    args: Vec<Expr>,
    span: ghoul_ast::Span,
) -> Result<TypeKind, SemaError> {
    let members = ctx.decl(container).member_ids();
    let candidates: Vec<DeclId> = members
        .into_iter()
        .filter(|&id| ctx.decl(id).name.node == name.node && is_type_decl(&ctx.decl(id).kind))
        .collect();

    let Some(&first) = candidates.first() else {
        return Err(SemaError::new(
            format!(
                "type `{}` has no nested type `{}`",
                ctx.decl(container).name.node,
                name.node
            ),
            span,
        ));
    };

    decl_to_type_kind(ctx, protos, file, None, &candidates, first, name, args, span)
}

#[allow(clippy::too_many_arguments)]
fn decl_to_type_kind(
    ctx: &AsgContext,
    protos: &[NamespaceProto],
    file: FileId,
    scope: Option<DeclId>,
    candidates: &[DeclId],
    first: DeclId,
    name: &Ident,
    args: Vec<Expr>,
    span: ghoul_ast::Span,
) -> Result<TypeKind, SemaError> {
    match &ctx.decl(first).kind {
        DeclKind::TemplateParameter(_) => {
            if !args.is_empty() {
                return Err(SemaError::new(
                    format!("template parameter `{}` cannot take template arguments", name.node),
                    span,
                ));
            }
            Ok(TypeKind::TemplateTypenameRef(first))
        }
        DeclKind::TemplateStruct(_) => {
            let templates: Vec<DeclId> = candidates
                .iter()
                .copied()
                .filter(|&id| matches!(ctx.decl(id).kind, DeclKind::TemplateStruct(_)))
                .collect();
            if args.is_empty() {
                Ok(TypeKind::TemplateStruct(first))
            } else {
                Ok(TypeKind::Templated {
                    candidates: templates,
                    args,
                })
            }
        }
        DeclKind::TemplateTrait(_) => {
            let templates: Vec<DeclId> = candidates
                .iter()
                .copied()
                .filter(|&id| matches!(ctx.decl(id).kind, DeclKind::TemplateTrait(_)))
                .collect();
            if args.is_empty() {
                Ok(TypeKind::TemplateTrait(first))
            } else {
                Ok(TypeKind::Templated {
                    candidates: templates,
                    args,
                })
            }
        }
        DeclKind::Struct(_) => {
            if !args.is_empty() {
                return Err(SemaError::new(
                    format!("`{}` is not a template", name.node),
                    span,
                ));
            }
            Ok(TypeKind::Struct(first))
        }
        DeclKind::Trait(_) => {
            if !args.is_empty() {
                return Err(SemaError::new(
                    format!("`{}` is not a template", name.node),
                    span,
                ));
            }
            Ok(TypeKind::Trait(first))
        }
        DeclKind::Enum(_) => {
            if !args.is_empty() {
                return Err(SemaError::new(
                    format!("`{}` is not a template", name.node),
                    span,
                ));
            }
            Ok(TypeKind::Enum(first))
        }
        DeclKind::TypeAlias(alias) => {
            if alias.template_params.is_empty() {
                if !args.is_empty() {
                    return Err(SemaError::new(
                        format!("typealias `{}` is not a template", name.node),
                        span,
                    ));
                }
                Ok(TypeKind::Alias(first))
            } else {
                // Template alias application substitutes eagerly.
                expand_template_alias(ctx, protos, file, scope, first, args, span)
            }
        }
        other => Err(SemaError::new(
            format!("`{}` does not name a type (found {other:?})", name.node),
            span,
        )),
    }
}

/// Substitutes a template alias's typename parameters with the given type
/// arguments and returns the expanded value.
fn expand_template_alias(
    ctx: &AsgContext,
    protos: &[NamespaceProto],
    file: FileId,
    scope: Option<DeclId>,
    alias_id: DeclId,
    args: Vec<Expr>,
    span: ghoul_ast::Span,
) -> Result<TypeKind, SemaError> {
    let DeclKind::TypeAlias(alias) = &ctx.decl(alias_id).kind else {
        unreachable!("caller checked the decl kind");
    };

    if args.len() != alias.template_params.len() {
        return Err(SemaError::new(
            format!(
                "typealias `{}` expects {} template arguments, found {}",
                ctx.decl(alias_id).name.node,
                alias.template_params.len(),
                args.len()
            ),
            span,
        ));
    }

    let mut value = alias.value.clone();
    // The alias value may not have been resolved yet (decl order within the
    // file); resolve a copy in the alias's own scope.
    walk::visit_type(&mut value, &mut |ty: &mut Type| {
        resolve_type(ctx, protos, file, Some(alias_id), ty)
    })?;

    let params = alias.template_params.clone();
    walk::visit_type(&mut value, &mut |ty: &mut Type| {
        if let TypeKind::TemplateTypenameRef(param) = &ty.kind {
            if let Some(index) = params.iter().position(|candidate| candidate == param) {
                if let ExprKind::Type(arg_type) = &args[index].kind {
                    let qualifier = ty.qualifier;
                    *ty = (**arg_type).clone();
                    if qualifier != ghoul_ast::TypeQualifier::Unassigned {
                        ty.qualifier = qualifier;
                    }
                }
            }
        }
        Ok(())
    })?;

    Ok(value.kind)
}
