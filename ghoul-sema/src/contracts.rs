use ghoul_ast::{
    AsgContext, DeclId, Expr, ExprKind, Type, TypeKind, WhereCont,
};

use crate::error::SemaError;
use crate::type_compare::{TypeCompareUtil, TemplateComparePlan};

/// Evaluates `where` clauses against a concrete template argument list.
///
/// The supported predicate is `CheckExtendsType(T, U)`: satisfaction means
/// `T`'s inherited-type set contains `U` modulo type equality.
pub struct ContractUtil<'a> {
    ctx: &'a AsgContext,
    template_params: &'a [DeclId],
    template_args: &'a [Expr],
}

impl<'a> ContractUtil<'a> {
    pub fn new(
        ctx: &'a AsgContext,
        template_params: &'a [DeclId],
        template_args: &'a [Expr],
    ) -> ContractUtil<'a> {
        ContractUtil {
            ctx,
            template_params,
            template_args,
        }
    }

    pub fn check_where_cont(&self, where_cont: &WhereCont) -> Result<bool, SemaError> {
        match &where_cont.condition.kind {
            ExprKind::CheckExtendsType { check, extends } => {
                self.check_extends(check, extends, where_cont.span)
            }
            _ => Err(SemaError::new(
                "unsupported expression found in `where` clause",
                where_cont.span,
            )),
        }
    }

    /// The argument bound to a template typename parameter, if the clause
    /// names a parameter of this template. Unmatched references are left
    /// alone: they may belong to an enclosing template.
    fn template_type_argument(&self, param: DeclId) -> Option<&'a Type> {
        let index = self
            .template_params
            .iter()
            .position(|&candidate| candidate == param)?;
        match &self.template_args.get(index)?.kind {
            ExprKind::Type(ty) => Some(ty),
            _ => None,
        }
    }

    fn check_extends(
        &self,
        check: &Type,
        extends: &Type,
        span: ghoul_ast::Span,
    ) -> Result<bool, SemaError> {
        let TypeKind::TemplateTypenameRef(param) = &check.kind else {
            return Err(SemaError::new(
                "`:` can only be used on template type parameters in this context",
                span,
            ));
        };

        let arg_type = match self.template_type_argument(*param) {
            Some(ty) => ty,
            // The reference may belong to an enclosing template; nothing to
            // evaluate yet.
            None => return Ok(true),
        };

        // Dependent wrappers carry the actual dependent type.
        let arg_type = match &arg_type.kind {
            TypeKind::Dependent(inner) => inner.as_ref(),
            _ => arg_type,
        };

        let compare = TypeCompareUtil::new(self.ctx);

        let inherited: Vec<Type> = match &arg_type.kind {
            TypeKind::Struct(decl) => match &self.ctx.decl(*decl).kind {
                ghoul_ast::DeclKind::Struct(def) => {
                    if def.all_inherited.is_empty() {
                        def.inherited.clone()
                    } else {
                        def.all_inherited.clone()
                    }
                }
                _ => Vec::new(),
            },
            TypeKind::Trait(decl) => match &self.ctx.decl(*decl).kind {
                ghoul_ast::DeclKind::Trait(def) => {
                    if def.all_inherited.is_empty() {
                        def.inherited.clone()
                    } else {
                        def.all_inherited.clone()
                    }
                }
                _ => Vec::new(),
            },
            // `T : i32` and friends fall back to plain identity/inheritance.
            _ => {
                return Ok(compare.are_same_or_inherits(arg_type, extends));
            }
        };

        for candidate in &inherited {
            if compare.are_same(candidate, extends, TemplateComparePlan::Strict)
                || compare.are_same_or_inherits(candidate, extends)
            {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
