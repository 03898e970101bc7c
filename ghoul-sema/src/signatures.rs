use ghoul_ast::{
    AsgContext, DeclId, DeclKind, Expr, ExprKind, LabeledArgument, LiteralKind,
    TemplateParameterKind, Type, TypeKind, TypeQualifier,
};

use crate::type_compare::{implicit_cast_allowed, TemplateComparePlan, TypeCompareUtil};

/// Result of comparing two declarations for redefinition purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareResult {
    Different,
    /// Same callable shape once default-value coverage is considered; used
    /// to warn about near-collisions.
    Similar,
    Exact,
}

/// Result of matching a call's arguments against a candidate's parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgMatchResult {
    Fail,
    /// Matches after implicit conversions.
    Castable,
    /// Matches exactly.
    Match,
}

pub struct SignatureComparer<'a> {
    ctx: &'a AsgContext,
}

impl<'a> SignatureComparer<'a> {
    pub fn new(ctx: &'a AsgContext) -> SignatureComparer<'a> {
        SignatureComparer { ctx }
    }

    pub fn compare_functions(
        &self,
        left: DeclId,
        right: DeclId,
        check_similar: bool,
    ) -> CompareResult {
        let left_decl = self.ctx.decl(left);
        let right_decl = self.ctx.decl(right);

        if left_decl.is_static() != right_decl.is_static()
            || left_decl.is_mutable() != right_decl.is_mutable()
            || left_decl.name.node != right_decl.name.node
        {
            return CompareResult::Different;
        }

        let (Some(left_func), Some(right_func)) = (left_decl.function(), right_decl.function())
        else {
            return CompareResult::Different;
        };

        self.compare_parameters(
            &left_func.params,
            &right_func.params,
            check_similar,
            TemplateComparePlan::Strict,
        )
    }

    pub fn compare_parameters(
        &self,
        left: &[DeclId],
        right: &[DeclId],
        check_similar: bool,
        plan: TemplateComparePlan,
    ) -> CompareResult {
        if left.len() != right.len() && !check_similar {
            return CompareResult::Different;
        }

        let count = left.len().max(right.len());
        let compare = TypeCompareUtil::new(self.ctx);

        for index in 0..count {
            if index >= left.len() {
                // The functions collide through optional parameters.
                return if check_similar && self.param(right[index]).default_value.is_some() {
                    CompareResult::Similar
                } else {
                    CompareResult::Different
                };
            }
            if index >= right.len() {
                return if check_similar && self.param(left[index]).default_value.is_some() {
                    CompareResult::Similar
                } else {
                    CompareResult::Different
                };
            }

            let left_param = self.param(left[index]);
            let right_param = self.param(right[index]);

            if !check_similar
                && left_param.default_value.is_some() != right_param.default_value.is_some()
            {
                return CompareResult::Different;
            }

            if left_param.label.node != right_param.label.node {
                return CompareResult::Different;
            }

            // `ref T` and `T` collide (the former is callable with a plain
            // value); `ref mut T` does not.
            let left_type = strip_value_reference(&left_param.param_type);
            let right_type = strip_value_reference(&right_param.param_type);

            if !compare.are_same(left_type, right_type, plan) {
                return CompareResult::Different;
            }
        }

        CompareResult::Exact
    }

    pub fn compare_template_functions(
        &self,
        left: DeclId,
        right: DeclId,
        check_similar: bool,
    ) -> CompareResult {
        let left_decl = self.ctx.decl(left);
        let right_decl = self.ctx.decl(right);

        if left_decl.is_static() != right_decl.is_static()
            || left_decl.is_mutable() != right_decl.is_mutable()
            || left_decl.name.node != right_decl.name.node
        {
            return CompareResult::Different;
        }

        let (DeclKind::TemplateFunction(left_template), DeclKind::TemplateFunction(right_template)) =
            (&left_decl.kind, &right_decl.kind)
        else {
            return CompareResult::Different;
        };

        if left_template.template_params.len() != right_template.template_params.len() {
            return CompareResult::Different;
        }

        let compare = TypeCompareUtil::new(self.ctx);

        for (left_id, right_id) in left_template
            .template_params
            .iter()
            .zip(right_template.template_params.iter())
        {
            let left_param = self.template_param(*left_id);
            let right_param = self.template_param(*right_id);

            if left_param.param_kind != right_param.param_kind {
                return CompareResult::Different;
            }

            // Typename parameters need no further checks: `<G>` == `<T>`.
            if left_param.param_kind == TemplateParameterKind::Const {
                let (Some(left_type), Some(right_type)) = (&left_param.ty, &right_param.ty) else {
                    return CompareResult::Different;
                };
                if !compare.are_same(
                    strip_value_reference(left_type),
                    strip_value_reference(right_type),
                    TemplateComparePlan::AllTemplatesAreSame,
                ) {
                    return CompareResult::Different;
                }
            }
        }

        self.compare_parameters(
            &left_template.func.params,
            &right_template.func.params,
            check_similar,
            TemplateComparePlan::AllTemplatesAreSame,
        )
    }

    /// Matches a call's argument list against a candidate parameter list,
    /// honoring argument labels, default-value fill-in, and reference-mode
    /// compatibility. Argument value types must already be assigned.
    pub fn compare_args_to_parameters(
        &self,
        params: &[DeclId],
        args: &[LabeledArgument],
    ) -> ArgMatchResult {
        if args.len() > params.len() {
            return ArgMatchResult::Fail;
        }

        let compare = TypeCompareUtil::new(self.ctx);
        let mut result = ArgMatchResult::Match;

        for (index, &param_id) in params.iter().enumerate() {
            let param = self.param(param_id);

            let Some(arg) = args.get(index) else {
                // Parameters beyond the last argument must be optional.
                if param.default_value.is_some() {
                    return result;
                }
                return ArgMatchResult::Fail;
            };

            if arg.label.node != param.label.node {
                return ArgMatchResult::Fail;
            }

            let Some(arg_type) = &arg.value.value_type else {
                return ArgMatchResult::Fail;
            };

            // A reference argument binds to a by-value parameter by reading
            // through the reference; `ref mut T` parameters need a real
            // mutable reference.
            let mut check_type = arg_type;
            if arg_type.is_reference() && !param.param_type.is_reference() {
                check_type = arg_type.deref().expect("reference has an inner type");
            }
            let param_type = strip_value_reference(&param.param_type);

            if compare.are_same(check_type, param_type, TemplateComparePlan::Strict) {
                continue;
            }
            if implicit_cast_allowed(self.ctx, check_type, param_type) {
                result = ArgMatchResult::Castable;
                continue;
            }
            return ArgMatchResult::Fail;
        }

        result
    }

    /// Validates a template argument list against a parameter list: shape,
    /// typename-vs-const kind, const value types, default fill-in. Returns
    /// the normalized argument list (defaults appended, const literals typed).
    pub fn compare_template_args_to_parameters(
        &self,
        params: &[DeclId],
        args: &[Expr],
    ) -> Result<Vec<Expr>, String> {
        if args.len() > params.len() {
            return Err(format!(
                "expected at most {} template arguments, found {}",
                params.len(),
                args.len()
            ));
        }

        let mut normalized = Vec::with_capacity(params.len());

        for (index, &param_id) in params.iter().enumerate() {
            let param_decl = self.ctx.decl(param_id);
            let param = self.template_param(param_id);

            let arg = match args.get(index) {
                Some(arg) => arg.clone(),
                None => match &param.default_value {
                    Some(default) => default.clone(),
                    None => {
                        return Err(format!(
                            "missing template argument for parameter `{}`",
                            param_decl.name.node
                        ));
                    }
                },
            };

            match param.param_kind {
                TemplateParameterKind::Typename => {
                    if !matches!(arg.kind, ExprKind::Type(_)) {
                        return Err(format!(
                            "expected a type for template parameter `{}`",
                            param_decl.name.node
                        ));
                    }
                    normalized.push(arg);
                }
                TemplateParameterKind::Const => {
                    let ExprKind::Literal(literal) = &arg.kind else {
                        return Err(format!(
                            "expected a constant value for template parameter `{}`",
                            param_decl.name.node
                        ));
                    };

                    let const_type = param
                        .ty
                        .as_ref()
                        .expect("const template parameters always carry a type");

                    if !literal_fits(literal.kind, const_type) {
                        return Err(format!(
                            "constant for template parameter `{}` does not fit its type",
                            param_decl.name.node
                        ));
                    }

                    let mut arg = arg;
                    arg.value_type = Some(const_type.clone());
                    normalized.push(arg);
                }
            }
        }

        Ok(normalized)
    }

    fn param(&self, id: DeclId) -> &'a ghoul_ast::ParameterDecl {
        match &self.ctx.decl(id).kind {
            DeclKind::Parameter(param) => param,
            other => panic!("expected a parameter decl, found {other:?}"),
        }
    }

    fn template_param(&self, id: DeclId) -> &'a ghoul_ast::TemplateParameterDecl {
        match &self.ctx.decl(id).kind {
            DeclKind::TemplateParameter(param) => param,
            other => panic!("expected a template parameter decl, found {other:?}"),
        }
    }
}

/// `ref T` (immutable reference) collapses to `T` for signature purposes;
/// `ref mut T` stays distinct.
fn strip_value_reference(ty: &Type) -> &Type {
    if let TypeKind::Reference(inner) = &ty.kind {
        if inner.qualifier != TypeQualifier::Mut {
            return inner;
        }
    }
    ty
}

fn literal_fits(kind: LiteralKind, ty: &Type) -> bool {
    match &ty.kind {
        TypeKind::BuiltIn(builtin) => match kind {
            LiteralKind::Integer => builtin.is_integer(),
            LiteralKind::Float => builtin.is_float(),
            LiteralKind::Bool => *builtin == ghoul_ast::BuiltInKind::Bool,
            LiteralKind::Char => builtin.is_integer(),
            LiteralKind::String => false,
        },
        _ => false,
    }
}
