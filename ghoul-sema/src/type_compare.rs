use ghoul_ast::{
    AsgContext, BuiltInKind, DeclKind, Expr, ExprKind, Type, TypeKind, TypeQualifier,
};

/// How template-parameter references compare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateComparePlan {
    /// `T` equals only the same parameter.
    Strict,
    /// Any template-parameter reference equals any other; used when
    /// comparing template signatures for redefinition detection.
    AllTemplatesAreSame,
}

/// Structural equality and subtype tests over `Type` nodes.
pub struct TypeCompareUtil<'a> {
    ctx: &'a AsgContext,
}

impl<'a> TypeCompareUtil<'a> {
    pub fn new(ctx: &'a AsgContext) -> TypeCompareUtil<'a> {
        TypeCompareUtil { ctx }
    }

    pub fn are_same(&self, left: &Type, right: &Type, plan: TemplateComparePlan) -> bool {
        let left = peel_dependent(left);
        let right = peel_dependent(right);

        if left.qualifier != right.qualifier {
            return false;
        }

        match (&left.kind, &right.kind) {
            (TypeKind::BuiltIn(a), TypeKind::BuiltIn(b)) => a == b,
            (TypeKind::Enum(a), TypeKind::Enum(b))
            | (TypeKind::Struct(a), TypeKind::Struct(b))
            | (TypeKind::Trait(a), TypeKind::Trait(b))
            | (TypeKind::TemplateStruct(a), TypeKind::TemplateStruct(b))
            | (TypeKind::TemplateTrait(a), TypeKind::TemplateTrait(b)) => a == b,
            (TypeKind::Alias(a), TypeKind::Alias(b)) if a == b => true,
            // An alias compares equal to what it aliases.
            (TypeKind::Alias(a), _) => {
                let aliased = self.alias_value(*a);
                aliased.is_some_and(|ty| self.are_same(&ty, right, plan))
            }
            (_, TypeKind::Alias(b)) => {
                let aliased = self.alias_value(*b);
                aliased.is_some_and(|ty| self.are_same(left, &ty, plan))
            }
            (
                TypeKind::Dimension {
                    element: ea,
                    rank: ra,
                },
                TypeKind::Dimension {
                    element: eb,
                    rank: rb,
                },
            ) => ra == rb && self.are_same(ea, eb, plan),
            (
                TypeKind::FlatArray {
                    element: ea,
                    length: la,
                },
                TypeKind::FlatArray {
                    element: eb,
                    length: lb,
                },
            ) => self.are_same(ea, eb, plan) && literal_value_eq(la, lb),
            (
                TypeKind::FunctionPointer {
                    params: pa,
                    return_type: ra,
                },
                TypeKind::FunctionPointer {
                    params: pb,
                    return_type: rb,
                },
            ) => {
                pa.len() == pb.len()
                    && pa
                        .iter()
                        .zip(pb.iter())
                        .all(|(a, b)| self.are_same(a, b, plan))
                    && self.are_same(ra, rb, plan)
            }
            (TypeKind::Pointer(a), TypeKind::Pointer(b))
            | (TypeKind::Reference(a), TypeKind::Reference(b))
            | (TypeKind::RValueReference(a), TypeKind::RValueReference(b)) => {
                self.are_same(a, b, plan)
            }
            (TypeKind::SelfType, TypeKind::SelfType) => true,
            (TypeKind::TemplateTypenameRef(a), TypeKind::TemplateTypenameRef(b)) => match plan {
                TemplateComparePlan::Strict => a == b,
                TemplateComparePlan::AllTemplatesAreSame => true,
            },
            (TypeKind::Imaginary(a), TypeKind::Imaginary(b)) => a == b,
            (
                TypeKind::Templated {
                    candidates: ca,
                    args: aa,
                },
                TypeKind::Templated {
                    candidates: cb,
                    args: ab,
                },
            ) => ca.first() == cb.first() && self.template_args_same(aa, ab, plan),
            (
                TypeKind::Labeled {
                    label: la,
                    ty: ta,
                },
                TypeKind::Labeled {
                    label: lb,
                    ty: tb,
                },
            ) => la.node == lb.node && self.are_same(ta, tb, plan),
            (TypeKind::VTable, TypeKind::VTable) => true,
            _ => false,
        }
    }

    /// Compares two template argument lists (resolved type exprs or literal
    /// const values).
    pub fn template_args_same(
        &self,
        left: &[Expr],
        right: &[Expr],
        plan: TemplateComparePlan,
    ) -> bool {
        left.len() == right.len()
            && left.iter().zip(right.iter()).all(|(a, b)| {
                match (&a.kind, &b.kind) {
                    (ExprKind::Type(ta), ExprKind::Type(tb)) => self.are_same(ta, tb, plan),
                    (ExprKind::Literal(la), ExprKind::Literal(lb)) => {
                        la.kind == lb.kind && la.value == lb.value && la.suffix == lb.suffix
                    }
                    _ => false,
                }
            })
    }

    /// Subtype test through declared inheritance.
    pub fn are_same_or_inherits(&self, sub: &Type, base: &Type) -> bool {
        self.inheritance_distance(sub, base).is_some()
    }

    /// Number of inheritance steps between `sub` and `base`; 0 when equal,
    /// `None` when unrelated. Used to rank overlapping specializations.
    pub fn inheritance_distance(&self, sub: &Type, base: &Type) -> Option<u32> {
        if self.are_same(sub, base, TemplateComparePlan::Strict) {
            return Some(0);
        }

        let sub = peel_dependent(sub);
        // Distance counts steps through the declared inheritance chain, so
        // only direct bases are walked here.
        let inherited: &[Type] = match &sub.kind {
            TypeKind::Struct(id) => match &self.ctx.decl(*id).kind {
                DeclKind::Struct(def) => &def.inherited,
                _ => return None,
            },
            TypeKind::Trait(id) => match &self.ctx.decl(*id).kind {
                DeclKind::Trait(def) => &def.inherited,
                _ => return None,
            },
            TypeKind::Alias(id) => {
                let aliased = self.alias_value(*id)?;
                return self.inheritance_distance(&aliased, base);
            }
            _ => return None,
        };

        inherited
            .iter()
            .filter_map(|parent| self.inheritance_distance(parent, base).map(|d| d + 1))
            .min()
    }

    fn alias_value(&self, id: ghoul_ast::DeclId) -> Option<Type> {
        match &self.ctx.decl(id).kind {
            DeclKind::TypeAlias(alias) => Some(alias.value.clone()),
            _ => None,
        }
    }
}

fn peel_dependent(ty: &Type) -> &Type {
    match &ty.kind {
        TypeKind::Dependent(inner) => peel_dependent(inner),
        _ => ty,
    }
}

fn literal_value_eq(left: &Expr, right: &Expr) -> bool {
    match (&left.kind, &right.kind) {
        (ExprKind::Literal(a), ExprKind::Literal(b)) => a.value == b.value,
        _ => false,
    }
}

/// The implicit conversion matrix: identity, widening numeric,
/// derived-to-base pointer/reference, and mutable-to-immutable reference
/// downgrade. Narrowing always requires an explicit `as`.
pub fn implicit_cast_allowed(ctx: &AsgContext, from: &Type, to: &Type) -> bool {
    let compare = TypeCompareUtil::new(ctx);

    if compare.are_same(from, to, TemplateComparePlan::Strict) {
        return true;
    }

    match (&from.kind, &to.kind) {
        (TypeKind::BuiltIn(a), TypeKind::BuiltIn(b)) => numeric_widening(*a, *b),
        (TypeKind::Pointer(a), TypeKind::Pointer(b)) => {
            compare.are_same_or_inherits(a, b) || qualifier_downgrade(ctx, a, b)
        }
        (TypeKind::Reference(a), TypeKind::Reference(b)) => {
            // `ref mut T` converts to `ref T`; `ref Derived` to `ref Base`.
            qualifier_downgrade(ctx, a, b) || compare.are_same_or_inherits(a, b)
        }
        _ => false,
    }
}

fn qualifier_downgrade(ctx: &AsgContext, from: &Type, to: &Type) -> bool {
    if from.qualifier == TypeQualifier::Mut
        && matches!(to.qualifier, TypeQualifier::Immut | TypeQualifier::Unassigned)
    {
        let mut relaxed = from.clone();
        relaxed.qualifier = to.qualifier;
        let compare = TypeCompareUtil::new(ctx);
        return compare.are_same(&relaxed, to, TemplateComparePlan::Strict);
    }
    false
}

fn numeric_widening(from: BuiltInKind, to: BuiltInKind) -> bool {
    if from == to {
        return true;
    }

    // Pointer-width integers never implicitly widen or narrow; their size
    // is target-dependent.
    if matches!(from, BuiltInKind::Isize | BuiltInKind::Usize)
        || matches!(to, BuiltInKind::Isize | BuiltInKind::Usize)
    {
        return false;
    }

    let rank = |kind: BuiltInKind| kind.size_of(8);

    if from.is_integer() && to.is_integer() {
        let (from_size, to_size) = match (rank(from), rank(to)) {
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };
        if from_size >= to_size {
            return false;
        }
        // Signed widens to signed; unsigned widens to unsigned or to a
        // strictly larger signed type.
        return if from.is_signed() {
            to.is_signed()
        } else {
            !to.is_signed() || to_size > from_size
        };
    }

    if from.is_float() && to.is_float() {
        return from == BuiltInKind::F32 && to == BuiltInKind::F64;
    }

    // Integers widen into floats.
    from.is_integer() && to.is_float()
}

/// Explicit `as` casts: everything the implicit matrix allows, plus
/// numeric narrowing, enum-to-integer and back, pointer reinterpretation,
/// and reference up/down casts within an inheritance chain.
pub fn explicit_cast_allowed(ctx: &AsgContext, from: &Type, to: &Type) -> bool {
    if implicit_cast_allowed(ctx, from, to) {
        return true;
    }

    match (&from.kind, &to.kind) {
        (TypeKind::BuiltIn(a), TypeKind::BuiltIn(b)) => {
            let castable_source = a.is_integer() || a.is_float() || *a == BuiltInKind::Bool;
            let castable_target = b.is_integer() || b.is_float();
            castable_source && castable_target
        }
        (TypeKind::Enum(_), TypeKind::BuiltIn(b)) => b.is_integer(),
        (TypeKind::BuiltIn(a), TypeKind::Enum(_)) => a.is_integer(),
        (TypeKind::Pointer(_), TypeKind::Pointer(_)) => true,
        (TypeKind::Reference(a), TypeKind::Reference(b)) => {
            let compare = TypeCompareUtil::new(ctx);
            compare.are_same_or_inherits(a, b) || compare.are_same_or_inherits(b, a)
        }
        _ => false,
    }
}
