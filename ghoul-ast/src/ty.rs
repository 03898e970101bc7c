use crate::arena::{AsgContext, DeclId};
use crate::expr::Expr;
use crate::{Ident, Span};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TypeQualifier {
    #[default]
    Unassigned,
    Mut,
    Immut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltInKind {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Isize,
    Usize,
    F32,
    F64,
}

impl BuiltInKind {
    pub fn from_name(name: &str) -> Option<BuiltInKind> {
        Some(match name {
            "void" => BuiltInKind::Void,
            "bool" => BuiltInKind::Bool,
            "i8" => BuiltInKind::I8,
            "i16" => BuiltInKind::I16,
            "i32" => BuiltInKind::I32,
            "i64" => BuiltInKind::I64,
            "u8" => BuiltInKind::U8,
            "u16" => BuiltInKind::U16,
            "u32" => BuiltInKind::U32,
            "u64" => BuiltInKind::U64,
            "isize" => BuiltInKind::Isize,
            "usize" => BuiltInKind::Usize,
            "f32" => BuiltInKind::F32,
            "f64" => BuiltInKind::F64,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltInKind::Void => "void",
            BuiltInKind::Bool => "bool",
            BuiltInKind::I8 => "i8",
            BuiltInKind::I16 => "i16",
            BuiltInKind::I32 => "i32",
            BuiltInKind::I64 => "i64",
            BuiltInKind::U8 => "u8",
            BuiltInKind::U16 => "u16",
            BuiltInKind::U32 => "u32",
            BuiltInKind::U64 => "u64",
            BuiltInKind::Isize => "isize",
            BuiltInKind::Usize => "usize",
            BuiltInKind::F32 => "f32",
            BuiltInKind::F64 => "f64",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            BuiltInKind::I8
                | BuiltInKind::I16
                | BuiltInKind::I32
                | BuiltInKind::I64
                | BuiltInKind::U8
                | BuiltInKind::U16
                | BuiltInKind::U32
                | BuiltInKind::U64
                | BuiltInKind::Isize
                | BuiltInKind::Usize
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            BuiltInKind::I8
                | BuiltInKind::I16
                | BuiltInKind::I32
                | BuiltInKind::I64
                | BuiltInKind::Isize
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, BuiltInKind::F32 | BuiltInKind::F64)
    }

    /// Size in bytes for the given pointer width; `None` for `void`.
    pub fn size_of(self, ptr_width: u8) -> Option<u64> {
        Some(match self {
            BuiltInKind::Void => return None,
            BuiltInKind::Bool | BuiltInKind::I8 | BuiltInKind::U8 => 1,
            BuiltInKind::I16 | BuiltInKind::U16 => 2,
            BuiltInKind::I32 | BuiltInKind::U32 | BuiltInKind::F32 => 4,
            BuiltInKind::I64 | BuiltInKind::U64 | BuiltInKind::F64 => 8,
            BuiltInKind::Isize | BuiltInKind::Usize => ptr_width as u64,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Type {
    pub span: Span,
    pub qualifier: TypeQualifier,
    pub is_lvalue: bool,
    pub kind: TypeKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeKind {
    BuiltIn(BuiltInKind),
    Enum(DeclId),
    Struct(DeclId),
    Trait(DeclId),
    /// Reference to a template struct itself (only legal inside templates).
    TemplateStruct(DeclId),
    TemplateTrait(DeclId),
    Alias(DeclId),
    /// Dynamic N-rank array.
    Dimension { element: Box<Type>, rank: usize },
    /// Statically sized array.
    FlatArray {
        element: Box<Type>,
        length: Box<Expr>,
    },
    FunctionPointer {
        params: Vec<Type>,
        return_type: Box<Type>,
    },
    Pointer(Box<Type>),
    Reference(Box<Type>),
    RValueReference(Box<Type>),
    SelfType,
    /// Resolved-to-a-template invocation awaiting instantiation. All
    /// same-name candidate templates are kept; instantiation picks the
    /// specialization whose contracts fit the arguments best.
    Templated {
        candidates: Vec<DeclId>,
        args: Vec<Expr>,
    },
    /// Reference to a template typename parameter.
    TemplateTypenameRef(DeclId),
    /// A type that depends on an enclosing template's parameters.
    Dependent(Box<Type>),
    Labeled { label: Ident, ty: Box<Type> },
    /// Stand-in argument used when validating a template without
    /// instantiating it; carries the typename parameter it substitutes.
    Imaginary(DeclId),
    Unresolved {
        path: Vec<Ident>,
        name: Ident,
        args: Vec<Expr>,
    },
    UnresolvedNested {
        container: Box<Type>,
        name: Ident,
        args: Vec<Expr>,
    },
    VTable,
}

impl Type {
    pub fn new(span: Span, kind: TypeKind) -> Type {
        Type {
            span,
            qualifier: TypeQualifier::Unassigned,
            is_lvalue: false,
            kind,
        }
    }

    pub fn builtin(span: Span, kind: BuiltInKind) -> Type {
        Type::new(span, TypeKind::BuiltIn(kind))
    }

    pub fn void(span: Span) -> Type {
        Type::builtin(span, BuiltInKind::Void)
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::BuiltIn(BuiltInKind::Void))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, TypeKind::Reference(_))
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Unresolved { .. } | TypeKind::UnresolvedNested { .. }
        )
    }

    /// Strips one level of reference, leaving qualifiers of the inner type.
    pub fn deref(&self) -> Option<&Type> {
        match &self.kind {
            TypeKind::Reference(inner) | TypeKind::RValueReference(inner) => Some(inner),
            _ => None,
        }
    }

    /// Source-like rendering for diagnostics.
    pub fn describe(&self, ctx: &AsgContext) -> String {
        let qualifier = match self.qualifier {
            TypeQualifier::Unassigned => "",
            TypeQualifier::Mut => "mut ",
            TypeQualifier::Immut => "immut ",
        };
        format!("{qualifier}{}", self.kind.describe(ctx))
    }
}

impl TypeKind {
    fn describe(&self, ctx: &AsgContext) -> String {
        match self {
            TypeKind::BuiltIn(kind) => kind.name().to_string(),
            TypeKind::Enum(decl)
            | TypeKind::Struct(decl)
            | TypeKind::Trait(decl)
            | TypeKind::TemplateStruct(decl)
            | TypeKind::TemplateTrait(decl)
            | TypeKind::Alias(decl) => ctx.decl(*decl).name.node.clone(),
            TypeKind::Dimension { element, rank } => {
                format!("[{}]{}", ",".repeat(rank.saturating_sub(1)), element.describe(ctx))
            }
            TypeKind::FlatArray { element, .. } => format!("[N]{}", element.describe(ctx)),
            TypeKind::FunctionPointer {
                params,
                return_type,
            } => {
                let params: Vec<String> = params.iter().map(|p| p.describe(ctx)).collect();
                format!("func({}) -> {}", params.join(", "), return_type.describe(ctx))
            }
            TypeKind::Pointer(inner) => format!("*{}", inner.describe(ctx)),
            TypeKind::Reference(inner) => format!("ref {}", inner.describe(ctx)),
            TypeKind::RValueReference(inner) => format!("ref ref {}", inner.describe(ctx)),
            TypeKind::SelfType => "Self".to_string(),
            TypeKind::Templated { candidates, args } => {
                let name = candidates
                    .first()
                    .map(|id| ctx.decl(*id).name.node.clone())
                    .unwrap_or_default();
                format!("{name}<{} args>", args.len())
            }
            TypeKind::TemplateTypenameRef(decl) | TypeKind::Imaginary(decl) => {
                ctx.decl(*decl).name.node.clone()
            }
            TypeKind::Dependent(inner) => inner.kind.describe(ctx),
            TypeKind::Labeled { label, ty } => format!("{}: {}", label.node, ty.describe(ctx)),
            TypeKind::Unresolved { path, name, .. } => {
                let mut full = String::new();
                for segment in path {
                    full.push_str(&segment.node);
                    full.push('.');
                }
                full.push_str(&name.node);
                full
            }
            TypeKind::UnresolvedNested {
                container, name, ..
            } => format!("{}.{}", container.describe(ctx), name.node),
            TypeKind::VTable => "vtable".to_string(),
        }
    }
}

