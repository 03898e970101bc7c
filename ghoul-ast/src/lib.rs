#![forbid(unsafe_code)]

mod arena;
mod attr;
mod cont;
mod decl;
mod expr;
mod stmt;
mod ty;

pub use arena::{AsgContext, DeclId, FileId, SourceFile};
pub use attr::Attr;
pub use cont::{Cont, EnsuresCont, RequiresCont, ThrowsCont, WhereCont};
pub use decl::{
    AccessorDecl, CastKind, CastOperatorDecl, ConstructorDecl, ConstructorKind, Decl, DeclKind,
    DeclModifier, DeclModifiers, EnumConstDecl, EnumDecl, ExtensionDecl, FunctionDecl, GetResult,
    ImportDecl, InstState, NamespaceDecl, OperatorDecl, OperatorKind, ParameterDecl, ParameterMode,
    PropertyDecl, StructDecl, StructKind, StructLayout, SubscriptDecl, TemplateFunctionDecl,
    TemplateInstInfo, TemplateParameterDecl, TemplateParameterKind, TemplateStructDecl,
    TemplateTraitDecl, TraitDecl, TraitPrototypeDecl, TypeAliasDecl, TypeAliasKind, VariableDecl,
    Visibility,
};
pub use expr::{
    Expr, ExprKind, InfixOperator, LabeledArgument, Literal, LiteralKind, PostfixOperator,
    PrefixOperator,
};
pub use stmt::{
    BreakStmt, CaseStmt, CatchStmt, CompoundStmt, ContinueStmt, DoCatchStmt, DoStmt, ForStmt,
    GotoStmt, IfStmt, LabeledStmt, RepeatWhileStmt, ReturnStmt, Stmt, SwitchStmt, TemporaryValue,
    WhileStmt,
};
pub use ty::{BuiltInKind, Type, TypeKind, TypeQualifier};

use miette::SourceSpan;

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            span: self.span,
            node: f(self.node),
        }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

/// Joins two spans into the smallest span covering both.
pub fn span_merge(a: Span, b: Span) -> Span {
    let start = a.offset().min(b.offset());
    let end = (a.offset() + a.len()).max(b.offset() + b.len());
    span_between(start, end)
}

pub type Ident = Spanned<String>;

/// The sentinel argument label for unlabeled call arguments.
pub const UNLABELED: &str = "_";
