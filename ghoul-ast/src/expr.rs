use std::fmt;

use crate::arena::DeclId;
use crate::ty::Type;
use crate::{Ident, Span};

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
    /// Null until CodeProcessor assigns it.
    pub value_type: Option<Type>,
    pub is_lvalue: bool,
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Expr {
        Expr {
            span,
            kind,
            value_type: None,
            is_lvalue: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiteralKind {
    Integer,
    Float,
    String,
    Char,
    Bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Literal {
    pub kind: LiteralKind,
    /// Digits (with base prefix) for numbers, cooked text for strings,
    /// the single code point for chars, `true`/`false` for bools.
    pub value: String,
    /// User-defined type suffix (`123px`, `"…"utf16`).
    pub suffix: Option<String>,
}

/// A call argument with its argument label; unlabeled arguments carry the
/// `_` sentinel.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledArgument {
    pub label: Ident,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Identifier {
        name: Ident,
        template_args: Vec<Expr>,
    },
    Paren(Box<Expr>),
    Prefix {
        op: PrefixOperator,
        expr: Box<Expr>,
    },
    Postfix {
        op: PostfixOperator,
        expr: Box<Expr>,
    },
    Infix {
        op: InfixOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        /// `Some(op)` for compound assignments such as `+=`.
        compound: Option<InfixOperator>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    As {
        expr: Box<Expr>,
        target: Type,
    },
    Is {
        expr: Box<Expr>,
        target: Type,
    },
    Has {
        expr: Box<Expr>,
        prototype: DeclId,
    },
    /// `T: Trait` inside a `where` clause.
    CheckExtendsType {
        check: Type,
        extends: Type,
    },
    Ref {
        is_mut: bool,
        expr: Box<Expr>,
    },
    Try(Box<Expr>),
    ArrayLiteral(Vec<Expr>),
    VariableDecl {
        name: Ident,
        is_mut: bool,
        declared_type: Option<Type>,
        initializer: Option<Box<Expr>>,
    },
    FunctionCall {
        callee: Box<Expr>,
        args: Vec<LabeledArgument>,
    },
    SubscriptCall {
        target: Box<Expr>,
        args: Vec<LabeledArgument>,
    },
    MemberAccess {
        is_arrow: bool,
        object: Box<Expr>,
        member: Ident,
        template_args: Vec<Expr>,
    },
    /// First-class type expression (template arguments, `[]T` literals).
    Type(Box<Type>),

    // Resolved forms, produced by CodeProcessor (and BasicTypeResolver for
    // `Type`). After code processing no pre-resolution form survives.
    LocalVariableRef {
        name: String,
    },
    ParameterRef {
        parameter: DeclId,
        index: usize,
    },
    VariableRef(DeclId),
    MemberVariableRef {
        object: Box<Expr>,
        field: DeclId,
    },
    EnumConstRef(DeclId),
    CurrentSelf,
    FunctionRef(DeclId),
    ConstructorCall {
        constructor: DeclId,
        args: Vec<LabeledArgument>,
    },
    MemberFunctionCall {
        function: DeclId,
        object: Box<Expr>,
        args: Vec<LabeledArgument>,
    },
    CallOperatorRef {
        call_operator: DeclId,
        object: Box<Expr>,
        args: Vec<LabeledArgument>,
    },
    VTableFunctionRef {
        object: Box<Expr>,
        slot: usize,
        function: DeclId,
    },
    ImplicitCast {
        to: Type,
        expr: Box<Expr>,
    },
    ImplicitDeref(Box<Expr>),
    LValueToRValue(Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefixOperator {
    Increment,
    Decrement,
    Positive,
    Negative,
    LogicalNot,
    BitwiseNot,
    Dereference,
    AddressOf,
    SizeOf,
    AlignOf,
    OffsetOf,
    NameOf,
    TraitsOf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostfixOperator {
    Increment,
    Decrement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfixOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Power,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRight,
    LogicalAnd,
    LogicalOr,
    EqualTo,
    NotEqualTo,
    GreaterThan,
    LessThan,
    GreaterThanEqualTo,
    LessThanEqualTo,
}

impl InfixOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            InfixOperator::EqualTo
                | InfixOperator::NotEqualTo
                | InfixOperator::GreaterThan
                | InfixOperator::LessThan
                | InfixOperator::GreaterThanEqualTo
                | InfixOperator::LessThanEqualTo
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, InfixOperator::LogicalAnd | InfixOperator::LogicalOr)
    }
}

impl fmt::Display for PrefixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PrefixOperator::Increment => "++",
            PrefixOperator::Decrement => "--",
            PrefixOperator::Positive => "+",
            PrefixOperator::Negative => "-",
            PrefixOperator::LogicalNot => "!",
            PrefixOperator::BitwiseNot => "~",
            PrefixOperator::Dereference => "*",
            PrefixOperator::AddressOf => "&",
            PrefixOperator::SizeOf => "sizeof",
            PrefixOperator::AlignOf => "alignof",
            PrefixOperator::OffsetOf => "offsetof",
            PrefixOperator::NameOf => "nameof",
            PrefixOperator::TraitsOf => "traitsof",
        };
        f.write_str(text)
    }
}

impl fmt::Display for PostfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostfixOperator::Increment => f.write_str("++"),
            PostfixOperator::Decrement => f.write_str("--"),
        }
    }
}

impl fmt::Display for InfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InfixOperator::Add => "+",
            InfixOperator::Subtract => "-",
            InfixOperator::Multiply => "*",
            InfixOperator::Divide => "/",
            InfixOperator::Remainder => "%",
            InfixOperator::Power => "^^",
            InfixOperator::BitwiseAnd => "&",
            InfixOperator::BitwiseOr => "|",
            InfixOperator::BitwiseXor => "^",
            InfixOperator::ShiftLeft => "<<",
            InfixOperator::ShiftRight => ">>",
            InfixOperator::LogicalAnd => "&&",
            InfixOperator::LogicalOr => "||",
            InfixOperator::EqualTo => "==",
            InfixOperator::NotEqualTo => "!=",
            InfixOperator::GreaterThan => ">",
            InfixOperator::LessThan => "<",
            InfixOperator::GreaterThanEqualTo => ">=",
            InfixOperator::LessThanEqualTo => "<=",
        };
        f.write_str(text)
    }
}
