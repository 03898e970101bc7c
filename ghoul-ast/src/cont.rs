use crate::expr::Expr;
use crate::{Ident, Span};

/// Declaration-level contracts.
#[derive(Clone, Debug, PartialEq)]
pub enum Cont {
    Requires(RequiresCont),
    Ensures(EnsuresCont),
    Throws(ThrowsCont),
    Where(WhereCont),
}

impl Cont {
    pub fn span(&self) -> Span {
        match self {
            Cont::Requires(cont) => cont.span,
            Cont::Ensures(cont) => cont.span,
            Cont::Throws(cont) => cont.span,
            Cont::Where(cont) => cont.span,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RequiresCont {
    pub span: Span,
    pub condition: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnsuresCont {
    pub span: Span,
    pub condition: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThrowsCont {
    pub span: Span,
    pub exception: Option<Ident>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhereCont {
    pub span: Span,
    pub condition: Expr,
}
