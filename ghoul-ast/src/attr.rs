use crate::expr::Expr;
use crate::{Ident, Span};

/// `@name` or `@ns.name(args…)` attached to a declaration or parameter.
/// Bodies are kept unresolved for later interpretation.
#[derive(Clone, Debug, PartialEq)]
pub struct Attr {
    pub span: Span,
    pub path: Vec<Ident>,
    pub name: Ident,
    pub args: Vec<Expr>,
}
