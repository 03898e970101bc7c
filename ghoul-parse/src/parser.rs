use ghoul_ast::{
    span_between, AccessorDecl, AsgContext, Attr, CastKind, CastOperatorDecl, CompoundStmt, Cont,
    ConstructorDecl, ConstructorKind, Decl, DeclId, DeclKind, DeclModifier, DeclModifiers,
    EnsuresCont, EnumConstDecl, EnumDecl, Expr, ExprKind, ExtensionDecl, FileId, FunctionDecl,
    GetResult, Ident, ImportDecl, InfixOperator, LabeledArgument, Literal, LiteralKind,
    NamespaceDecl, OperatorDecl, OperatorKind, ParameterDecl, ParameterMode, PostfixOperator,
    PrefixOperator, PropertyDecl, RequiresCont, Span, Stmt, StructDecl, StructKind, SubscriptDecl,
    TemplateFunctionDecl, TemplateParameterDecl, TemplateParameterKind, TemplateStructDecl,
    TemplateTraitDecl, ThrowsCont, TraitDecl, TraitPrototypeDecl, Type, TypeAliasDecl,
    TypeAliasKind, TypeKind, TypeQualifier, VariableDecl, Visibility, WhereCont, UNLABELED,
};
use ghoul_ast::{
    BreakStmt, CaseStmt, CatchStmt, ContinueStmt, DoCatchStmt, DoStmt, ForStmt, GotoStmt, IfStmt,
    LabeledStmt, RepeatWhileStmt, ReturnStmt, SwitchStmt, WhileStmt,
};
use ghoul_lex::{Lexer, TokenCategory, TokenKind};

use crate::error::ParseError;

/// Shared prefix of every declaration: attributes, visibility, `const`,
/// modifiers, and the start offset for span building.
struct DeclHead {
    attrs: Vec<Attr>,
    visibility: Visibility,
    is_const: bool,
    modifiers: DeclModifiers,
    start: usize,
}

pub struct Parser<'ctx, 'src> {
    ctx: &'ctx mut AsgContext,
    lexer: Lexer<'src>,
    file: FileId,
    /// Line and byte end of the most recently consumed token.
    last_line: u32,
    last_end: usize,
}

impl<'ctx, 'src> Parser<'ctx, 'src> {
    pub fn new(ctx: &'ctx mut AsgContext, file: FileId, src: &'src str) -> Parser<'ctx, 'src> {
        Parser {
            ctx,
            lexer: Lexer::new(src),
            file,
            last_line: 1,
            last_end: 0,
        }
    }

    /// Parses every top-level declaration of the file.
    pub fn parse_decls(&mut self) -> Result<Vec<DeclId>, ParseError> {
        let mut decls = Vec::new();
        while self.peek()? != TokenKind::EndOfFile {
            decls.push(self.parse_decl()?);
        }
        Ok(decls)
    }

    // Token plumbing --------------------------------------------------------

    fn peek(&mut self) -> Result<TokenKind, ParseError> {
        Ok(self.lexer.peek_kind()?)
    }

    fn peek_category(&mut self) -> Result<TokenCategory, ParseError> {
        Ok(self.lexer.peek_kind()?.category())
    }

    fn peek_span(&mut self) -> Result<Span, ParseError> {
        Ok(self.lexer.peek_span()?)
    }

    fn peek_start(&mut self) -> Result<usize, ParseError> {
        Ok(self.lexer.peek_span()?.offset())
    }

    fn peek_line(&mut self) -> Result<u32, ParseError> {
        Ok(self.lexer.peek_line()?)
    }

    fn found(&mut self) -> String {
        self.lexer
            .peek_text()
            .unwrap_or_else(|_| "<error>".to_string())
    }

    fn error_here(&mut self, message: impl Into<String>) -> ParseError {
        let span = self.lexer.peek_span().unwrap_or_else(|err| err.span);
        ParseError::new(message, span)
    }

    fn bump(&mut self) -> Result<ghoul_lex::Token, ParseError> {
        let token = self.lexer.next_token()?;
        if token.kind != TokenKind::EndOfFile {
            self.last_line = token.line;
            self.last_end = token.span.offset() + token.span.len();
        }
        Ok(token)
    }

    fn consume(&mut self, kind: TokenKind) -> Result<bool, ParseError> {
        if self.peek()? == kind {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<ghoul_lex::Token, ParseError> {
        if self.peek()? == kind {
            self.bump()
        } else {
            let found = self.found();
            Err(self.error_here(format!("expected {what}, found `{found}`")))
        }
    }

    fn span_from(&self, start: usize) -> Span {
        span_between(start.min(self.last_end), self.last_end)
    }

    // Attributes ------------------------------------------------------------

    fn parse_attrs(&mut self) -> Result<Vec<Attr>, ParseError> {
        let mut attrs = Vec::new();
        while self.consume(TokenKind::AtSymbol)? {
            attrs.push(self.parse_attr()?);
        }
        Ok(attrs)
    }

    fn parse_attr(&mut self) -> Result<Attr, ParseError> {
        let start = self.peek_start()?;

        if self.peek()? != TokenKind::Symbol {
            let found = self.found();
            return Err(self.error_here(format!("expected attribute name, found `{found}`")));
        }

        let mut path = Vec::new();
        let mut name = self.parse_identifier()?;

        while self.consume(TokenKind::Period)? {
            if self.peek()? != TokenKind::Symbol {
                let found = self.found();
                return Err(self.error_here(format!(
                    "expected namespace or attribute name after `.`, found `{found}`"
                )));
            }
            path.push(name);
            name = self.parse_identifier()?;
        }

        let mut args = Vec::new();

        // Attributes may be written with or without parentheses.
        if self.consume(TokenKind::LParen)? {
            while self.peek()? != TokenKind::RParen && self.peek()? != TokenKind::EndOfFile {
                args.push(self.parse_expr()?);
                if !self.consume(TokenKind::Comma)? {
                    break;
                }
            }
            if !self.consume(TokenKind::RParen)? {
                let found = self.found();
                return Err(self.error_here(format!(
                    "expected ending `)` after attribute arguments, found `{found}`"
                )));
            }
        }

        Ok(Attr {
            span: self.span_from(start),
            path,
            name,
            args,
        })
    }

    // Identifiers -----------------------------------------------------------

    fn parse_identifier(&mut self) -> Result<Ident, ParseError> {
        if self.consume(TokenKind::Grave)? {
            let category = self.peek_category()?;
            if category != TokenCategory::Keyword
                && category != TokenCategory::Modifier
                && self.peek()? != TokenKind::Symbol
            {
                let found = self.found();
                return Err(self.error_here(format!("expected identifier, found `{found}`")));
            }
            let token = self.bump()?;
            if !self.consume(TokenKind::Grave)? {
                let found = self.found();
                return Err(self.error_here(format!("expected closing `` ` ``, found `{found}`")));
            }
            Ok(Ident::new(token.span, token.text))
        } else {
            if self.peek()? != TokenKind::Symbol {
                let found = self.found();
                return Err(self.error_here(format!("expected identifier, found `{found}`")));
            }
            let token = self.bump()?;
            Ok(Ident::new(token.span, token.text))
        }
    }

    fn parse_dot_separated_identifiers(&mut self) -> Result<Vec<Ident>, ParseError> {
        let mut result = vec![self.parse_identifier()?];
        while self.consume(TokenKind::Period)? {
            result.push(self.parse_identifier()?);
        }
        Ok(result)
    }

    // Types -----------------------------------------------------------------

    pub fn parse_type(&mut self) -> Result<Type, ParseError> {
        let start = self.peek_start()?;

        match self.peek()? {
            TokenKind::Const => Err(self.error_here(
                "`const` cannot be used in this context (did you mean `immut`?)",
            )),
            TokenKind::Mut => {
                self.bump()?;
                let has_paren = self.consume(TokenKind::LParen)?;
                let mut nested = self.parse_type()?;
                if has_paren && !self.consume(TokenKind::RParen)? {
                    let found = self.found();
                    return Err(self.error_here(format!("expected ending `)`, found `{found}`")));
                }
                match nested.qualifier {
                    TypeQualifier::Mut => {
                        return Err(self.error_here("duplicate `mut` keyword is not allowed"))
                    }
                    TypeQualifier::Immut => {
                        return Err(self.error_here("`mut immut` is not allowed"))
                    }
                    TypeQualifier::Unassigned => {}
                }
                nested.qualifier = TypeQualifier::Mut;
                Ok(nested)
            }
            TokenKind::Immut => {
                self.bump()?;
                let has_paren = self.consume(TokenKind::LParen)?;
                let mut nested = self.parse_type()?;
                if has_paren && !self.consume(TokenKind::RParen)? {
                    let found = self.found();
                    return Err(self.error_here(format!("expected ending `)`, found `{found}`")));
                }
                match nested.qualifier {
                    TypeQualifier::Immut => {
                        return Err(self.error_here("duplicate `immut` keyword is not allowed"))
                    }
                    TypeQualifier::Mut => {
                        return Err(self.error_here("`immut mut` is not allowed"))
                    }
                    TypeQualifier::Unassigned => {}
                }
                nested.qualifier = TypeQualifier::Immut;
                Ok(nested)
            }
            TokenKind::Ref => {
                self.bump()?;
                let has_paren = self.consume(TokenKind::LParen)?;
                let nested = self.parse_type()?;
                if has_paren && !self.consume(TokenKind::RParen)? {
                    let found = self.found();
                    return Err(self.error_here(format!("expected ending `)`, found `{found}`")));
                }
                Ok(Type::new(
                    self.span_from(start),
                    TypeKind::Reference(Box::new(nested)),
                ))
            }
            TokenKind::Star => {
                self.bump()?;
                let nested = self.parse_type()?;
                Ok(Type::new(
                    self.span_from(start),
                    TypeKind::Pointer(Box::new(nested)),
                ))
            }
            TokenKind::LSquare => {
                self.bump()?;
                match self.peek()? {
                    TokenKind::RSquare | TokenKind::Comma => {
                        // `[]T` is 1-dimensional, `[,]T` is 2-dimensional, …
                        let mut rank = 1usize;
                        while self.consume(TokenKind::Comma)? {
                            rank += 1;
                        }
                        if !self.consume(TokenKind::RSquare)? {
                            let found = self.found();
                            return Err(self.error_here(format!(
                                "expected `,` or `]` for dimension type, found `{found}`"
                            )));
                        }
                        let element = self.parse_type()?;
                        Ok(Type::new(
                            self.span_from(start),
                            TypeKind::Dimension {
                                element: Box::new(element),
                                rank,
                            },
                        ))
                    }
                    _ => {
                        // `[N]T` is a statically sized flat array.
                        let length = self.parse_expr()?;
                        if !self.consume(TokenKind::RSquare)? {
                            let found = self.found();
                            return Err(self.error_here(format!(
                                "expected ending `]` for flat array type, found `{found}`"
                            )));
                        }
                        let element = self.parse_type()?;
                        Ok(Type::new(
                            self.span_from(start),
                            TypeKind::FlatArray {
                                element: Box::new(element),
                                length: Box::new(length),
                            },
                        ))
                    }
                }
            }
            TokenKind::LParen => Err(self.error_here("tuple types are not supported")),
            TokenKind::Symbol | TokenKind::Grave => {
                let mut path = Vec::new();
                let mut name = self.parse_identifier()?;

                while self.peek()? == TokenKind::Period {
                    // `A<T>.B` is handled below; plain dotted names extend
                    // the namespace path.
                    self.bump()?;
                    path.push(name);
                    name = self.parse_identifier()?;
                }

                if self.peek()? == TokenKind::Less {
                    let args = self.parse_type_template_arguments()?;
                    let mut result = Type::new(
                        self.span_from(start),
                        TypeKind::Unresolved { path, name, args },
                    );

                    while self.consume(TokenKind::Period)? {
                        let nested_name = self.parse_identifier()?;
                        let nested_args = if self.peek()? == TokenKind::Less {
                            self.parse_type_template_arguments()?
                        } else {
                            Vec::new()
                        };
                        result = Type::new(
                            self.span_from(start),
                            TypeKind::UnresolvedNested {
                                container: Box::new(result),
                                name: nested_name,
                                args: nested_args,
                            },
                        );
                    }

                    Ok(result)
                } else {
                    Ok(Type::new(
                        self.span_from(start),
                        TypeKind::Unresolved {
                            path,
                            name,
                            args: Vec::new(),
                        },
                    ))
                }
            }
            _ => {
                let found = self.found();
                Err(self.error_here(format!(
                    "expected `mut`, `immut`, `ref`, or a type name, found `{found}`"
                )))
            }
        }
    }

    /// Parses `<…>` template arguments in committed (type) position. The
    /// lexer's right-shift state is disabled for the duration so `>>`
    /// closes two nested argument lists.
    fn parse_type_template_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::Less, "`<` to begin template arguments")?;

        let old_right_shift = self.lexer.right_shift_state();
        self.lexer.set_right_shift_state(false);

        let mut args = Vec::new();

        while self.peek()? != TokenKind::TemplateEnd && self.peek()? != TokenKind::EndOfFile {
            args.push(self.parse_expr()?);
            if !self.consume(TokenKind::Comma)? {
                break;
            }
        }

        if !self.consume(TokenKind::TemplateEnd)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected closing `>` for template arguments, found `{found}`"
            )));
        }

        self.lexer.set_right_shift_state(old_right_shift);
        Ok(args)
    }

    // Declarations ----------------------------------------------------------

    fn parse_decl_visibility(&mut self) -> Result<Visibility, ParseError> {
        if self.consume(TokenKind::Private)? {
            Ok(Visibility::Private)
        } else if self.consume(TokenKind::Public)? {
            Ok(Visibility::Public)
        } else if self.consume(TokenKind::Internal)? {
            Ok(Visibility::Internal)
        } else if self.consume(TokenKind::Protected)? {
            if self.consume(TokenKind::Internal)? {
                Ok(Visibility::ProtectedInternal)
            } else {
                Ok(Visibility::Protected)
            }
        } else {
            Ok(Visibility::Unassigned)
        }
    }

    fn parse_decl_modifiers(&mut self, is_const: &mut bool) -> Result<DeclModifiers, ParseError> {
        let mut modifiers = DeclModifiers::NONE;

        loop {
            let kind = self.peek()?;
            if kind.category() != TokenCategory::Modifier {
                break;
            }

            // `mut`, `immut` and `ref` start types; only treat them as decl
            // modifiers when a declaration keyword can still follow.
            let modifier = match kind {
                TokenKind::Static => Some(DeclModifier::Static),
                TokenKind::Extern => Some(DeclModifier::Extern),
                TokenKind::Mut => Some(DeclModifier::Mut),
                TokenKind::Volatile => Some(DeclModifier::Volatile),
                TokenKind::Abstract => Some(DeclModifier::Abstract),
                TokenKind::Virtual => Some(DeclModifier::Virtual),
                TokenKind::Override => Some(DeclModifier::Override),
                TokenKind::Const => None,
                _ => {
                    let found = self.found();
                    return Err(self.error_here(format!("unknown modifier `{found}`")));
                }
            };

            match modifier {
                Some(modifier) => {
                    if !modifiers.insert(modifier) {
                        let keyword = modifier.keyword();
                        return Err(self.error_here(format!("duplicate `{keyword}` keyword")));
                    }
                    self.bump()?;
                }
                None => {
                    if *is_const {
                        return Err(self.error_here("duplicate `const` keyword"));
                    }
                    *is_const = true;
                    self.bump()?;
                }
            }
        }

        Ok(modifiers)
    }

    /// Rejects visibility, `const`, and every modifier for decl kinds that
    /// accept none of them.
    fn forbid_decl_head(&mut self, what: &str, head: &DeclHead) -> Result<(), ParseError> {
        if head.visibility != Visibility::Unassigned {
            return Err(self.error_here(format!("{what} cannot have visibility modifiers")));
        }
        if head.is_const {
            return Err(self.error_here(format!("{what} cannot be `const`")));
        }
        if !head.modifiers.is_empty() {
            for modifier in [
                DeclModifier::Static,
                DeclModifier::Extern,
                DeclModifier::Mut,
                DeclModifier::Volatile,
                DeclModifier::Abstract,
                DeclModifier::Virtual,
                DeclModifier::Override,
            ] {
                if head.modifiers.contains(modifier) {
                    let keyword = modifier.keyword();
                    return Err(self.error_here(format!("{what} cannot be `{keyword}`")));
                }
            }
        }
        Ok(())
    }

    pub fn parse_decl(&mut self) -> Result<DeclId, ParseError> {
        let attrs = self.parse_attrs()?;
        let start = self.peek_start()?;
        let visibility = self.parse_decl_visibility()?;
        let mut is_const = false;
        let modifiers = self.parse_decl_modifiers(&mut is_const)?;

        let head = DeclHead {
            attrs,
            visibility,
            is_const,
            modifiers,
            start,
        };

        match self.peek()? {
            TokenKind::Import => {
                self.forbid_decl_head("imports", &head)?;
                self.parse_import_decl(head)
            }
            TokenKind::Namespace => {
                self.forbid_decl_head("namespaces", &head)?;
                self.parse_namespace_decl(head)
            }
            TokenKind::TypeAlias => {
                self.forbid_decl_head("typealiases", &head)?;
                self.parse_type_alias_decl(head)
            }
            TokenKind::TypeSuffix => self.parse_type_suffix_decl(head),
            TokenKind::Func => self.parse_function_decl(head, false),
            TokenKind::Init => self.parse_constructor_decl(head, false),
            TokenKind::Deinit => self.parse_destructor_decl(head, false),
            TokenKind::Call => self.parse_call_operator_decl(head, false),
            TokenKind::Subscript => self.parse_subscript_decl(head, false),
            TokenKind::Prop => self.parse_property_decl(head, false),
            TokenKind::Operator => self.parse_operator_decl(head, false),
            TokenKind::Explicit => self.parse_cast_operator_decl(head, CastKind::Explicit),
            TokenKind::Implicit => self.parse_cast_operator_decl(head, CastKind::Implicit),
            TokenKind::Struct => self.parse_struct_decl(head, StructKind::Struct),
            TokenKind::Class => self.parse_struct_decl(head, StructKind::Class),
            TokenKind::Union => self.parse_struct_decl(head, StructKind::Union),
            TokenKind::Trait => self.parse_trait_decl(head),
            TokenKind::Enum => self.parse_enum_decl(head),
            TokenKind::Case => {
                self.forbid_decl_head("enum cases", &head)?;
                self.parse_enum_const_decl(head, false)
            }
            TokenKind::Extension => self.parse_extension_decl(head),
            TokenKind::Let => Err(self.error_here(
                "`let` cannot be used outside of function bodies (use `static var` or `const var` instead)",
            )),
            TokenKind::Var => {
                self.bump()?;
                let decl = self.parse_variable_decl(head, false)?;
                // Statement terminators are optional.
                self.consume(TokenKind::Semicolon)?;
                Ok(decl)
            }
            TokenKind::Symbol => {
                let found = self.found();
                Err(self.error_here(format!(
                    "unexpected token `{found}`, did you mean `var {found}`?"
                )))
            }
            _ => {
                let found = self.found();
                Err(self.error_here(format!("unexpected token `{found}`")))
            }
        }
    }

    /// Bodiless declaration used inside `has` expressions.
    fn parse_prototype_decl(&mut self) -> Result<DeclId, ParseError> {
        if matches!(
            self.peek()?,
            TokenKind::Public | TokenKind::Private | TokenKind::Protected | TokenKind::Internal
        ) {
            return Err(self.error_here(
                "declaration prototypes cannot have visibility modifiers in this context",
            ));
        }

        let start = self.peek_start()?;
        let mut is_const = false;
        let mut modifiers = self.parse_decl_modifiers(&mut is_const)?;

        if !modifiers.only_contains(&[DeclModifier::Static, DeclModifier::Mut, DeclModifier::Virtual])
        {
            return Err(self.error_here("unsupported decl modifier on prototype"));
        }

        modifiers.insert(DeclModifier::Prototype);

        let head = DeclHead {
            attrs: Vec::new(),
            visibility: Visibility::Unassigned,
            is_const,
            modifiers,
            start,
        };

        match self.peek()? {
            TokenKind::Trait => {
                self.bump()?;
                let trait_type = self.parse_type()?;
                let span = self.span_from(start);
                let name = Ident::new(span, "trait".to_string());
                let mut decl = Decl::new(
                    self.file,
                    span,
                    name,
                    DeclKind::TraitPrototype(TraitPrototypeDecl { trait_type }),
                );
                decl.modifiers = head.modifiers;
                Ok(self.ctx.alloc(decl))
            }
            TokenKind::Var => {
                if head.modifiers.contains(DeclModifier::Virtual) {
                    return Err(self.error_here("`var` declarations cannot be `virtual`"));
                }
                self.bump()?;
                self.parse_variable_decl(head, true)
            }
            TokenKind::Prop => self.parse_property_decl(head, true),
            TokenKind::Subscript => self.parse_subscript_decl(head, true),
            TokenKind::Func => self.parse_function_decl(head, true),
            TokenKind::Operator => self.parse_operator_decl(head, true),
            TokenKind::Call => self.parse_call_operator_decl(head, true),
            TokenKind::Init => self.parse_constructor_decl(head, true),
            TokenKind::Deinit => self.parse_destructor_decl(head, true),
            TokenKind::Case => {
                if head.modifiers.contains(DeclModifier::Virtual) {
                    return Err(self.error_here("enum `case` declarations cannot be `virtual`"));
                }
                if head.modifiers.contains(DeclModifier::Static) {
                    return Err(self.error_here("enum `case` declarations cannot be `static`"));
                }
                if head.is_const {
                    return Err(self.error_here("enum `case` declarations cannot be `const`"));
                }
                self.parse_enum_const_decl(head, true)
            }
            _ => {
                let found = self.found();
                Err(self.error_here(format!(
                    "unexpected token `{found}`, expected a prototype declaration"
                )))
            }
        }
    }

    /// Body or prototype: no `{` marks the declaration as a prototype.
    fn parse_body_or_prototype(
        &mut self,
        parse_prototype: bool,
        modifiers: &mut DeclModifiers,
    ) -> Result<CompoundStmt, ParseError> {
        if parse_prototype || self.peek()? != TokenKind::LCurly {
            modifiers.insert(DeclModifier::Prototype);
            Ok(CompoundStmt::empty(self.span_from(self.last_end)))
        } else {
            self.parse_compound_stmt()
        }
    }

    fn finish_decl(&mut self, mut decl: Decl, head: DeclHead) -> DeclId {
        decl.attrs = head.attrs;
        decl.visibility = head.visibility;
        decl.is_const_expr = head.is_const;
        decl.span = self.span_from(head.start);
        self.ctx.alloc(decl)
    }

    fn parse_import_decl(&mut self, head: DeclHead) -> Result<DeclId, ParseError> {
        self.expect(TokenKind::Import, "`import`")?;

        let path = self.parse_dot_separated_identifiers()?;

        let alias = if self.consume(TokenKind::As)? {
            if self.peek()? != TokenKind::Symbol {
                let found = self.found();
                return Err(self.error_here(format!(
                    "expected import alias identifier after `as`, found `{found}`"
                )));
            }
            Some(self.parse_identifier()?)
        } else {
            None
        };

        self.consume(TokenKind::Semicolon)?;

        let name = alias
            .clone()
            .unwrap_or_else(|| path.last().expect("import path is never empty").clone());
        let decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::Import(ImportDecl {
                path,
                alias,
                resolved: None,
            }),
        );
        Ok(self.finish_decl(decl, head))
    }

    fn parse_namespace_decl(&mut self, head: DeclHead) -> Result<DeclId, ParseError> {
        self.expect(TokenKind::Namespace, "`namespace`")?;

        if self.peek()? != TokenKind::Symbol {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected namespace name after `namespace`, found `{found}`"
            )));
        }

        // `namespace a.b.c { … }` nests namespaces with the members attached
        // to the innermost one.
        let names = self.parse_dot_separated_identifiers()?;

        if !self.consume(TokenKind::LCurly)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected beginning `{{` for namespace, found `{found}`"
            )));
        }

        let mut members = Vec::new();
        while self.peek()? != TokenKind::RCurly && self.peek()? != TokenKind::EndOfFile {
            members.push(self.parse_decl()?);
        }

        if !self.consume(TokenKind::RCurly)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected ending `}}` for namespace, found `{found}`"
            )));
        }

        let span = self.span_from(head.start);

        // Build from the innermost namespace outward.
        let mut names = names;
        let innermost_name = names.pop().expect("dotted namespace path is never empty");
        let mut decl = Decl::new(
            self.file,
            span,
            innermost_name,
            DeclKind::Namespace(NamespaceDecl { members }),
        );
        decl.attrs = head.attrs;
        let mut current = self.ctx.alloc(decl);

        while let Some(outer_name) = names.pop() {
            let outer = Decl::new(
                self.file,
                span,
                outer_name,
                DeclKind::Namespace(NamespaceDecl {
                    members: vec![current],
                }),
            );
            current = self.ctx.alloc(outer);
        }

        Ok(current)
    }

    fn parse_function_decl(
        &mut self,
        mut head: DeclHead,
        parse_prototype: bool,
    ) -> Result<DeclId, ParseError> {
        self.expect(TokenKind::Func, "`func`")?;

        let name = self.parse_identifier()?;

        let template_params = if self.peek()? == TokenKind::Less {
            self.parse_template_parameters()?
        } else {
            Vec::new()
        };

        let params = self.parse_parameters()?;

        let return_type = if self.consume(TokenKind::Arrow)? {
            Some(self.parse_type()?)
        } else {
            None
        };

        let contracts = self.parse_conts()?;
        let body = self.parse_body_or_prototype(parse_prototype, &mut head.modifiers)?;

        let func = FunctionDecl::new(params, return_type, contracts, body);
        let kind = if template_params.is_empty() {
            DeclKind::Function(func)
        } else {
            DeclKind::TemplateFunction(TemplateFunctionDecl {
                template_params,
                func,
                instantiations: Vec::new(),
            })
        };

        let mut decl = Decl::new(self.file, self.span_from(head.start), name, kind);
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_constructor_decl(
        &mut self,
        mut head: DeclHead,
        parse_prototype: bool,
    ) -> Result<DeclId, ParseError> {
        let init_token = self.expect(TokenKind::Init, "`init`")?;
        let name = Ident::new(init_token.span, "init".to_string());

        let mut ctor_kind = ConstructorKind::Normal;

        if self.peek()? == TokenKind::Symbol {
            let text = self.found();
            match text.as_str() {
                "move" => ctor_kind = ConstructorKind::Move,
                "copy" => ctor_kind = ConstructorKind::Copy,
                other => {
                    return Err(self.error_here(format!(
                        "unknown `init` kind `{other}`, only `move` and `copy` are accepted"
                    )));
                }
            }
            self.bump()?;
        }

        if self.peek()? == TokenKind::Less {
            return Err(self.error_here(
                "unexpected `<` after `init`, expected `(` (`init` cannot have template parameters)",
            ));
        }
        if self.peek()? != TokenKind::LParen {
            let found = self.found();
            return Err(self.error_here(format!("expected init parameters, found `{found}`")));
        }

        let params = self.parse_parameters()?;

        // `init() : base(…)` / `init() : self(…)` delegation.
        let base_call = if self.consume(TokenKind::Colon)? {
            let target_start = self.peek_start()?;
            let target = self.found();
            if target != "base" && target != "self" {
                return Err(
                    self.error_here(format!("expected `base` or `self` after `:`, found `{target}`"))
                );
            }
            let target_token = self.bump()?;
            let callee = Expr::new(
                target_token.span,
                ExprKind::Identifier {
                    name: Ident::new(target_token.span, target_token.text),
                    template_args: Vec::new(),
                },
            );

            self.expect(TokenKind::LParen, "`(` for the delegated constructor call")?;
            let args = self.parse_call_arguments(TokenKind::RParen)?;
            if !self.consume(TokenKind::RParen)? {
                let found = self.found();
                return Err(self.error_here(format!(
                    "expected ending `)` for the delegated constructor call, found `{found}`"
                )));
            }

            Some(Expr::new(
                self.span_from(target_start),
                ExprKind::FunctionCall {
                    callee: Box::new(callee),
                    args,
                },
            ))
        } else {
            None
        };

        let contracts = self.parse_conts()?;
        let body = self.parse_body_or_prototype(parse_prototype, &mut head.modifiers)?;

        let decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::Constructor(ConstructorDecl {
                kind: ctor_kind,
                base_call,
                func: FunctionDecl::new(params, None, contracts, body),
            }),
        );
        let mut decl = decl;
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_destructor_decl(
        &mut self,
        mut head: DeclHead,
        parse_prototype: bool,
    ) -> Result<DeclId, ParseError> {
        let deinit_token = self.expect(TokenKind::Deinit, "`deinit`")?;
        let name = Ident::new(deinit_token.span, "deinit".to_string());

        if self.peek()? == TokenKind::Less {
            return Err(self.error_here(
                "unexpected `<` after `deinit` (`deinit` cannot have template parameters)",
            ));
        }

        // Empty parens are allowed, parameters are not.
        if self.consume(TokenKind::LParen)? && !self.consume(TokenKind::RParen)? {
            return Err(self.error_here("`deinit` cannot be given parameters"));
        }

        let contracts = self.parse_conts()?;
        let body = self.parse_body_or_prototype(parse_prototype, &mut head.modifiers)?;

        let mut decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::Destructor(FunctionDecl::new(Vec::new(), None, contracts, body)),
        );
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_call_operator_decl(
        &mut self,
        mut head: DeclHead,
        parse_prototype: bool,
    ) -> Result<DeclId, ParseError> {
        let call_token = self.expect(TokenKind::Call, "`call`")?;
        let name = Ident::new(call_token.span, "call".to_string());

        if self.peek()? == TokenKind::Less {
            return Err(self.error_here(
                "unexpected `<` after `call`, expected `(` (`call` cannot have template parameters)",
            ));
        }
        if self.peek()? != TokenKind::LParen {
            let found = self.found();
            return Err(self.error_here(format!("expected call parameters, found `{found}`")));
        }

        let params = self.parse_parameters()?;

        let return_type = if self.consume(TokenKind::Arrow)? {
            Some(self.parse_type()?)
        } else {
            None
        };

        let contracts = self.parse_conts()?;
        let body = self.parse_body_or_prototype(parse_prototype, &mut head.modifiers)?;

        let mut decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::CallOperator(FunctionDecl::new(params, return_type, contracts, body)),
        );
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_operator_decl(
        &mut self,
        mut head: DeclHead,
        parse_prototype: bool,
    ) -> Result<DeclId, ParseError> {
        self.expect(TokenKind::Operator, "`operator`")?;

        let fixity = if self.consume(TokenKind::Prefix)? {
            OperatorFixity::Prefix
        } else if self.consume(TokenKind::Infix)? {
            OperatorFixity::Infix
        } else if self.consume(TokenKind::Postfix)? {
            OperatorFixity::Postfix
        } else {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected `prefix`, `infix`, or `postfix` after `operator`, found `{found}`"
            )));
        };

        if self.peek_category()? != TokenCategory::Operator {
            let found = self.found();
            return Err(self.error_here(format!("expected an operator, found `{found}`")));
        }

        let op_token = self.bump()?;
        let op = match operator_kind(fixity, op_token.kind) {
            Some(op) => op,
            None => {
                let text = op_token.text;
                let fixity_name = fixity.name();
                return Err(self.error_here(format!(
                    "`{text}` cannot be overloaded as a {fixity_name} operator"
                )));
            }
        };
        let name = Ident::new(op_token.span, op_token.text);

        let params = self.parse_parameters()?;

        let return_type = if self.consume(TokenKind::Arrow)? {
            Some(self.parse_type()?)
        } else {
            None
        };

        let contracts = self.parse_conts()?;
        let body = self.parse_body_or_prototype(parse_prototype, &mut head.modifiers)?;

        let mut decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::Operator(OperatorDecl {
                op,
                func: FunctionDecl::new(params, return_type, contracts, body),
            }),
        );
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_cast_operator_decl(
        &mut self,
        mut head: DeclHead,
        cast_kind: CastKind,
    ) -> Result<DeclId, ParseError> {
        // `explicit operator as -> T { … }` / `implicit operator as -> T { … }`
        self.bump()?;
        self.expect(TokenKind::Operator, "`operator`")?;
        let as_token = self.expect(TokenKind::As, "`as` for a cast operator")?;
        let name = Ident::new(as_token.span, "as".to_string());

        self.expect(TokenKind::Arrow, "`->` for the cast target type")?;
        let target_type = self.parse_type()?;

        let contracts = self.parse_conts()?;
        let body = self.parse_body_or_prototype(false, &mut head.modifiers)?;

        let mut decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::CastOperator(CastOperatorDecl {
                cast_kind,
                target_type: target_type.clone(),
                func: FunctionDecl::new(Vec::new(), Some(target_type), contracts, body),
            }),
        );
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_template_parameters(&mut self) -> Result<Vec<DeclId>, ParseError> {
        self.expect(TokenKind::Less, "`<` to begin template parameters")?;

        let old_right_shift = self.lexer.right_shift_state();
        self.lexer.set_right_shift_state(false);

        let mut params = Vec::new();

        while self.peek()? != TokenKind::TemplateEnd && self.peek()? != TokenKind::EndOfFile {
            if self.peek()? == TokenKind::AtSymbol {
                return Err(self.error_here("template parameters cannot have attributes"));
            }

            let start = self.peek_start()?;
            let param_kind = if self.consume(TokenKind::Const)? {
                TemplateParameterKind::Const
            } else {
                TemplateParameterKind::Typename
            };

            let name = self.parse_identifier()?;

            let ty = if self.consume(TokenKind::Colon)? {
                Some(self.parse_type()?)
            } else {
                // Typename parameters may omit the specialization; `const`
                // parameters must be typed.
                if param_kind == TemplateParameterKind::Const {
                    return Err(self.error_here("template const parameters must have a type"));
                }
                None
            };

            let default_value = if self.consume(TokenKind::Equals)? {
                // Only identifier-or-literal defaults, so a bare `>` cannot
                // appear without parentheses.
                Some(self.parse_identifier_or_literal_expr()?)
            } else {
                None
            };

            let decl = Decl::new(
                self.file,
                self.span_from(start),
                name,
                DeclKind::TemplateParameter(TemplateParameterDecl {
                    param_kind,
                    ty,
                    default_value,
                }),
            );
            params.push(self.ctx.alloc(decl));

            if !self.consume(TokenKind::Comma)? {
                break;
            }
        }

        if !self.consume(TokenKind::TemplateEnd)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected `,` or `>` for template parameters, found `{found}`"
            )));
        }

        self.lexer.set_right_shift_state(old_right_shift);
        Ok(params)
    }

    fn parse_parameters(&mut self) -> Result<Vec<DeclId>, ParseError> {
        if !self.consume(TokenKind::LParen)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected beginning `(` for parameters, found `{found}`"
            )));
        }

        let mut params = Vec::new();

        while self.peek()? != TokenKind::RParen && self.peek()? != TokenKind::EndOfFile {
            let attrs = self.parse_attrs()?;
            let start = self.peek_start()?;

            if matches!(
                self.peek()?,
                TokenKind::In
                    | TokenKind::Out
                    | TokenKind::InOut
                    | TokenKind::Mut
                    | TokenKind::Immut
                    | TokenKind::Const
            ) {
                return Err(self.error_here(
                    "`in`, `out`, `inout`, `const`, `mut`, and `immut` must be placed before the \
                     parameter type (wrap the label with `` ` `` if it was meant as an argument label)",
                ));
            }

            // Keywords are legal argument labels; grave quoting also works.
            let has_grave = self.consume(TokenKind::Grave)?;

            let category = self.peek_category()?;
            let label = if category == TokenCategory::Keyword
                || category == TokenCategory::Modifier
                || self.peek()? == TokenKind::Symbol
            {
                let token = self.bump()?;
                Ident::new(token.span, token.text)
            } else if self.peek()? == TokenKind::Colon {
                let found = self.found();
                return Err(self.error_here(format!(
                    "expected argument label or parameter name, found `{found}`"
                )));
            } else {
                let found = self.found();
                return Err(self.error_here(format!(
                    "expected argument label or parameter name, found `{found}`"
                )));
            };

            if has_grave && !self.consume(TokenKind::Grave)? {
                let found = self.found();
                return Err(self.error_here(format!("expected closing `` ` ``, found `{found}`")));
            }

            // With an immediate `:` the label doubles as the parameter name.
            let name = if self.consume(TokenKind::Colon)? {
                label.clone()
            } else {
                let name = self.parse_identifier()?;
                if !self.consume(TokenKind::Colon)? {
                    let found = self.found();
                    let param = &name.node;
                    return Err(self.error_here(format!(
                        "expected `:` after parameter name `{param}`, found `{found}`"
                    )));
                }
                name
            };

            let mode = if self.consume(TokenKind::In)? {
                ParameterMode::In
            } else if self.consume(TokenKind::Out)? {
                ParameterMode::Out
            } else if self.peek()? == TokenKind::Immut {
                return Err(self.error_here("redundant `immut`, parameters are `immut` by default"));
            } else if self.peek()? == TokenKind::Const {
                return Err(self.error_here("`const` cannot be used in this context"));
            } else {
                ParameterMode::Val
            };

            let param_type = self.parse_type()?;

            let default_value = if self.consume(TokenKind::Equals)? {
                Some(self.parse_expr()?)
            } else {
                None
            };

            let mut decl = Decl::new(
                self.file,
                self.span_from(start),
                name,
                DeclKind::Parameter(ParameterDecl {
                    label,
                    param_type,
                    default_value,
                    mode,
                }),
            );
            decl.attrs = attrs;
            params.push(self.ctx.alloc(decl));

            if !self.consume(TokenKind::Comma)? {
                break;
            }
        }

        if !self.consume(TokenKind::RParen)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected ending `)` for parameters, found `{found}`"
            )));
        }

        Ok(params)
    }

    fn parse_accessor_block(
        &mut self,
        owner: &str,
        element_type: &Type,
        parse_prototype: bool,
        is_subscript: bool,
    ) -> Result<(Vec<DeclId>, Option<DeclId>), ParseError> {
        if !self.consume(TokenKind::LCurly)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected opening `{{` for {owner}, found `{found}`"
            )));
        }

        let mut getters = Vec::new();
        let mut setter: Option<DeclId> = None;

        let mut is_first = true;
        let mut previous_end_line = 0u32;

        while self.peek()? != TokenKind::RCurly && self.peek()? != TokenKind::EndOfFile {
            while self.consume(TokenKind::Semicolon)? {}
            if self.peek()? == TokenKind::RCurly || self.peek()? == TokenKind::EndOfFile {
                break;
            }

            let accessor_start = self.peek_start()?;
            let accessor_line = self.peek_line()?;

            if !is_first && previous_end_line == accessor_line {
                return Err(self.error_here(
                    "multiple `get` and `set` declarations can only share a line when separated by `;`",
                ));
            }
            is_first = false;

            let attrs = self.parse_attrs()?;
            let visibility = self.parse_decl_visibility()?;
            let mut is_const = false;
            let mut modifiers = self.parse_decl_modifiers(&mut is_const)?;

            let get_or_set = self.found();
            match get_or_set.as_str() {
                "get" => {
                    let get_token = self.bump()?;

                    let mut result = GetResult::Normal;
                    let mut return_type = element_type.clone();

                    // `get ref` and `get ref mut`.
                    if self.consume(TokenKind::Ref)? {
                        if self.consume(TokenKind::Mut)? {
                            let mut inner = return_type;
                            inner.qualifier = TypeQualifier::Mut;
                            return_type =
                                Type::new(inner.span, TypeKind::Reference(Box::new(inner)));
                            result = GetResult::RefMut;
                        } else {
                            let mut inner = return_type;
                            inner.qualifier = TypeQualifier::Immut;
                            return_type =
                                Type::new(inner.span, TypeKind::Reference(Box::new(inner)));
                            result = GetResult::Ref;
                        }
                    }

                    let contracts = self.parse_conts()?;
                    let body = self.parse_body_or_prototype(parse_prototype, &mut modifiers)?;

                    let func =
                        FunctionDecl::new(Vec::new(), Some(return_type), contracts, body);
                    let kind = if is_subscript {
                        DeclKind::SubscriptGet(AccessorDecl { result, func })
                    } else {
                        DeclKind::PropertyGet(AccessorDecl { result, func })
                    };
                    let mut decl = Decl::new(
                        self.file,
                        self.span_from(accessor_start),
                        Ident::new(get_token.span, "get".to_string()),
                        kind,
                    );
                    decl.attrs = attrs;
                    decl.visibility = visibility;
                    decl.is_const_expr = is_const;
                    decl.modifiers = modifiers;
                    getters.push(self.ctx.alloc(decl));
                }
                "set" => {
                    if setter.is_some() {
                        return Err(self.error_here(format!(
                            "duplicate `set` found (there can only be one `set` per {owner})"
                        )));
                    }

                    let set_token = self.bump()?;

                    let contracts = self.parse_conts()?;
                    let body = self.parse_body_or_prototype(parse_prototype, &mut modifiers)?;

                    let func =
                        FunctionDecl::new(Vec::new(), Some(element_type.clone()), contracts, body);
                    let kind = if is_subscript {
                        DeclKind::SubscriptSet(AccessorDecl {
                            result: GetResult::Normal,
                            func,
                        })
                    } else {
                        DeclKind::PropertySet(AccessorDecl {
                            result: GetResult::Normal,
                            func,
                        })
                    };
                    let mut decl = Decl::new(
                        self.file,
                        self.span_from(accessor_start),
                        Ident::new(set_token.span, "set".to_string()),
                        kind,
                    );
                    decl.attrs = attrs;
                    decl.visibility = visibility;
                    decl.is_const_expr = is_const;
                    decl.modifiers = modifiers;
                    setter = Some(self.ctx.alloc(decl));
                }
                other => {
                    return Err(self.error_here(format!(
                        "unknown keyword `{other}`, expected `get` or `set`"
                    )));
                }
            }

            previous_end_line = self.last_line;
        }

        if !self.consume(TokenKind::RCurly)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected closing `}}` for {owner}, found `{found}`"
            )));
        }

        Ok((getters, setter))
    }

    fn parse_property_decl(
        &mut self,
        head: DeclHead,
        parse_prototype: bool,
    ) -> Result<DeclId, ParseError> {
        self.expect(TokenKind::Prop, "`prop`")?;

        let name = self.parse_identifier()?;

        if !self.consume(TokenKind::Colon)? {
            return Err(
                self.error_here("expected `:` after property name, properties must have a type")
            );
        }

        let property_type = self.parse_type()?;
        let (getters, setter) =
            self.parse_accessor_block("property", &property_type, parse_prototype, false)?;

        let mut decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::Property(PropertyDecl {
                property_type,
                getters,
                setter,
            }),
        );
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_subscript_decl(
        &mut self,
        head: DeclHead,
        parse_prototype: bool,
    ) -> Result<DeclId, ParseError> {
        let subscript_token = self.expect(TokenKind::Subscript, "`subscript`")?;
        let name = Ident::new(subscript_token.span, "subscript".to_string());

        let params = self.parse_parameters()?;

        if !self.consume(TokenKind::Arrow)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected `->` for the subscript type, found `{found}`"
            )));
        }

        let element_type = self.parse_type()?;
        let (getters, setter) =
            self.parse_accessor_block("subscript", &element_type, parse_prototype, true)?;

        let mut decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::Subscript(SubscriptDecl {
                params,
                element_type,
                getters,
                setter,
            }),
        );
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_struct_decl(
        &mut self,
        head: DeclHead,
        struct_kind: StructKind,
    ) -> Result<DeclId, ParseError> {
        let keyword = match struct_kind {
            StructKind::Struct => "struct",
            StructKind::Class => "class",
            StructKind::Union => "union",
        };
        self.bump()?;

        if self.peek()? != TokenKind::Symbol && self.peek()? != TokenKind::Grave {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected identifier after `{keyword}`, found `{found}`"
            )));
        }

        let name = self.parse_identifier()?;

        let template_params = if self.peek()? == TokenKind::Less {
            self.parse_template_parameters()?
        } else {
            Vec::new()
        };

        let mut inherited = Vec::new();
        if self.consume(TokenKind::Colon)? {
            loop {
                inherited.push(self.parse_type()?);
                if !self.consume(TokenKind::Comma)? {
                    break;
                }
            }
        }

        // Only templates have anything contractual; validated later.
        let contracts = self.parse_conts()?;

        if !self.consume(TokenKind::LCurly)? {
            let struct_name = &name.node;
            let found = self.found();
            return Err(self.error_here(format!(
                "expected beginning `{{` for {keyword} `{struct_name}`, found `{found}`"
            )));
        }

        let mut def = StructDecl::new(struct_kind, inherited, contracts);

        while self.peek()? != TokenKind::RCurly && self.peek()? != TokenKind::EndOfFile {
            let member = self.parse_decl()?;
            match &self.ctx.decl(member).kind {
                DeclKind::Constructor(_) => def.constructors.push(member),
                DeclKind::Destructor(_) => {
                    if def.destructor.is_some() {
                        return Err(self.error_here(format!(
                            "there cannot be more than one `deinit` per {keyword}"
                        )));
                    }
                    def.destructor = Some(member);
                }
                _ => def.members.push(member),
            }
        }

        if !self.consume(TokenKind::RCurly)? {
            let struct_name = &name.node;
            let found = self.found();
            return Err(self.error_here(format!(
                "expected ending `}}` for {keyword} `{struct_name}`, found `{found}`"
            )));
        }

        let kind = if template_params.is_empty() {
            DeclKind::Struct(def)
        } else {
            DeclKind::TemplateStruct(TemplateStructDecl {
                template_params,
                def,
                instantiations: Vec::new(),
            })
        };

        let mut decl = Decl::new(self.file, self.span_from(head.start), name, kind);
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_trait_decl(&mut self, head: DeclHead) -> Result<DeclId, ParseError> {
        self.expect(TokenKind::Trait, "`trait`")?;

        if self.peek()? != TokenKind::Symbol && self.peek()? != TokenKind::Grave {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected identifier after `trait`, found `{found}`"
            )));
        }

        let name = self.parse_identifier()?;

        let template_params = if self.peek()? == TokenKind::Less {
            self.parse_template_parameters()?
        } else {
            Vec::new()
        };

        let mut inherited = Vec::new();
        if self.consume(TokenKind::Colon)? {
            loop {
                inherited.push(self.parse_type()?);
                if !self.consume(TokenKind::Comma)? {
                    break;
                }
            }
        }

        let contracts = self.parse_conts()?;

        if !self.consume(TokenKind::LCurly)? {
            let trait_name = &name.node;
            let found = self.found();
            return Err(self.error_here(format!(
                "expected beginning `{{` for trait `{trait_name}`, found `{found}`"
            )));
        }

        let mut def = TraitDecl::new(inherited, contracts);

        while self.peek()? != TokenKind::RCurly && self.peek()? != TokenKind::EndOfFile {
            def.members.push(self.parse_decl()?);
        }

        if !self.consume(TokenKind::RCurly)? {
            let trait_name = &name.node;
            let found = self.found();
            return Err(self.error_here(format!(
                "expected ending `}}` for trait `{trait_name}`, found `{found}`"
            )));
        }

        let kind = if template_params.is_empty() {
            DeclKind::Trait(def)
        } else {
            DeclKind::TemplateTrait(TemplateTraitDecl {
                template_params,
                def,
                instantiations: Vec::new(),
            })
        };

        let mut decl = Decl::new(self.file, self.span_from(head.start), name, kind);
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_enum_decl(&mut self, head: DeclHead) -> Result<DeclId, ParseError> {
        self.expect(TokenKind::Enum, "`enum`")?;

        if self.peek()? != TokenKind::Symbol && self.peek()? != TokenKind::Grave {
            let found = self.found();
            return Err(self.error_here(format!("expected enum identifier, found `{found}`")));
        }

        let name = self.parse_identifier()?;

        if self.peek()? == TokenKind::Less {
            return Err(self.error_here("enums cannot be templates"));
        }

        let underlying = if self.consume(TokenKind::Colon)? {
            Some(self.parse_type()?)
        } else {
            None
        };

        if !self.consume(TokenKind::LCurly)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected opening `{{` for enum, found `{found}`"
            )));
        }

        let mut consts = Vec::new();
        let mut members = Vec::new();

        while self.peek()? != TokenKind::RCurly && self.peek()? != TokenKind::EndOfFile {
            let member = self.parse_decl()?;
            if matches!(self.ctx.decl(member).kind, DeclKind::EnumConst(_)) {
                consts.push(member);
            } else {
                members.push(member);
            }
        }

        if !self.consume(TokenKind::RCurly)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected closing `}}` for enum, found `{found}` (did you forget a `case`?)"
            )));
        }

        let mut decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::Enum(EnumDecl {
                underlying,
                consts,
                members,
            }),
        );
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_enum_const_decl(
        &mut self,
        head: DeclHead,
        parse_prototype: bool,
    ) -> Result<DeclId, ParseError> {
        self.expect(TokenKind::Case, "`case`")?;

        let name = self.parse_identifier()?;

        let value = if !parse_prototype && self.consume(TokenKind::Equals)? {
            Some(self.parse_expr()?)
        } else {
            None
        };

        self.consume(TokenKind::Semicolon)?;

        let decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::EnumConst(EnumConstDecl { value }),
        );
        Ok(self.finish_decl(decl, head))
    }

    fn parse_extension_decl(&mut self, head: DeclHead) -> Result<DeclId, ParseError> {
        let extension_token = self.expect(TokenKind::Extension, "`extension`")?;
        let name = Ident::new(extension_token.span, "extension".to_string());

        let target = self.parse_type()?;

        let mut inherited = Vec::new();
        if self.consume(TokenKind::Colon)? {
            loop {
                inherited.push(self.parse_type()?);
                if !self.consume(TokenKind::Comma)? {
                    break;
                }
            }
        }

        if !self.consume(TokenKind::LCurly)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected beginning `{{` for extension, found `{found}`"
            )));
        }

        let mut members = Vec::new();
        while self.peek()? != TokenKind::RCurly && self.peek()? != TokenKind::EndOfFile {
            members.push(self.parse_decl()?);
        }

        if !self.consume(TokenKind::RCurly)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected ending `}}` for extension, found `{found}`"
            )));
        }

        let mut decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::Extension(ExtensionDecl {
                target,
                inherited,
                members,
            }),
        );
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_type_alias_decl(&mut self, head: DeclHead) -> Result<DeclId, ParseError> {
        self.expect(TokenKind::TypeAlias, "`typealias`")?;

        let (alias_kind, name) = if self.consume(TokenKind::Prefix)? {
            let start = self.peek_start()?;
            if self.consume(TokenKind::LSquare)? {
                if !self.consume(TokenKind::RSquare)? {
                    let found = self.found();
                    return Err(self.error_here(format!(
                        "expected `]` for `typealias prefix []`, found `{found}`"
                    )));
                }
                (
                    TypeAliasKind::Prefix,
                    Ident::new(self.span_from(start), "[]".to_string()),
                )
            } else {
                let found = self.found();
                return Err(self.error_here(format!(
                    "unexpected token after `typealias prefix`, expected `[]` but found `{found}`"
                )));
            }
        } else {
            if self.peek()? != TokenKind::Symbol && self.peek()? != TokenKind::Grave {
                let found = self.found();
                return Err(self.error_here(format!(
                    "expected identifier after `typealias`, found `{found}`"
                )));
            }
            (TypeAliasKind::Normal, self.parse_identifier()?)
        };

        let template_params = if self.peek()? == TokenKind::Less {
            self.parse_template_parameters()?
        } else {
            Vec::new()
        };

        if !self.consume(TokenKind::Equals)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected `=` for `typealias`, found `{found}`"
            )));
        }

        let value = self.parse_type()?;

        self.consume(TokenKind::Semicolon)?;

        let decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::TypeAlias(TypeAliasDecl {
                alias_kind,
                template_params,
                value,
            }),
        );
        Ok(self.finish_decl(decl, head))
    }

    fn parse_type_suffix_decl(&mut self, head: DeclHead) -> Result<DeclId, ParseError> {
        let mut head = head;
        self.expect(TokenKind::TypeSuffix, "`typesuffix`")?;

        if self.peek()? != TokenKind::Symbol {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected `typesuffix` identifier, found `{found}`"
            )));
        }

        let name = self.parse_identifier()?;

        if self.peek()? != TokenKind::LParen {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected `(` for `typesuffix` parameters, found `{found}`"
            )));
        }

        let params = self.parse_parameters()?;

        if !self.consume(TokenKind::Arrow)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected `->` for the `typesuffix` result type, found `{found}` \
                 (`typesuffix` must have a return type)"
            )));
        }

        let return_type = self.parse_type()?;
        let contracts = self.parse_conts()?;
        let body = self.parse_body_or_prototype(false, &mut head.modifiers)?;

        let mut decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::TypeSuffix(FunctionDecl::new(params, Some(return_type), contracts, body)),
        );
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    fn parse_variable_decl(
        &mut self,
        head: DeclHead,
        parse_prototype: bool,
    ) -> Result<DeclId, ParseError> {
        if self.peek()? != TokenKind::Symbol && self.peek()? != TokenKind::Grave {
            let found = self.found();
            return Err(self.error_here(format!("expected variable identifier, found `{found}`")));
        }

        let name = self.parse_identifier()?;

        let var_type = if self.consume(TokenKind::Colon)? {
            Some(self.parse_type()?)
        } else {
            None
        };

        let initializer = if !parse_prototype && self.consume(TokenKind::Equals)? {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let mut decl = Decl::new(
            self.file,
            self.span_from(head.start),
            name,
            DeclKind::Variable(VariableDecl {
                var_type,
                initializer,
            }),
        );
        decl.modifiers = head.modifiers;
        Ok(self.finish_decl(decl, head))
    }

    // Contracts -------------------------------------------------------------

    fn parse_conts(&mut self) -> Result<Vec<Cont>, ParseError> {
        let mut contracts = Vec::new();

        loop {
            match self.peek()? {
                TokenKind::Requires => {
                    let start = self.peek_start()?;
                    self.bump()?;
                    let condition = self.parse_expr()?;
                    contracts.push(Cont::Requires(RequiresCont {
                        span: self.span_from(start),
                        condition,
                    }));
                }
                TokenKind::Ensures => {
                    let start = self.peek_start()?;
                    self.bump()?;
                    let condition = self.parse_expr()?;
                    contracts.push(Cont::Ensures(EnsuresCont {
                        span: self.span_from(start),
                        condition,
                    }));
                }
                TokenKind::Throws => {
                    let start = self.peek_start()?;
                    self.bump()?;
                    let exception = if self.peek()? == TokenKind::Symbol {
                        Some(self.parse_identifier()?)
                    } else {
                        None
                    };
                    contracts.push(Cont::Throws(ThrowsCont {
                        span: self.span_from(start),
                        exception,
                    }));
                }
                TokenKind::Where => {
                    contracts.push(Cont::Where(self.parse_where_cont()?));
                }
                _ => break,
            }
        }

        Ok(contracts)
    }

    fn parse_where_cont(&mut self) -> Result<WhereCont, ParseError> {
        let start = self.peek_start()?;
        self.expect(TokenKind::Where, "`where`")?;

        let condition = self.parse_expr()?;

        // `where` is the only place where `A : B` means "`A` extends `B`";
        // everywhere else `:` belongs to argument labels.
        let condition = if self.peek()? == TokenKind::Colon {
            let ExprKind::Identifier {
                name,
                template_args,
            } = condition.kind
            else {
                return Err(self.error_here(
                    "unexpected `:` after `where` condition (`:` can only check that a type \
                     name extends another type in this context)",
                ));
            };

            self.bump()?;

            let extends_type = self.parse_type()?;
            let check_span = name.span;
            let check = Type::new(
                check_span,
                TypeKind::Unresolved {
                    path: Vec::new(),
                    name,
                    args: template_args,
                },
            );

            Expr::new(
                self.span_from(start),
                ExprKind::CheckExtendsType {
                    check,
                    extends: extends_type,
                },
            )
        } else {
            condition
        };

        Ok(WhereCont {
            span: self.span_from(start),
            condition,
        })
    }

    // Statements ------------------------------------------------------------

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek()? {
            TokenKind::Break => self.parse_break_stmt(),
            TokenKind::Continue => self.parse_continue_stmt(),
            TokenKind::Do => self.parse_do_stmt(),
            TokenKind::Fallthrough => {
                let start = self.peek_start()?;
                self.bump()?;
                Ok(Stmt::Fallthrough(self.span_from(start)))
            }
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::Goto => self.parse_goto_stmt(),
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::Repeat => self.parse_repeat_while_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::Switch => self.parse_switch_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::LCurly => {
                Err(self.error_here("`{` cannot appear alone as a statement, did you mean `do {`?"))
            }
            _ => {
                let start = self.peek_start()?;
                let expr = self.parse_variable_expr()?;

                // A bare identifier followed by `:` labels the next statement.
                if let ExprKind::Identifier {
                    name,
                    template_args,
                } = &expr.kind
                {
                    if template_args.is_empty() && self.consume(TokenKind::Colon)? {
                        let label = name.clone();
                        let stmt = self.parse_stmt()?;
                        return Ok(Stmt::Labeled(LabeledStmt {
                            span: self.span_from(start),
                            label,
                            stmt: Box::new(stmt),
                        }));
                    }
                }

                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_break_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_start()?;
        self.bump()?;

        let label = if self.peek()? == TokenKind::Symbol {
            Some(self.parse_identifier()?)
        } else {
            None
        };

        Ok(Stmt::Break(BreakStmt {
            span: self.span_from(start),
            label,
        }))
    }

    fn parse_continue_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_start()?;
        self.bump()?;

        let label = if self.peek()? == TokenKind::Symbol {
            Some(self.parse_identifier()?)
        } else {
            None
        };

        Ok(Stmt::Continue(ContinueStmt {
            span: self.span_from(start),
            label,
        }))
    }

    fn parse_goto_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_start()?;
        self.bump()?;

        let label = self.parse_identifier()?;

        Ok(Stmt::Goto(GotoStmt {
            span: self.span_from(start),
            label,
        }))
    }

    fn parse_do_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_start()?;
        self.bump()?;

        let body = self.parse_compound_stmt()?;

        if self.peek()? == TokenKind::Catch || self.peek()? == TokenKind::Finally {
            self.parse_do_catch_stmt(start, body)
        } else {
            Ok(Stmt::Do(DoStmt {
                span: self.span_from(start),
                body,
            }))
        }
    }

    fn parse_do_catch_stmt(&mut self, start: usize, body: CompoundStmt) -> Result<Stmt, ParseError> {
        let mut catches = Vec::new();
        let mut finally = None;

        while self.peek()? == TokenKind::Catch || self.peek()? == TokenKind::Finally {
            if self.consume(TokenKind::Catch)? {
                catches.push(self.parse_catch_stmt()?);
            } else {
                if finally.is_some() {
                    return Err(
                        self.error_here("a `do` statement cannot have multiple `finally` blocks")
                    );
                }
                self.bump()?;
                finally = Some(self.parse_compound_stmt()?);
            }
        }

        Ok(Stmt::DoCatch(DoCatchStmt {
            span: self.span_from(start),
            body,
            catches,
            finally,
        }))
    }

    fn parse_catch_stmt(&mut self) -> Result<CatchStmt, ParseError> {
        let start = self.peek_start()?;

        let (exception_var, exception_type) = if self.peek()? == TokenKind::Symbol {
            // `catch e: ExceptionType { … }`
            let var = self.parse_identifier()?;
            if !self.consume(TokenKind::Colon)? {
                let found = self.found();
                return Err(self.error_here(format!(
                    "expected `:` after the exception variable name, found `{found}`"
                )));
            }
            (Some(var), Some(self.parse_type()?))
        } else if self.consume(TokenKind::Colon)? {
            // `catch: ExceptionType { … }`
            (None, Some(self.parse_type()?))
        } else {
            (None, None)
        };

        let body = self.parse_compound_stmt()?;

        Ok(CatchStmt {
            span: self.span_from(start),
            exception_var,
            exception_type,
            body,
        })
    }

    fn parse_for_stmt(&mut self) -> Result<Stmt, ParseError> {
        // The two `;` separators are mandatory; every section is optional.
        let start = self.peek_start()?;
        self.bump()?;

        let init = if self.consume(TokenKind::Semicolon)? {
            None
        } else {
            let init = self.parse_variable_expr()?;
            if !self.consume(TokenKind::Semicolon)? {
                return Err(self.error_here("expected `;` after the `for` loop's init expression"));
            }
            Some(init)
        };

        let condition = if self.consume(TokenKind::Semicolon)? {
            None
        } else {
            let condition = self.parse_expr()?;
            if !self.consume(TokenKind::Semicolon)? {
                return Err(self.error_here("expected `;` after the `for` loop's condition"));
            }
            Some(condition)
        };

        let iteration = if self.peek()? != TokenKind::LCurly {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let body = self.parse_compound_stmt()?;

        Ok(Stmt::For(ForStmt {
            span: self.span_from(start),
            init,
            condition,
            iteration,
            body,
        }))
    }

    fn parse_if_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_start()?;
        self.bump()?;

        let condition = self.parse_expr()?;
        let then_block = self.parse_compound_stmt()?;

        let else_block = if self.consume(TokenKind::Else)? {
            match self.peek()? {
                TokenKind::If => Some(Box::new(self.parse_if_stmt()?)),
                TokenKind::LCurly => Some(Box::new(Stmt::Compound(self.parse_compound_stmt()?))),
                _ => {
                    let found = self.found();
                    return Err(self.error_here(format!(
                        "expected `if` or `{{` after `else`, found `{found}`"
                    )));
                }
            }
        } else {
            None
        };

        Ok(Stmt::If(IfStmt {
            span: self.span_from(start),
            condition,
            then_block,
            else_block,
        }))
    }

    fn parse_repeat_while_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_start()?;
        self.bump()?;

        let body = self.parse_compound_stmt()?;

        if !self.consume(TokenKind::While)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected `while` to end the `repeat` loop, found `{found}`"
            )));
        }

        let condition = self.parse_expr()?;

        Ok(Stmt::RepeatWhile(RepeatWhileStmt {
            span: self.span_from(start),
            body,
            condition,
        }))
    }

    fn parse_return_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_start()?;
        self.bump()?;

        // A value follows only when the next token can begin an expression.
        let category = self.peek_category()?;
        let kind = self.peek()?;
        let has_value = category == TokenCategory::Value
            || category == TokenCategory::Operator
            || matches!(
                kind,
                TokenKind::SizeOf
                    | TokenKind::AlignOf
                    | TokenKind::OffsetOf
                    | TokenKind::NameOf
                    | TokenKind::TraitsOf
                    | TokenKind::Try
                    | TokenKind::Ref
                    | TokenKind::True
                    | TokenKind::False
                    | TokenKind::LSquare
                    | TokenKind::LParen
                    | TokenKind::Grave
            );

        let value = if has_value {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(Stmt::Return(ReturnStmt {
            span: self.span_from(start),
            value,
        }))
    }

    fn parse_switch_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_start()?;
        self.bump()?;

        let condition = self.parse_expr()?;

        if !self.consume(TokenKind::LCurly)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected `{{` after the `switch` condition, found `{found}`"
            )));
        }

        let mut cases = Vec::new();

        while self.peek()? != TokenKind::RCurly && self.peek()? != TokenKind::EndOfFile {
            match self.peek()? {
                TokenKind::Case | TokenKind::Default => cases.push(self.parse_case_stmt()?),
                _ => {
                    return Err(self.error_here(
                        "`switch` can only contain `case` or `default` statements",
                    ));
                }
            }
        }

        if !self.consume(TokenKind::RCurly)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected `}}` to end `switch`, found `{found}`"
            )));
        }

        Ok(Stmt::Switch(SwitchStmt {
            span: self.span_from(start),
            condition,
            cases,
        }))
    }

    fn parse_case_stmt(&mut self) -> Result<CaseStmt, ParseError> {
        let start = self.peek_start()?;

        let (is_default, condition) = if self.consume(TokenKind::Case)? {
            (false, Some(self.parse_expr()?))
        } else if self.consume(TokenKind::Default)? {
            (true, None)
        } else {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected `case` or `default`, found `{found}`"
            )));
        };

        if !self.consume(TokenKind::Colon)? {
            let found = self.found();
            return Err(self.error_here(format!("expected `:`, found `{found}`")));
        }

        let mut body = Vec::new();
        let mut previous_end_line: Option<u32> = None;

        while !matches!(
            self.peek()?,
            TokenKind::RCurly | TokenKind::EndOfFile | TokenKind::Case | TokenKind::Default
        ) {
            let preceding_semicolon = self.peek()? == TokenKind::Semicolon;
            while self.consume(TokenKind::Semicolon)? {}

            if matches!(
                self.peek()?,
                TokenKind::RCurly | TokenKind::EndOfFile | TokenKind::Case | TokenKind::Default
            ) {
                break;
            }

            let stmt_line = self.peek_line()?;
            let stmt = self.parse_stmt()?;

            if !preceding_semicolon {
                if let Some(previous) = previous_end_line {
                    if previous == stmt_line {
                        return Err(ParseError::new(
                            "multiple statements on the same line must be separated by a `;`",
                            stmt.span(),
                        ));
                    }
                }
            }

            previous_end_line = Some(self.last_line);
            body.push(stmt);
        }

        Ok(CaseStmt {
            span: self.span_from(start),
            is_default,
            condition,
            body,
        })
    }

    fn parse_while_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek_start()?;
        self.bump()?;

        let condition = self.parse_expr()?;
        let body = self.parse_compound_stmt()?;

        Ok(Stmt::While(WhileStmt {
            span: self.span_from(start),
            condition,
            body,
        }))
    }

    pub fn parse_compound_stmt(&mut self) -> Result<CompoundStmt, ParseError> {
        let start = self.peek_start()?;

        if !self.consume(TokenKind::LCurly)? {
            let found = self.found();
            return Err(self.error_here(format!("expected `{{`, found `{found}`")));
        }

        let mut stmts = Vec::new();
        let mut previous_end_line: Option<u32> = None;

        while self.peek()? != TokenKind::RCurly && self.peek()? != TokenKind::EndOfFile {
            let preceding_semicolon = self.peek()? == TokenKind::Semicolon;
            while self.consume(TokenKind::Semicolon)? {}

            if self.peek()? == TokenKind::RCurly || self.peek()? == TokenKind::EndOfFile {
                break;
            }

            let stmt_line = self.peek_line()?;
            let stmt = self.parse_stmt()?;

            // The statement terminator is the next line or a `;`.
            if !preceding_semicolon {
                if let Some(previous) = previous_end_line {
                    if previous == stmt_line {
                        return Err(ParseError::new(
                            "multiple statements on the same line must be separated by a `;`",
                            stmt.span(),
                        ));
                    }
                }
            }

            previous_end_line = Some(self.last_line);
            stmts.push(stmt);
        }

        if !self.consume(TokenKind::RCurly)? {
            let found = self.found();
            return Err(self.error_here(format!("expected ending `}}`, found `{found}`")));
        }

        Ok(CompoundStmt::new(self.span_from(start), stmts))
    }

    // Expressions -----------------------------------------------------------

    /// Statement-position expression: `let`/`let mut` variable declarations
    /// or a plain expression.
    fn parse_variable_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;

        if self.consume(TokenKind::Let)? {
            let is_mut = self.consume(TokenKind::Mut)?;

            if self.peek()? != TokenKind::Symbol {
                let found = self.found();
                let what = if is_mut { "`let mut`" } else { "`let`" };
                return Err(self.error_here(format!(
                    "expected variable name after {what}, found `{found}`"
                )));
            }

            let name = self.parse_identifier()?;

            let declared_type = if self.consume(TokenKind::Colon)? {
                Some(self.parse_type()?)
            } else {
                None
            };

            let initializer = if self.consume(TokenKind::Equals)? {
                Some(Box::new(self.parse_expr()?))
            } else {
                None
            };

            Ok(Expr::new(
                self.span_from(start),
                ExprKind::VariableDecl {
                    name,
                    is_mut,
                    declared_type,
                    initializer,
                },
            ))
        } else if self.peek()? == TokenKind::Var {
            Err(self.error_here("`var` cannot be used in this context, use `let mut` instead"))
        } else {
            self.parse_expr()
        }
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let result = self.parse_ternary()?;

        let compound = match self.peek()? {
            TokenKind::Equals => None,
            TokenKind::PlusEquals => Some(InfixOperator::Add),
            TokenKind::MinusEquals => Some(InfixOperator::Subtract),
            TokenKind::StarEquals => Some(InfixOperator::Multiply),
            TokenKind::SlashEquals => Some(InfixOperator::Divide),
            TokenKind::PercentEquals => Some(InfixOperator::Remainder),
            TokenKind::LeftShiftEquals => Some(InfixOperator::ShiftLeft),
            TokenKind::RightShiftEquals => Some(InfixOperator::ShiftRight),
            TokenKind::AmpersandEquals => Some(InfixOperator::BitwiseAnd),
            TokenKind::CaretEquals => Some(InfixOperator::BitwiseXor),
            TokenKind::PipeEquals => Some(InfixOperator::BitwiseOr),
            TokenKind::CaretCaretEquals => Some(InfixOperator::Power),
            _ => return Ok(result),
        };

        self.bump()?;
        let value = self.parse_assignment()?;

        Ok(Expr::new(
            self.span_from(start),
            ExprKind::Assign {
                compound,
                target: Box::new(result),
                value: Box::new(value),
            },
        ))
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let condition = self.parse_logical_or()?;

        if !self.consume(TokenKind::Question)? {
            return Ok(condition);
        }

        let if_true = self.parse_expr()?;

        if !self.consume(TokenKind::Colon)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected `:` for the ternary operator, found `{found}`"
            )));
        }

        let if_false = self.parse_ternary()?;

        Ok(Expr::new(
            self.span_from(start),
            ExprKind::Ternary {
                condition: Box::new(condition),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            },
        ))
    }

    fn parse_infix_ladder(
        &mut self,
        start: usize,
        mut result: Expr,
        op: InfixOperator,
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        self.bump()?;
        let right = next(self)?;
        result = Expr::new(
            self.span_from(start),
            ExprKind::Infix {
                op,
                left: Box::new(result),
                right: Box::new(right),
            },
        );
        Ok(result)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let mut result = self.parse_logical_and()?;

        while self.peek()? == TokenKind::PipePipe {
            result = self.parse_infix_ladder(
                start,
                result,
                InfixOperator::LogicalOr,
                Self::parse_logical_and,
            )?;
        }

        Ok(result)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let mut result = self.parse_bitwise_or()?;

        while self.peek()? == TokenKind::AmpersandAmpersand {
            result = self.parse_infix_ladder(
                start,
                result,
                InfixOperator::LogicalAnd,
                Self::parse_bitwise_or,
            )?;
        }

        Ok(result)
    }

    fn parse_bitwise_or(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let mut result = self.parse_bitwise_xor()?;

        while self.peek()? == TokenKind::Pipe {
            result = self.parse_infix_ladder(
                start,
                result,
                InfixOperator::BitwiseOr,
                Self::parse_bitwise_xor,
            )?;
        }

        Ok(result)
    }

    fn parse_bitwise_xor(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let mut result = self.parse_bitwise_and()?;

        while self.peek()? == TokenKind::Caret {
            result = self.parse_infix_ladder(
                start,
                result,
                InfixOperator::BitwiseXor,
                Self::parse_bitwise_and,
            )?;
        }

        Ok(result)
    }

    fn parse_bitwise_and(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let mut result = self.parse_equality()?;

        while self.peek()? == TokenKind::Ampersand {
            result = self.parse_infix_ladder(
                start,
                result,
                InfixOperator::BitwiseAnd,
                Self::parse_equality,
            )?;
        }

        Ok(result)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let mut result = self.parse_relational()?;

        loop {
            let op = match self.peek()? {
                TokenKind::EqualEquals => InfixOperator::EqualTo,
                TokenKind::NotEquals => InfixOperator::NotEqualTo,
                _ => return Ok(result),
            };
            result = self.parse_infix_ladder(start, result, op, Self::parse_relational)?;
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let mut result = self.parse_shifts()?;

        loop {
            let op = match self.peek()? {
                TokenKind::Greater => InfixOperator::GreaterThan,
                TokenKind::GreaterEquals => InfixOperator::GreaterThanEqualTo,
                TokenKind::Less => InfixOperator::LessThan,
                TokenKind::LessEquals => InfixOperator::LessThanEqualTo,
                _ => return Ok(result),
            };
            result = self.parse_infix_ladder(start, result, op, Self::parse_shifts)?;
        }
    }

    fn parse_shifts(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let mut result = self.parse_additive()?;

        loop {
            let op = match self.peek()? {
                TokenKind::LeftShift => InfixOperator::ShiftLeft,
                TokenKind::RightShift => InfixOperator::ShiftRight,
                _ => return Ok(result),
            };
            result = self.parse_infix_ladder(start, result, op, Self::parse_additive)?;
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let mut result = self.parse_multiplicative()?;

        loop {
            let op = match self.peek()? {
                TokenKind::Plus => InfixOperator::Add,
                TokenKind::Minus => InfixOperator::Subtract,
                _ => return Ok(result),
            };
            result = self.parse_infix_ladder(start, result, op, Self::parse_multiplicative)?;
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let mut result = self.parse_is_as_has()?;

        loop {
            let op = match self.peek()? {
                TokenKind::Star => InfixOperator::Multiply,
                TokenKind::Slash => InfixOperator::Divide,
                TokenKind::Percent => InfixOperator::Remainder,
                TokenKind::CaretCaret => InfixOperator::Power,
                _ => return Ok(result),
            };
            result = self.parse_infix_ladder(start, result, op, Self::parse_is_as_has)?;
        }
    }

    fn parse_is_as_has(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let mut result = self.parse_prefixes()?;

        loop {
            match self.peek()? {
                TokenKind::As => {
                    self.bump()?;
                    let target = self.parse_type()?;
                    result = Expr::new(
                        self.span_from(start),
                        ExprKind::As {
                            expr: Box::new(result),
                            target,
                        },
                    );
                }
                TokenKind::Is => {
                    self.bump()?;
                    let target = self.parse_type()?;
                    result = Expr::new(
                        self.span_from(start),
                        ExprKind::Is {
                            expr: Box::new(result),
                            target,
                        },
                    );
                }
                TokenKind::Has => {
                    self.bump()?;
                    let prototype = self.parse_prototype_decl()?;
                    result = Expr::new(
                        self.span_from(start),
                        ExprKind::Has {
                            expr: Box::new(result),
                            prototype,
                        },
                    );
                }
                _ => return Ok(result),
            }
        }
    }

    fn parse_prefixes(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;

        let op = match self.peek()? {
            TokenKind::PlusPlus => Some(PrefixOperator::Increment),
            TokenKind::MinusMinus => Some(PrefixOperator::Decrement),
            TokenKind::Plus => Some(PrefixOperator::Positive),
            TokenKind::Minus => Some(PrefixOperator::Negative),
            TokenKind::Not => Some(PrefixOperator::LogicalNot),
            TokenKind::Tilde => Some(PrefixOperator::BitwiseNot),
            TokenKind::Star => Some(PrefixOperator::Dereference),
            TokenKind::Ampersand => Some(PrefixOperator::AddressOf),
            TokenKind::SizeOf => Some(PrefixOperator::SizeOf),
            TokenKind::AlignOf => Some(PrefixOperator::AlignOf),
            TokenKind::OffsetOf => Some(PrefixOperator::OffsetOf),
            TokenKind::NameOf => Some(PrefixOperator::NameOf),
            TokenKind::TraitsOf => Some(PrefixOperator::TraitsOf),
            TokenKind::Try => {
                self.bump()?;
                let expr = self.parse_prefixes()?;
                return Ok(Expr::new(
                    self.span_from(start),
                    ExprKind::Try(Box::new(expr)),
                ));
            }
            TokenKind::Ref => {
                self.bump()?;
                let is_mut = self.consume(TokenKind::Mut)?;
                // Recursing into prefixes allows `ref try member.property`.
                let expr = self.parse_prefixes()?;
                return Ok(Expr::new(
                    self.span_from(start),
                    ExprKind::Ref {
                        is_mut,
                        expr: Box::new(expr),
                    },
                ));
            }
            _ => None,
        };

        match op {
            Some(op) => {
                self.bump()?;
                let expr = self.parse_prefixes()?;
                Ok(Expr::new(
                    self.span_from(start),
                    ExprKind::Prefix {
                        op,
                        expr: Box::new(expr),
                    },
                ))
            }
            None => self.parse_call_postfix_or_member_access(),
        }
    }

    fn parse_call_postfix_or_member_access(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let mut result = self.parse_identifier_or_literal_expr()?;

        loop {
            match self.peek()? {
                TokenKind::PlusPlus => {
                    self.bump()?;
                    result = Expr::new(
                        self.span_from(start),
                        ExprKind::Postfix {
                            op: PostfixOperator::Increment,
                            expr: Box::new(result),
                        },
                    );
                }
                TokenKind::MinusMinus => {
                    self.bump()?;
                    result = Expr::new(
                        self.span_from(start),
                        ExprKind::Postfix {
                            op: PostfixOperator::Decrement,
                            expr: Box::new(result),
                        },
                    );
                }
                TokenKind::LParen => {
                    self.bump()?;
                    let args = self.parse_call_arguments(TokenKind::RParen)?;
                    if !self.consume(TokenKind::RParen)? {
                        let found = self.found();
                        return Err(self.error_here(format!(
                            "expected ending `)` for function call, found `{found}`"
                        )));
                    }
                    result = Expr::new(
                        self.span_from(start),
                        ExprKind::FunctionCall {
                            callee: Box::new(result),
                            args,
                        },
                    );
                }
                TokenKind::LSquare => {
                    self.bump()?;
                    let args = self.parse_call_arguments(TokenKind::RSquare)?;
                    if !self.consume(TokenKind::RSquare)? {
                        let found = self.found();
                        return Err(self.error_here(format!(
                            "expected ending `]` for subscript call, found `{found}`"
                        )));
                    }
                    result = Expr::new(
                        self.span_from(start),
                        ExprKind::SubscriptCall {
                            target: Box::new(result),
                            args,
                        },
                    );
                }
                TokenKind::Period | TokenKind::Arrow => {
                    let is_arrow = self.peek()? == TokenKind::Arrow;
                    self.bump()?;
                    let member_expr = self.parse_identifier_expr()?;
                    let ExprKind::Identifier {
                        name,
                        template_args,
                    } = member_expr.kind
                    else {
                        unreachable!("parse_identifier_expr always yields an identifier");
                    };
                    result = Expr::new(
                        self.span_from(start),
                        ExprKind::MemberAccess {
                            is_arrow,
                            object: Box::new(result),
                            member: name,
                            template_args,
                        },
                    );
                }
                _ => return Ok(result),
            }
        }
    }

    fn parse_call_arguments(
        &mut self,
        close: TokenKind,
    ) -> Result<Vec<LabeledArgument>, ParseError> {
        let mut args = Vec::new();

        while self.peek()? != close && self.peek()? != TokenKind::EndOfFile {
            let category = self.peek_category()?;

            // Keywords and modifiers are legal argument labels without grave
            // quoting: `attempt(try: function())`.
            if category == TokenCategory::Keyword || category == TokenCategory::Modifier {
                let label_token = self.bump()?;
                let label = Ident::new(label_token.span, label_token.text);

                if !self.consume(TokenKind::Colon)? {
                    let label_name = &label.node;
                    let found = self.found();
                    return Err(self.error_here(format!(
                        "expected `:` after argument label `{label_name}`, found `{found}`"
                    )));
                }

                let value = self.parse_expr()?;
                args.push(LabeledArgument { label, value });
            } else {
                let value = self.parse_expr()?;

                let arg = match &value.kind {
                    ExprKind::Identifier {
                        name,
                        template_args,
                    } if template_args.is_empty() && self.peek()? == TokenKind::Colon => {
                        let label = name.clone();
                        self.bump()?;
                        let labeled_value = self.parse_expr()?;
                        LabeledArgument {
                            label,
                            value: labeled_value,
                        }
                    }
                    _ => LabeledArgument {
                        label: Ident::new(value.span, UNLABELED.to_string()),
                        value,
                    },
                };
                args.push(arg);
            }

            if !self.consume(TokenKind::Comma)? {
                break;
            }
        }

        Ok(args)
    }

    fn parse_identifier_or_literal_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek()? {
            TokenKind::Grave | TokenKind::Symbol => self.parse_identifier_expr(),
            TokenKind::Number => self.parse_number_literal_expr(),
            TokenKind::StringLit => self.parse_string_literal_expr(),
            TokenKind::Character => self.parse_character_literal_expr(),
            TokenKind::True | TokenKind::False => self.parse_bool_literal_expr(),
            TokenKind::LParen => self.parse_paren_expr(),
            TokenKind::LSquare => self.parse_array_literal_or_dimension_type(),
            _ => {
                let found = self.found();
                Err(self.error_here(format!(
                    "expected a literal or identifier, found `{found}`"
                )))
            }
        }
    }

    /// Identifier with speculative template arguments. `A<B>(c)` favors the
    /// template reading; anything after the closing `>` other than
    /// `; ) . :: , (` rolls back to a comparison chain.
    fn parse_identifier_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let name = self.parse_identifier()?;

        let mut template_args = Vec::new();

        if self.peek()? == TokenKind::Less {
            let old_right_shift = self.lexer.right_shift_state();
            self.lexer.set_right_shift_state(false);
            let checkpoint = self.lexer.create_checkpoint();

            self.bump()?;

            let mut canceled = false;

            loop {
                if self.peek()? == TokenKind::TemplateEnd {
                    break;
                }
                match self.parse_prefixes() {
                    Ok(arg) => template_args.push(arg),
                    Err(_) => {
                        // Not a template argument list after all.
                        canceled = true;
                        break;
                    }
                }
                if !self.consume(TokenKind::Comma)? {
                    break;
                }
            }

            if !canceled {
                if self.consume(TokenKind::TemplateEnd)? {
                    match self.peek()? {
                        // `TemplateEnd` closes an enclosing argument list,
                        // which is how `Map<K, Vec<V>>` confirms the inner
                        // template.
                        TokenKind::Semicolon
                        | TokenKind::RParen
                        | TokenKind::Period
                        | TokenKind::ColonColon
                        | TokenKind::Comma
                        | TokenKind::LParen
                        | TokenKind::TemplateEnd => {}
                        _ => canceled = true,
                    }
                } else {
                    canceled = true;
                }
            }

            if canceled {
                self.lexer.return_to_checkpoint(checkpoint);
                template_args.clear();
            }

            self.lexer.set_right_shift_state(old_right_shift);
        }

        Ok(Expr::new(
            self.span_from(start),
            ExprKind::Identifier {
                name,
                template_args,
            },
        ))
    }

    fn parse_number_literal_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let token = self.expect(TokenKind::Number, "a number literal")?;
        let mut kind = LiteralKind::Integer;

        let (mut value, mut suffix) = split_number(&token.text);

        // Floating point: `1.0` but never `1 .0` or `1. 0`. A checkpoint is
        // needed because `123.to_string()` is also legal.
        if suffix.is_empty() && !self.lexer.peek_leading_whitespace()? {
            let checkpoint = self.lexer.create_checkpoint();

            if self.consume(TokenKind::Period)? {
                if self.lexer.peek_leading_whitespace()? || self.peek()? != TokenKind::Number {
                    self.lexer.return_to_checkpoint(checkpoint);
                } else {
                    let fraction_token = self.bump()?;
                    let (fraction, fraction_suffix) = split_number(&fraction_token.text);

                    kind = LiteralKind::Float;
                    value = format!("{value}.{fraction}");
                    suffix = fraction_suffix;
                }
            }
        }

        Ok(Expr::new(
            self.span_from(start),
            ExprKind::Literal(Literal {
                kind,
                value,
                suffix: if suffix.is_empty() { None } else { Some(suffix) },
            }),
        ))
    }

    fn parse_string_literal_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let token = self.expect(TokenKind::StringLit, "a string literal")?;

        // `"text"suffix` binds a user-defined suffix; `"text" suffix` does not.
        let suffix = if !self.lexer.peek_leading_whitespace()?
            && self.peek()? == TokenKind::Symbol
        {
            Some(self.bump()?.text)
        } else {
            None
        };

        Ok(Expr::new(
            self.span_from(start),
            ExprKind::Literal(Literal {
                kind: LiteralKind::String,
                value: token.text,
                suffix,
            }),
        ))
    }

    fn parse_character_literal_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let token = self.expect(TokenKind::Character, "a character literal")?;

        let suffix = if !self.lexer.peek_leading_whitespace()?
            && self.peek()? == TokenKind::Symbol
        {
            Some(self.bump()?.text)
        } else {
            None
        };

        Ok(Expr::new(
            self.span_from(start),
            ExprKind::Literal(Literal {
                kind: LiteralKind::Char,
                value: token.text,
                suffix,
            }),
        ))
    }

    fn parse_bool_literal_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        let value = if self.consume(TokenKind::True)? {
            true
        } else if self.consume(TokenKind::False)? {
            false
        } else {
            let found = self.found();
            return Err(self.error_here(format!("expected `true` or `false`, found `{found}`")));
        };

        Ok(Expr::new(
            self.span_from(start),
            ExprKind::Literal(Literal {
                kind: LiteralKind::Bool,
                value: value.to_string(),
                suffix: None,
            }),
        ))
    }

    fn parse_paren_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        self.expect(TokenKind::LParen, "`(`")?;

        let nested = self.parse_expr()?;

        if !self.consume(TokenKind::RParen)? {
            if self.peek()? == TokenKind::Comma {
                return Err(self.error_here("tuple values are not supported"));
            }
            let found = self.found();
            return Err(self.error_here(format!("expected ending `)`, found `{found}`")));
        }

        Ok(Expr::new(
            self.span_from(start),
            ExprKind::Paren(Box::new(nested)),
        ))
    }

    /// `[` in expression position: an array literal, or `[]T` / `[,]T`
    /// dimension-type syntax used as a first-class type expression.
    fn parse_array_literal_or_dimension_type(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek_start()?;
        self.expect(TokenKind::LSquare, "`[`")?;

        if self.peek()? == TokenKind::Comma {
            // `[,` with no leading element is dimension-type syntax.
            let mut rank = 1usize;
            while self.consume(TokenKind::Comma)? {
                rank += 1;
            }

            if !self.consume(TokenKind::RSquare)? {
                let found = self.found();
                return Err(self.error_here(format!(
                    "expected ending `]` for dimension type, found `{found}`"
                )));
            }

            let element = self.parse_type()?;
            let ty = Type::new(
                self.span_from(start),
                TypeKind::Dimension {
                    element: Box::new(element),
                    rank,
                },
            );
            return Ok(Expr::new(
                self.span_from(start),
                ExprKind::Type(Box::new(ty)),
            ));
        }

        if self.consume(TokenKind::RSquare)? {
            if self.peek()? == TokenKind::Symbol {
                // `[]T` in expression position is a 1-dimension type.
                let element = self.parse_type()?;
                let ty = Type::new(
                    self.span_from(start),
                    TypeKind::Dimension {
                        element: Box::new(element),
                        rank: 1,
                    },
                );
                return Ok(Expr::new(
                    self.span_from(start),
                    ExprKind::Type(Box::new(ty)),
                ));
            }

            // Empty array literal; whether it names a type is decided later.
            return Ok(Expr::new(
                self.span_from(start),
                ExprKind::ArrayLiteral(Vec::new()),
            ));
        }

        let mut elements = Vec::new();

        while self.peek()? != TokenKind::RSquare && self.peek()? != TokenKind::EndOfFile {
            elements.push(self.parse_expr()?);
            if !self.consume(TokenKind::Comma)? {
                break;
            }
        }

        if !self.consume(TokenKind::RSquare)? {
            let found = self.found();
            return Err(self.error_here(format!(
                "expected ending `]` for array literal, found `{found}`"
            )));
        }

        Ok(Expr::new(
            self.span_from(start),
            ExprKind::ArrayLiteral(elements),
        ))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OperatorFixity {
    Prefix,
    Infix,
    Postfix,
}

impl OperatorFixity {
    fn name(self) -> &'static str {
        match self {
            OperatorFixity::Prefix => "prefix",
            OperatorFixity::Infix => "infix",
            OperatorFixity::Postfix => "postfix",
        }
    }
}

fn operator_kind(fixity: OperatorFixity, token: TokenKind) -> Option<OperatorKind> {
    match fixity {
        OperatorFixity::Prefix => {
            let op = match token {
                TokenKind::PlusPlus => PrefixOperator::Increment,
                TokenKind::MinusMinus => PrefixOperator::Decrement,
                TokenKind::Plus => PrefixOperator::Positive,
                TokenKind::Minus => PrefixOperator::Negative,
                TokenKind::Not => PrefixOperator::LogicalNot,
                TokenKind::Tilde => PrefixOperator::BitwiseNot,
                TokenKind::Star => PrefixOperator::Dereference,
                TokenKind::Ampersand => PrefixOperator::AddressOf,
                _ => return None,
            };
            Some(OperatorKind::Prefix(op))
        }
        OperatorFixity::Infix => {
            let op = match token {
                TokenKind::Plus => InfixOperator::Add,
                TokenKind::Minus => InfixOperator::Subtract,
                TokenKind::Star => InfixOperator::Multiply,
                TokenKind::Slash => InfixOperator::Divide,
                TokenKind::Percent => InfixOperator::Remainder,
                TokenKind::CaretCaret => InfixOperator::Power,
                TokenKind::Ampersand => InfixOperator::BitwiseAnd,
                TokenKind::Pipe => InfixOperator::BitwiseOr,
                TokenKind::Caret => InfixOperator::BitwiseXor,
                TokenKind::LeftShift => InfixOperator::ShiftLeft,
                TokenKind::RightShift => InfixOperator::ShiftRight,
                TokenKind::AmpersandAmpersand => InfixOperator::LogicalAnd,
                TokenKind::PipePipe => InfixOperator::LogicalOr,
                TokenKind::EqualEquals => InfixOperator::EqualTo,
                TokenKind::NotEquals => InfixOperator::NotEqualTo,
                TokenKind::Greater => InfixOperator::GreaterThan,
                TokenKind::Less => InfixOperator::LessThan,
                TokenKind::GreaterEquals => InfixOperator::GreaterThanEqualTo,
                TokenKind::LessEquals => InfixOperator::LessThanEqualTo,
                _ => return None,
            };
            Some(OperatorKind::Infix(op))
        }
        OperatorFixity::Postfix => {
            let op = match token {
                TokenKind::PlusPlus => PostfixOperator::Increment,
                TokenKind::MinusMinus => PostfixOperator::Decrement,
                _ => return None,
            };
            Some(OperatorKind::Postfix(op))
        }
    }
}

/// Splits a raw number token into its numeric part (base prefix included)
/// and a user-defined suffix (`123px`, `0xFFu32`).
fn split_number(text: &str) -> (String, String) {
    let mut base = 10u32;
    let mut number = String::new();
    let mut suffix = String::new();

    for (index, ch) in text.chars().enumerate() {
        if !suffix.is_empty() {
            suffix.push(ch);
            continue;
        }

        let is_digit = match base {
            16 => ch.is_ascii_hexdigit(),
            2 => ch == '0' || ch == '1',
            8 => ('0'..='7').contains(&ch),
            _ => ch.is_ascii_digit(),
        };

        if is_digit {
            number.push(ch);
        } else if index == 1 && text.starts_with('0') && matches!(ch, 'x' | 'b' | 'o') {
            base = match ch {
                'x' => 16,
                'b' => 2,
                _ => 8,
            };
            number.push(ch);
        } else {
            suffix.push(ch);
        }
    }

    (number, suffix)
}
