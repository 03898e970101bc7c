use ghoul_ast::{DeclKind, ExprKind, InfixOperator, Stmt, TypeKind};
use ghoul_parse::parse_source;

#[test]
fn empty_function_parses() {
    let (ctx, file) = parse_source("func main() -> void {}").expect("parse");
    let decls = &ctx.file(file).decls;
    assert_eq!(decls.len(), 1);

    let decl = ctx.decl(decls[0]);
    assert_eq!(decl.name.node, "main");
    let DeclKind::Function(func) = &decl.kind else {
        panic!("expected a function, got {:?}", decl.describe());
    };
    assert!(func.params.is_empty());
    assert!(func.body.stmts.is_empty());

    let return_type = func.return_type.as_ref().expect("return type");
    let TypeKind::Unresolved { name, .. } = &return_type.kind else {
        panic!("return type should parse as an unresolved name");
    };
    assert_eq!(name.node, "void");
}

#[test]
fn argument_labels_parse() {
    let (ctx, file) =
        parse_source("func add(lhs x: i32, rhs y: i32) -> i32 { return x + y }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let DeclKind::Function(func) = &decl.kind else {
        panic!("expected a function");
    };
    assert_eq!(func.params.len(), 2);

    let first = ctx.decl(func.params[0]);
    let DeclKind::Parameter(param) = &first.kind else {
        panic!("expected a parameter");
    };
    assert_eq!(param.label.node, "lhs");
    assert_eq!(first.name.node, "x");
}

#[test]
fn label_doubles_as_parameter_name() {
    let (ctx, file) = parse_source("func f(value: i32) {}").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let DeclKind::Function(func) = &decl.kind else {
        panic!("expected a function");
    };
    let param = ctx.decl(func.params[0]);
    assert_eq!(param.name.node, "value");
    let DeclKind::Parameter(p) = &param.kind else {
        panic!()
    };
    assert_eq!(p.label.node, "value");
}

#[test]
fn nested_template_argument_right_shift() {
    // `Map<K, Vec<V>>` must not lex the trailing `>>` as a shift.
    let (ctx, file) =
        parse_source("struct S { var m: Map<K, Vec<V>> }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let DeclKind::Struct(def) = &decl.kind else {
        panic!("expected a struct");
    };
    let member = ctx.decl(def.members[0]);
    let DeclKind::Variable(var) = &member.kind else {
        panic!("expected a variable");
    };
    let ty = var.var_type.as_ref().expect("type");
    let TypeKind::Unresolved { name, args, .. } = &ty.kind else {
        panic!("expected unresolved template reference");
    };
    assert_eq!(name.node, "Map");
    assert_eq!(args.len(), 2);
}

#[test]
fn shift_still_lexes_in_expressions() {
    let (ctx, file) = parse_source("func f() -> i32 { return a >> b }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let DeclKind::Function(func) = &decl.kind else {
        panic!()
    };
    let Stmt::Return(ret) = &func.body.stmts[0] else {
        panic!("expected return");
    };
    let ExprKind::Infix { op, .. } = &ret.value.as_ref().unwrap().kind else {
        panic!("expected infix expression");
    };
    assert_eq!(*op, InfixOperator::ShiftRight);
}

#[test]
fn template_call_versus_comparison() {
    // `A<B>(c)` favors the template reading…
    let (ctx, file) = parse_source("func f() { A<B>(c) }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let DeclKind::Function(func) = &decl.kind else {
        panic!()
    };
    let Stmt::Expr(expr) = &func.body.stmts[0] else {
        panic!("expected expression statement");
    };
    let ExprKind::FunctionCall { callee, .. } = &expr.kind else {
        panic!("expected call, got {:?}", expr.kind);
    };
    let ExprKind::Identifier { template_args, .. } = &callee.kind else {
        panic!("expected identifier callee");
    };
    assert_eq!(template_args.len(), 1);

    // …while `a < b` with no template shape stays a comparison.
    let (ctx, file) = parse_source("func f() { x = a < b }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let DeclKind::Function(func) = &decl.kind else {
        panic!()
    };
    let Stmt::Expr(expr) = &func.body.stmts[0] else {
        panic!()
    };
    let ExprKind::Assign { value, .. } = &expr.kind else {
        panic!("expected assignment");
    };
    let ExprKind::Infix { op, .. } = &value.kind else {
        panic!("expected comparison");
    };
    assert_eq!(*op, InfixOperator::LessThan);
}

#[test]
fn statements_on_one_line_need_semicolons() {
    let err = parse_source("func f() { let a = 1 let b = 2 }").expect_err("must be rejected");
    assert!(
        err.message.contains("separated by a `;`"),
        "unexpected message: {}",
        err.message
    );

    parse_source("func f() { let a = 1; let b = 2 }").expect("semicolon separates");
    parse_source("func f() {\n    let a = 1\n    let b = 2\n}").expect("newline separates");
}

#[test]
fn duplicate_modifier_is_rejected() {
    let err = parse_source("static static var x: i32").expect_err("duplicate modifier");
    assert!(err.message.contains("duplicate `static`"));
}

#[test]
fn imports_take_no_visibility() {
    let err = parse_source("public import std.io").expect_err("visibility on import");
    assert!(err.message.contains("imports cannot have visibility"));
}

#[test]
fn import_with_alias() {
    let (ctx, file) = parse_source("import std.io as io2").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let DeclKind::Import(import) = &decl.kind else {
        panic!("expected import");
    };
    assert_eq!(import.path.len(), 2);
    assert_eq!(import.alias.as_ref().unwrap().node, "io2");
}

#[test]
fn dotted_namespace_shorthand_nests() {
    let (ctx, file) = parse_source("namespace a.b { func f() {} }").expect("parse");
    let outer = ctx.decl(ctx.file(file).decls[0]);
    assert_eq!(outer.name.node, "a");
    let DeclKind::Namespace(ns) = &outer.kind else {
        panic!("expected namespace");
    };
    let inner = ctx.decl(ns.members[0]);
    assert_eq!(inner.name.node, "b");
    let DeclKind::Namespace(inner_ns) = &inner.kind else {
        panic!("expected nested namespace");
    };
    assert_eq!(ctx.decl(inner_ns.members[0]).name.node, "f");
}

#[test]
fn contracts_parse() {
    let (ctx, file) = parse_source(
        "func div(_ a: i32, _ b: i32) -> i32 requires b != 0 ensures true throws {}",
    )
    .expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let func = decl.function().expect("function payload");
    assert_eq!(func.contracts.len(), 3);
}

#[test]
fn where_colon_becomes_check_extends() {
    let (ctx, file) =
        parse_source("struct S<T> where T : Vec3 {}").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let DeclKind::TemplateStruct(template) = &decl.kind else {
        panic!("expected template struct");
    };
    assert_eq!(template.template_params.len(), 1);
    let ghoul_ast::Cont::Where(where_cont) = &template.def.contracts[0] else {
        panic!("expected where contract");
    };
    assert!(matches!(
        where_cont.condition.kind,
        ExprKind::CheckExtendsType { .. }
    ));
}

#[test]
fn do_without_catch_is_a_scope() {
    let (ctx, file) = parse_source("func f() { do { } }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let func = decl.function().unwrap();
    assert!(matches!(func.body.stmts[0], Stmt::Do(_)));

    let (ctx, file) = parse_source("func f() { do { } catch e: Err { } finally { } }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let func = decl.function().unwrap();
    let Stmt::DoCatch(do_catch) = &func.body.stmts[0] else {
        panic!("expected do-catch");
    };
    assert_eq!(do_catch.catches.len(), 1);
    assert!(do_catch.finally.is_some());
}

#[test]
fn trait_members_without_bodies_are_prototypes() {
    let (ctx, file) = parse_source("trait T { func f() -> i32 }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let DeclKind::Trait(def) = &decl.kind else {
        panic!("expected trait");
    };
    let member = ctx.decl(def.members[0]);
    assert!(member.is_prototype());
}

#[test]
fn property_accessors() {
    let (ctx, file) = parse_source(
        "struct S {\n    prop x: i32 {\n        get { return 1 }\n        get ref {}\n        set {}\n    }\n}",
    )
    .expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let DeclKind::Struct(def) = &decl.kind else {
        panic!()
    };
    let prop = ctx.decl(def.members[0]);
    let DeclKind::Property(property) = &prop.kind else {
        panic!("expected property");
    };
    assert_eq!(property.getters.len(), 2);
    assert!(property.setter.is_some());
}

#[test]
fn float_literals_respect_whitespace() {
    let (ctx, file) = parse_source("func f() { let x = 1.5 }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let func = decl.function().unwrap();
    let Stmt::Expr(expr) = &func.body.stmts[0] else {
        panic!()
    };
    let ExprKind::VariableDecl { initializer, .. } = &expr.kind else {
        panic!()
    };
    let ExprKind::Literal(literal) = &initializer.as_ref().unwrap().kind else {
        panic!()
    };
    assert_eq!(literal.kind, ghoul_ast::LiteralKind::Float);
    assert_eq!(literal.value, "1.5");

    // `1 .0` must not fuse into a float.
    parse_source("func f() { let x = 1 .0 }").expect_err("whitespace split float");
}

#[test]
fn number_suffix_is_split() {
    let (ctx, file) = parse_source("func f() { let x = 123px }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let func = decl.function().unwrap();
    let Stmt::Expr(expr) = &func.body.stmts[0] else {
        panic!()
    };
    let ExprKind::VariableDecl { initializer, .. } = &expr.kind else {
        panic!()
    };
    let ExprKind::Literal(literal) = &initializer.as_ref().unwrap().kind else {
        panic!()
    };
    assert_eq!(literal.value, "123");
    assert_eq!(literal.suffix.as_deref(), Some("px"));
}

#[test]
fn keyword_argument_labels() {
    let (ctx, file) = parse_source("func f() { attempt(try: g(), onFail: h()) }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let func = decl.function().unwrap();
    let Stmt::Expr(expr) = &func.body.stmts[0] else {
        panic!()
    };
    let ExprKind::FunctionCall { args, .. } = &expr.kind else {
        panic!("expected call");
    };
    assert_eq!(args[0].label.node, "try");
    assert_eq!(args[1].label.node, "onFail");
}

#[test]
fn unlabeled_arguments_get_the_sentinel() {
    let (ctx, file) = parse_source("func f() { g(1, x: 2) }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let func = decl.function().unwrap();
    let Stmt::Expr(expr) = &func.body.stmts[0] else {
        panic!()
    };
    let ExprKind::FunctionCall { args, .. } = &expr.kind else {
        panic!()
    };
    assert_eq!(args[0].label.node, "_");
    assert_eq!(args[1].label.node, "x");
}

#[test]
fn constructor_kinds_and_delegation() {
    let (ctx, file) = parse_source(
        "class C : Base {\n    init() : base() {}\n    init copy(_ other: C) {}\n    init move(_ other: C) {}\n    deinit {}\n}",
    )
    .expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let DeclKind::Struct(def) = &decl.kind else {
        panic!()
    };
    assert_eq!(def.constructors.len(), 3);
    assert!(def.destructor.is_some());

    let first = ctx.decl(def.constructors[0]);
    let DeclKind::Constructor(ctor) = &first.kind else {
        panic!()
    };
    assert!(ctor.base_call.is_some());
    assert_eq!(ctor.kind, ghoul_ast::ConstructorKind::Normal);

    let second = ctx.decl(def.constructors[1]);
    let DeclKind::Constructor(copy_ctor) = &second.kind else {
        panic!()
    };
    assert_eq!(copy_ctor.kind, ghoul_ast::ConstructorKind::Copy);
}

#[test]
fn grave_quotes_keywords_as_identifiers() {
    let (ctx, file) = parse_source("func example(`class` cls: i32) {}").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let func = decl.function().unwrap();
    let param = ctx.decl(func.params[0]);
    let DeclKind::Parameter(p) = &param.kind else {
        panic!()
    };
    assert_eq!(p.label.node, "class");
}

#[test]
fn labeled_statement_with_break() {
    let (ctx, file) =
        parse_source("func f() {\n    outer: while true {\n        break outer\n    }\n}")
            .expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let func = decl.function().unwrap();
    let Stmt::Labeled(labeled) = &func.body.stmts[0] else {
        panic!("expected labeled statement");
    };
    assert_eq!(labeled.label.node, "outer");
    assert!(matches!(*labeled.stmt, Stmt::While(_)));
}

#[test]
fn switch_rejects_loose_statements() {
    let err =
        parse_source("func f() { switch x { let y = 1 } }").expect_err("loose stmt in switch");
    assert!(err.message.contains("`case` or `default`"));
}

#[test]
fn enum_with_cases() {
    let (ctx, file) =
        parse_source("enum Color : u8 {\n    case red\n    case green = 2\n}").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let DeclKind::Enum(def) = &decl.kind else {
        panic!("expected enum");
    };
    assert!(def.underlying.is_some());
    assert_eq!(def.consts.len(), 2);
    let green = ctx.decl(def.consts[1]);
    let DeclKind::EnumConst(c) = &green.kind else {
        panic!()
    };
    assert!(c.value.is_some());
}

#[test]
fn has_expression_takes_a_prototype() {
    let (ctx, file) =
        parse_source("func f() { let ok = T has func parse(_ s: i32) -> i32 }").expect("parse");
    let decl = ctx.decl(ctx.file(file).decls[0]);
    let func = decl.function().unwrap();
    let Stmt::Expr(expr) = &func.body.stmts[0] else {
        panic!()
    };
    let ExprKind::VariableDecl { initializer, .. } = &expr.kind else {
        panic!()
    };
    let ExprKind::Has { prototype, .. } = &initializer.as_ref().unwrap().kind else {
        panic!("expected has expression");
    };
    assert!(ctx.decl(*prototype).is_prototype());
}

#[test]
fn parse_round_trip_spans_cover_source() {
    // Walking decl spans must land on real source text.
    let src = "namespace n {\n    func f(_ x: i32) -> i32 { return x }\n}";
    let (ctx, file) = parse_source(src).expect("parse");
    for id in &ctx.file(file).decls {
        let span = ctx.decl(*id).span;
        assert!(span.offset() + span.len() <= src.len());
    }
}
