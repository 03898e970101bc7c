use ghoul_ast::{AsgContext, DeclKind, TypeKind};
use ghoul_sema::{run_passes, NamespacePrototyper, Target};

fn compile(sources: &[&str]) -> AsgContext {
    try_compile(sources).expect("sources should compile")
}

fn try_compile(sources: &[&str]) -> Result<AsgContext, ghoul_sema::SemaError> {
    let mut ctx = AsgContext::new();
    for (index, src) in sources.iter().enumerate() {
        let file = ctx.add_file(format!("file{index}.ghoul"), src.to_string());
        ghoul_parse::parse_file(&mut ctx, file).expect("parse");
    }
    run_passes(&mut ctx, &Target::host())?;
    Ok(ctx)
}

#[test]
fn namespace_prototypes_merge_across_files() {
    let mut ctx = AsgContext::new();
    for (index, src) in [
        "namespace net { func send() {} }",
        "namespace net { func recv() {} }",
    ]
    .iter()
    .enumerate()
    {
        let file = ctx.add_file(format!("file{index}.ghoul"), src.to_string());
        ghoul_parse::parse_file(&mut ctx, file).expect("parse");
    }

    let protos = NamespacePrototyper::generate_prototypes(&ctx);
    assert_eq!(protos.len(), 1);
    assert_eq!(protos[0].name, "net");
    assert_eq!(protos[0].members.len(), 2);

    let names: Vec<&str> = protos[0]
        .members
        .iter()
        .map(|&id| ctx.decl(id).name.node.as_str())
        .collect();
    assert_eq!(names, vec!["send", "recv"]);
}

#[test]
fn unresolved_import_is_fatal() {
    let err = try_compile(&["import does.not.exist"]).expect_err("import must fail");
    assert!(err.message.contains("unresolved import"));
}

#[test]
fn redefinition_is_fatal() {
    let err = try_compile(&["func f(_ x: i32) {}\nfunc f(_ y: i32) {}"])
        .expect_err("same signature twice");
    assert!(err.message.contains("redefinition"));
}

#[test]
fn overloads_with_different_labels_coexist() {
    compile(&["func f(lhs x: i32) {}\nfunc f(rhs x: i32) {}\nfunc main() { f(lhs: 1); f(rhs: 2) }"]);
}

#[test]
fn builtin_types_resolve() {
    let ctx = compile(&["func main() { let a: i32 = 1; let b: bool = true }"]);
    // The function body was fully processed: every expression carries a
    // value type.
    let decl = ctx.decl(ctx.file(ghoul_ast_file(&ctx, 0)).decls[0]);
    let func = decl.function().unwrap();
    for stmt in &func.body.stmts {
        if let ghoul_ast::Stmt::Expr(expr) = stmt {
            assert!(expr.value_type.is_some());
        }
    }
}

fn ghoul_ast_file(ctx: &AsgContext, index: usize) -> ghoul_ast::FileId {
    ctx.files()[index].id
}

#[test]
fn template_instantiations_deduplicate() {
    let ctx = compile(&[
        "struct Box<T> { var v: T }\n\
         func main() {\n    let a: Box<i32>\n    let b: Box<i32>\n    let c: Box<f32>\n}",
    ]);

    // Exactly two instantiations of Box: one for i32, one for f32.
    let file = ghoul_ast_file(&ctx, 0);
    let template = ctx
        .file(file)
        .decls
        .iter()
        .copied()
        .find(|&id| matches!(ctx.decl(id).kind, DeclKind::TemplateStruct(_)))
        .expect("template struct");

    let DeclKind::TemplateStruct(def) = &ctx.decl(template).kind else {
        unreachable!();
    };
    assert_eq!(def.instantiations.len(), 2);
}

#[test]
fn instantiated_struct_is_layouted() {
    let ctx = compile(&[
        "struct Pair<T> { var a: T\n var b: T }\nfunc main() { let p: Pair<i64> }",
    ]);

    let file = ghoul_ast_file(&ctx, 0);
    let template = ctx
        .file(file)
        .decls
        .iter()
        .copied()
        .find(|&id| matches!(ctx.decl(id).kind, DeclKind::TemplateStruct(_)))
        .expect("template struct");
    let DeclKind::TemplateStruct(def) = &ctx.decl(template).kind else {
        unreachable!();
    };
    let inst = def.instantiations[0];
    let DeclKind::Struct(inst_def) = &ctx.decl(inst).kind else {
        panic!("instantiation should be a struct");
    };
    let layout = inst_def.layout.as_ref().expect("layout");
    assert_eq!(layout.size, 16);
    assert_eq!(layout.align, 8);
    assert_eq!(layout.field_offsets[1].1, 8);
}

#[test]
fn where_contract_accepts_and_rejects() {
    // Vec3i inherits Vec3, so S<Vec3i> satisfies `where T : Vec3`.
    compile(&[
        "struct Vec3 {}\nstruct Vec3i : Vec3 {}\n\
         struct S<T> where T : Vec3 { var v: i32 }\n\
         func main() { let x: S<Vec3i> }",
    ]);

    // i32 does not, and the failure names the contract.
    let err = try_compile(&[
        "struct Vec3 {}\n\
         struct S<T> where T : Vec3 { var v: i32 }\n\
         func main() { let y: S<i32> }",
    ])
    .expect_err("contract must reject i32");
    assert!(err.message.contains("where"), "got: {}", err.message);
}

#[test]
fn struct_layout_with_inheritance_appends_base_first() {
    let ctx = compile(&[
        "struct Base { var a: i64 }\nstruct Derived : Base { var b: i32 }\nfunc main() { let d: Derived }",
    ]);

    let file = ghoul_ast_file(&ctx, 0);
    let derived = ctx
        .file(file)
        .decls
        .iter()
        .copied()
        .find(|&id| ctx.decl(id).name.node == "Derived")
        .expect("Derived");
    let DeclKind::Struct(def) = &ctx.decl(derived).kind else {
        panic!();
    };
    let layout = def.layout.as_ref().expect("layout");
    // The base occupies the first 8 bytes.
    assert_eq!(layout.field_offsets[0].1, 8);
    assert_eq!(layout.size, 16);
}

#[test]
fn union_fields_overlap() {
    let ctx = compile(&["union U { var a: i64\n var b: i32 }\nfunc main() { let u: U }"]);

    let file = ghoul_ast_file(&ctx, 0);
    let union_decl = ctx
        .file(file)
        .decls
        .iter()
        .copied()
        .find(|&id| ctx.decl(id).name.node == "U")
        .expect("U");
    let DeclKind::Struct(def) = &ctx.decl(union_decl).kind else {
        panic!();
    };
    let layout = def.layout.as_ref().expect("layout");
    assert!(layout.field_offsets.iter().all(|(_, offset)| *offset == 0));
    assert_eq!(layout.size, 8);
}

#[test]
fn cyclic_layout_reports_the_cycle() {
    let err = try_compile(&["struct A { var b: B }\nstruct B { var a: A }"])
        .expect_err("cyclic layout");
    assert!(err.message.contains("cyclic"), "got: {}", err.message);
}

#[test]
fn virtual_methods_build_a_vtable() {
    let ctx = compile(&[
        "class Base {\n    virtual func f() {}\n    virtual func g() {}\n}\n\
         class Derived : Base {\n    override func f() {}\n}\n\
         func main() { let d: Derived }",
    ]);

    let file = ghoul_ast_file(&ctx, 0);
    let derived = ctx
        .file(file)
        .decls
        .iter()
        .copied()
        .find(|&id| ctx.decl(id).name.node == "Derived")
        .expect("Derived");
    let DeclKind::Struct(def) = &ctx.decl(derived).kind else {
        panic!();
    };
    // Two slots inherited; the override replaced slot 0 in place.
    assert_eq!(def.vtable.len(), 2);
    let slot0_container = ctx.decl(def.vtable[0]).container.unwrap();
    assert_eq!(ctx.decl(slot0_container).name.node, "Derived");
    let slot1_container = ctx.decl(def.vtable[1]).container.unwrap();
    assert_eq!(ctx.decl(slot1_container).name.node, "Base");
}

#[test]
fn override_without_base_virtual_is_fatal() {
    let err = try_compile(&["class C {\n    override func f() {}\n}\nfunc main() { let c: C }"])
        .expect_err("override without base");
    assert!(err.message.contains("override"));
}

#[test]
fn break_label_must_name_enclosing_loop() {
    let err = try_compile(&["func f() {\n    while true {\n        break missing\n    }\n}"])
        .expect_err("unknown label");
    assert!(err.message.contains("break missing"));

    compile(&["func f() {\n    outer: while true {\n        break outer\n    }\n}"]);
}

#[test]
fn goto_needs_a_matching_label() {
    let err = try_compile(&["func f() {\n    goto nowhere\n}"]).expect_err("unknown goto");
    assert!(err.message.contains("goto"));

    compile(&["func f() {\n    target: while true {\n        break\n    }\n    goto target\n}"]);
}

#[test]
fn switch_case_must_not_fall_through() {
    let err = try_compile(&[
        "func f(_ x: i32) {\n    switch x {\n        case 1:\n            let a = 1\n        case 2:\n            break\n    }\n}",
    ])
    .expect_err("implicit fallthrough");
    assert!(err.message.contains("fallthrough"));

    compile(&[
        "func f(_ x: i32) {\n    switch x {\n        case 1:\n            fallthrough\n        case 2:\n            break\n    }\n}",
    ]);
}

#[test]
fn try_requires_throws_or_catch() {
    let err = try_compile(&[
        "func g() -> i32 throws { return 1 }\nfunc f() -> i32 { return try g() }",
    ])
    .expect_err("try without throws");
    assert!(err.message.contains("try"));

    compile(&["func g() -> i32 throws { return 1 }\nfunc f() -> i32 throws { return try g() }"]);
    compile(&[
        "func g() -> i32 throws { return 1 }\nfunc f() {\n    do {\n        let x = try g()\n    } catch {\n    }\n}",
    ]);
}

#[test]
fn return_type_must_match() {
    let err =
        try_compile(&["func f() -> i32 { return true }"]).expect_err("bool is not i32");
    assert!(err.message.contains("convert"));
}

#[test]
fn widening_is_implicit_narrowing_is_not() {
    compile(&["func wide(_ x: i64) {}\nfunc main() { let a: i32 = 1; wide(a) }"]);

    let err = try_compile(&["func narrow(_ x: i32) {}\nfunc main() { let a: i64 = 1; narrow(a) }"])
        .expect_err("narrowing requires `as`");
    assert!(err.message.contains("no matching function"));
}

#[test]
fn ambiguous_overload_is_fatal() {
    let err = try_compile(&[
        "func f(_ x: i64) {}\nfunc f(_ x: f64) {}\nfunc main() { let a: i32 = 1; f(a) }",
    ])
    .expect_err("two widening candidates");
    assert!(err.message.contains("ambiguous"));
}

#[test]
fn resolution_is_idempotent() {
    // Running the resolver twice over an already-resolved tree leaves it
    // unchanged (pass E idempotence).
    let mut ctx = AsgContext::new();
    let file = ctx.add_file(
        "main.ghoul".to_string(),
        "struct P { var x: i32 }\nfunc main() { let p: P }".to_string(),
    );
    ghoul_parse::parse_file(&mut ctx, file).expect("parse");

    let protos = NamespacePrototyper::generate_prototypes(&ctx);
    {
        let mut validator = ghoul_sema::BasicDeclValidator::new(&mut ctx, &protos);
        validator.validate_file(file).expect("validate");
    }
    {
        let mut resolver = ghoul_sema::BasicTypeResolver::new(&mut ctx, &protos);
        resolver.resolve_file(file).expect("first resolution");
    }

    let snapshot: Vec<String> = ctx
        .decl_ids()
        .map(|id| format!("{:?}", ctx.decl(id)))
        .collect();

    {
        let mut resolver = ghoul_sema::BasicTypeResolver::new(&mut ctx, &protos);
        resolver.resolve_file(file).expect("second resolution");
    }

    let after: Vec<String> = ctx
        .decl_ids()
        .map(|id| format!("{:?}", ctx.decl(id)))
        .collect();
    assert_eq!(snapshot, after);
}

#[test]
fn template_functions_instantiate_on_first_reference() {
    let ctx = compile(&[
        "func identity<T>(_ x: T) -> T { return x }\nfunc main() { let a = identity<i32>(1) }",
    ]);

    let file = ghoul_ast_file(&ctx, 0);
    let template = ctx
        .file(file)
        .decls
        .iter()
        .copied()
        .find(|&id| matches!(ctx.decl(id).kind, DeclKind::TemplateFunction(_)))
        .expect("template function");
    let DeclKind::TemplateFunction(def) = &ctx.decl(template).kind else {
        unreachable!();
    };
    assert_eq!(def.instantiations.len(), 1);

    let inst = ctx.decl(def.instantiations[0]);
    let func = inst.function().expect("function payload");
    let return_type = func.return_type.as_ref().expect("return type");
    assert!(matches!(
        return_type.kind,
        TypeKind::BuiltIn(ghoul_ast::BuiltInKind::I32)
    ));
}

#[test]
fn specialization_prefers_the_closest_constraint() {
    // Both templates match Vec3i; the tighter constraint (distance 1 via
    // Vec3 vs distance 2 via Object) must win without ambiguity.
    compile(&[
        "struct Object {}\nstruct Vec3 : Object {}\nstruct Vec3i : Vec3 {}\n\
         struct S<T> where T : Object { var tag: i32 }\n\
         struct S<T> where T : Vec3 { var tag: i64 }\n\
         func main() { let s: S<Vec3i> }",
    ]);
}
