use ghoul_ast::{AsgContext, DeclKind};
use ghoul_mangle::{collect_symbols, mangle_files};
use ghoul_sema::{run_passes, Target};

fn compile_and_mangle(sources: &[&str]) -> AsgContext {
    let mut ctx = AsgContext::new();
    for (index, src) in sources.iter().enumerate() {
        let file = ctx.add_file(format!("file{index}.ghoul"), src.to_string());
        ghoul_parse::parse_file(&mut ctx, file).expect("parse");
    }
    run_passes(&mut ctx, &Target::host()).expect("sema");
    mangle_files(&mut ctx).expect("mangle");
    ctx
}

fn mangled_of(ctx: &AsgContext, name: &str) -> String {
    for id in ctx.decl_ids() {
        let decl = ctx.decl(id);
        if decl.name.node == name {
            if let Some(mangled) = &decl.mangled_name {
                if mangled.starts_with("_Z") {
                    return mangled.clone();
                }
            }
        }
    }
    panic!("no mangled symbol for `{name}`");
}

#[test]
fn empty_function_mangles_to_z4mainv() {
    let ctx = compile_and_mangle(&["func main() -> void {}"]);
    assert_eq!(mangled_of(&ctx, "main"), "_Z4mainv");
}

#[test]
fn argument_labels_mangle_as_vendor_qualifiers() {
    let ctx =
        compile_and_mangle(&["func add(lhs x: i32, rhs y: i32) -> i32 { return x + y }"]);
    assert_eq!(mangled_of(&ctx, "add"), "_Z3addU3lhs3i32U3rhs3i32");
}

#[test]
fn namespace_members_mangle_nested() {
    let ctx = compile_and_mangle(&[
        "namespace net { func send() {} }",
        "namespace net { func recv() {} }",
    ]);
    assert_eq!(mangled_of(&ctx, "send"), "_ZN3net4sendEv");
    assert_eq!(mangled_of(&ctx, "recv"), "_ZN3net4recvEv");
}

#[test]
fn unlabeled_parameters_use_the_sentinel() {
    let ctx = compile_and_mangle(&["func id(_ x: i32) -> i32 { return x }"]);
    assert_eq!(mangled_of(&ctx, "id"), "_Z2idU1_3i32");
}

#[test]
fn parameter_modes_mangle() {
    let ctx = compile_and_mangle(&["func take(val x: in i32, sink y: out i32) {}"]);
    assert_eq!(
        mangled_of(&ctx, "take"),
        "_Z4takeU3valU2in3i32U4sinkU3out3i32"
    );
}

#[test]
fn immut_qualifier_mangles_as_k() {
    let ctx = compile_and_mangle(&["func read(_ p: *immut u8) {}"]);
    assert_eq!(mangled_of(&ctx, "read"), "_Z4readU1_PK2u8");
}

#[test]
fn mut_qualifier_mangles_as_umut() {
    let ctx = compile_and_mangle(&["func write(_ p: *mut u8) {}"]);
    assert_eq!(mangled_of(&ctx, "write"), "_Z5writeU1_PUmut2u8");
}

#[test]
fn template_instantiation_names_carry_arguments() {
    let ctx = compile_and_mangle(&[
        "struct Box<T> { var v: T }\nfunc main() { let a: Box<i32> }",
    ]);

    // The instantiation's type name is the source name plus `I…E`.
    let inst_name = ctx
        .decl_ids()
        .find_map(|id| {
            let decl = ctx.decl(id);
            match &decl.kind {
                DeclKind::Struct(def) if def.instantiated_from.is_some() => {
                    decl.mangled_name.clone()
                }
                _ => None,
            }
        })
        .expect("instantiation is mangled");
    assert_eq!(inst_name, "3BoxI3i32E");
}

#[test]
fn struct_methods_and_vtable() {
    let ctx = compile_and_mangle(&[
        "class Shape {\n    virtual func area() -> i64 { return 0 }\n}\nfunc main() { let s: Shape }",
    ]);

    assert_eq!(mangled_of(&ctx, "area"), "_ZN5Shape4areaEv");

    let vtable = ctx
        .decl_ids()
        .find_map(|id| match &ctx.decl(id).kind {
            DeclKind::Struct(def) => def.vtable_name.clone(),
            _ => None,
        })
        .expect("vtable symbol");
    assert_eq!(vtable, "_ZTVN5ShapeE");
}

#[test]
fn constructors_and_destructors() {
    let ctx = compile_and_mangle(&[
        "struct P {\n    init(_ x: i32) {}\n    init copy(_ other: P) {}\n    init move(_ other: P) {}\n    deinit {}\n}\nfunc main() { let p: P }",
    ]);

    let mut ctors: Vec<String> = ctx
        .decl_ids()
        .filter_map(|id| {
            let decl = ctx.decl(id);
            match &decl.kind {
                DeclKind::Constructor(_) | DeclKind::Destructor(_) => decl.mangled_name.clone(),
                _ => None,
            }
        })
        .collect();
    ctors.sort();

    assert!(ctors.contains(&"_ZN1PC2EU1_3i32".to_string()));
    assert!(ctors.contains(&"_ZN1PC2ERKS_".to_string()));
    assert!(ctors.contains(&"_ZN1PC2EOS_".to_string()));
    assert!(ctors.contains(&"_ZN1PD2Ev".to_string()));
}

#[test]
fn property_accessors_mangle_with_accessor_codes() {
    let ctx = compile_and_mangle(&[
        "struct S {\n    var backing: i32\n    prop x: i32 {\n        get { return backing }\n        set {}\n    }\n}\nfunc main() { let s: S }",
    ]);

    let accessors: Vec<String> = ctx
        .decl_ids()
        .filter_map(|id| {
            let decl = ctx.decl(id);
            match &decl.kind {
                DeclKind::PropertyGet(_) | DeclKind::PropertySet(_) => decl.mangled_name.clone(),
                _ => None,
            }
        })
        .collect();

    assert!(accessors.contains(&"_ZN1S1xKpgEv".to_string()));
    assert!(accessors.contains(&"_ZN1S1xpsEU1_3i32".to_string()));
}

#[test]
fn mangling_is_deterministic() {
    let sources = &[
        "namespace a { struct S { var v: i64 } func f(_ s: S) {} }",
        "namespace a { func g() -> i32 { return 1 } }",
    ];
    let first = collect_symbols(&compile_and_mangle(sources));
    let second = collect_symbols(&compile_and_mangle(sources));
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn mangled_names_are_injective() {
    let ctx = compile_and_mangle(&[
        "namespace a { func f() {} }\nnamespace b { func f() {} }\n\
         func f() {}\nfunc f(_ x: i32) {}\n\
         struct S { func f() {} }\nfunc main() { let s: S }",
    ]);

    let symbols = collect_symbols(&ctx);
    let mut unique = symbols.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(symbols.len(), unique.len(), "duplicate symbols: {symbols:?}");
}

#[test]
fn operators_use_itanium_codes() {
    let ctx = compile_and_mangle(&[
        "struct V {\n    operator infix + (_ other: V) -> V {}\n}\nfunc main() { let v: V }",
    ]);

    let op = ctx
        .decl_ids()
        .find_map(|id| {
            let decl = ctx.decl(id);
            match &decl.kind {
                DeclKind::Operator(_) => decl.mangled_name.clone(),
                _ => None,
            }
        })
        .expect("operator is mangled");
    assert!(op.starts_with("_ZN1VplE"), "got `{op}`");
}
