//! Scenario B (spec §8): a data ADT `Maybe { Some(value: Int), None }` plus
//! a `match` over it. Checks the one-subclass-per-variant layout, the
//! nullary-variant singleton, and that a `match` arm lowers to an
//! `instanceof`/`checkcast`/field-read test cascade.

mod common;

use common::*;
use firefly_codegen::ast::{DataAdtDecl, Declaration, Pattern};
use firefly_codegen::classfile::opcodes;

fn maybe_adt() -> DataAdtDecl {
    data_adt_decl("Maybe", vec![adt_variant("Some", vec![("value".to_string(), ty_int())]), adt_variant("None", Vec::new())])
}

#[test]
fn variants_compile_to_one_subclass_each_with_a_shared_abstract_base() {
    let u = unit("app", Vec::new(), vec![Declaration::DataAdt(maybe_adt())]);
    let (classes, diagnostics) = compile(&u, oracle_with(Vec::new()));
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");

    let base = parse(&classes, "app/Maybe");
    assert_eq!(base.super_class, "java/lang/Object");

    let some = parse(&classes, "app/Maybe$Some");
    assert_eq!(some.super_class, "app/Maybe");
    let ctor = some.method("<init>").expect("Some has an all-args constructor");
    assert_eq!(ctor.descriptor, "(I)V");
    assert!(some.method("equals").is_some());
    assert!(some.method("hashCode").is_some());
    assert!(some.method("toString").is_some());

    let none = parse(&classes, "app/Maybe$None");
    assert_eq!(none.super_class, "app/Maybe");
    let singleton = none.fields.iter().find(|f| f.name == "INSTANCE").expect("nullary variant gets a singleton field");
    assert_eq!(singleton.descriptor, "Lapp/Maybe$None;");
    assert!(none.method("<clinit>").is_some(), "singleton initialized in a static initializer");
}

#[test]
fn match_over_an_adt_variant_lowers_to_instanceof_checkcast_cascade() {
    let match_body = match_expr(
        ident("m"),
        vec![
            match_arm(
                Pattern::Constructor { name: "Some".to_string(), args: vec![Pattern::Variable("v".to_string(), span())], span: span() },
                None,
                ident("v"),
            ),
            match_arm(Pattern::Constructor { name: "None".to_string(), args: Vec::new(), span: span() }, None, lit_int(0)),
        ],
    );
    let describe = fn_decl("describe", true, false, vec![param("m", ty_named("Maybe"))], ty_int(), Some(block(vec![return_stmt(Some(match_body))])));
    let u = unit("app", Vec::new(), vec![Declaration::DataAdt(maybe_adt()), Declaration::Function(describe)]);

    let (classes, diagnostics) = compile(&u, oracle_with(Vec::new()));
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");

    let parsed = parse(&classes, "app/Describe");
    let method = parsed.method("describe").expect("free function compiles to a static method on its own class");
    let code = method.code.as_ref().expect("describe has a Code attribute");
    assert!(code.bytes.contains(&opcodes::INSTANCEOF), "Some arm tests the variant's runtime type");
    assert!(code.bytes.contains(&opcodes::CHECKCAST), "a matched Some arm casts down before reading its field");
    assert!(code.bytes.contains(&opcodes::GETFIELD), "Some arm reads the bound `value` field");
    assert!(code.bytes.contains(&opcodes::GETSTATIC), "None arm compares against its singleton");
}
