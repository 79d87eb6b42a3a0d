//! A struct declared inside a class must still show up in the returned
//! `ClassFileSet`, named with the `Outer$Inner` dollar join (spec §4.3).

mod common;

use common::*;

#[test]
fn struct_nested_inside_a_class_emits_as_outer_dollar_inner() {
    let point = struct_decl("Point", vec![("x".to_string(), ty_int()), ("y".to_string(), ty_int())]);
    let outer = class_decl("Plotter", Vec::new(), vec![Declaration::Struct(point)]);
    let u = unit("app", Vec::new(), vec![Declaration::Class(outer)]);

    let (classes, diagnostics) = compile(&u, oracle_with(Vec::new()));
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");

    let outer_class = parse(&classes, "app/Plotter");
    assert_eq!(outer_class.super_class, "java/lang/Object");

    let nested = parse(&classes, "app/Plotter$Point");
    let ctor = nested.method("<init>").expect("nested struct still gets its all-args constructor");
    assert_eq!(ctor.descriptor, "(II)V");
}
