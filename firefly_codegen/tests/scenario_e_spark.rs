//! Scenario E (spec §8): a `spark Rectangle { width: Int, height: Int }`
//! with a computed `area` property and a `with*` copy method. Checks the
//! derived value-type members (ctor, getters, equals/hashCode/toString),
//! the `withWidth` copy-constructor shape, and that a computed property
//! compiles its body rather than reading a stored field.

mod common;

use common::*;
use firefly_codegen::ast::{BinOp, SparkDecl};
use firefly_codegen::classfile::opcodes;

fn rectangle_spark() -> SparkDecl {
    spark_decl(
        "Rectangle",
        vec![("width".to_string(), ty_int()), ("height".to_string(), ty_int())],
        vec![computed_property(
            "area",
            ty_int(),
            vec![return_stmt(Some(binary(BinOp::Mul, field_access(self_expr(), "width"), field_access(self_expr(), "height"))))],
        )],
        None,
        false,
    )
}

#[test]
fn spark_derives_value_members_and_a_with_copy_method() {
    let u = unit("app", Vec::new(), vec![Declaration::Spark(rectangle_spark())]);
    let (classes, diagnostics) = compile(&u, oracle_with(Vec::new()));
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");

    let parsed = parse(&classes, "app/Rectangle");
    assert_eq!(parsed.super_class, "java/lang/Object");

    let ctor = parsed.method("<init>").expect("spark gets an all-args constructor");
    assert_eq!(ctor.descriptor, "(II)V");

    assert!(parsed.method("getWidth").is_some(), "fields get JavaBean getters");
    assert!(parsed.method("getHeight").is_some());
    assert!(parsed.method("equals").is_some());
    assert!(parsed.method("hashCode").is_some());
    assert!(parsed.method("toString").is_some());

    let with_width = parsed.method("withWidth").expect("each field gets a with* copy method");
    assert_eq!(with_width.descriptor, "(I)Lapp/Rectangle;", "with* returns a new instance of the same spark");
    let with_width_code = with_width.code.as_ref().expect("withWidth has a Code attribute");
    assert!(with_width_code.bytes.contains(&opcodes::NEW), "with* builds a fresh instance rather than mutating");
    assert!(with_width_code.bytes.contains(&opcodes::INVOKESPECIAL), "with* calls the all-args constructor");

    let area = parsed.method("area").expect("computed property compiles to its own method");
    assert_eq!(area.descriptor, "()I");
    let area_code = area.code.as_ref().expect("area has a Code attribute");
    assert!(area_code.bytes.contains(&opcodes::INVOKEVIRTUAL), "area reads width and height through the generated getters, not raw field access");
    assert!(area_code.bytes.contains(&opcodes::IMUL), "area multiplies the two fields");

    assert!(parsed.method("history").is_none(), "a non-travelable spark gets no history accessors");
    assert!(parsed.fields.iter().all(|f| f.name != "history"), "a non-travelable spark gets no history field");
}

#[test]
fn travelable_spark_gets_history_accessors() {
    let travelable = spark_decl("Snapshot", vec![("value".to_string(), ty_int())], Vec::new(), None, true);
    let u = unit("app", Vec::new(), vec![Declaration::Spark(travelable)]);
    let (classes, diagnostics) = compile(&u, oracle_with(Vec::new()));
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");

    let parsed = parse(&classes, "app/Snapshot");
    assert!(parsed.fields.iter().any(|f| f.name == "history"), "travelable spark carries a history field");

    let history = parsed.method("history").expect("travelable spark exposes history()");
    assert_eq!(history.descriptor, "()Ljava/util/List;");

    let previous = parsed.method("previous").expect("travelable spark exposes previous()");
    assert_eq!(previous.descriptor, "()Lapp/Snapshot;");

    let revert = parsed.method("revert").expect("travelable spark exposes revert(i)");
    assert_eq!(revert.descriptor, "(I)Lapp/Snapshot;");

    let with_value = parsed.method("withValue").expect("with* copy method still exists on a travelable spark");
    let with_value_code = with_value.code.as_ref().expect("withValue has a Code attribute");
    assert!(with_value_code.bytes.contains(&opcodes::INVOKEINTERFACE), "with* on a travelable spark updates the history list");
}

#[test]
fn derive_ord_and_json_emit_extra_members() {
    let mut decl = spark_decl("Point", vec![("x".to_string(), ty_int()), ("y".to_string(), ty_int())], Vec::new(), None, false);
    decl.annotations = vec![derive_annotation(vec!["Ord", "Json"])];
    let u = unit("app", Vec::new(), vec![Declaration::Spark(decl)]);
    let (classes, diagnostics) = compile(&u, oracle_with(Vec::new()));
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");

    let parsed = parse(&classes, "app/Point");
    let compare_to = parsed.method("compareTo").expect("@derive(Ord) adds compareTo");
    assert_eq!(compare_to.descriptor, "(Lapp/Point;)I");

    let to_json = parsed.method("toJson").expect("@derive(Json) adds toJson");
    assert_eq!(to_json.descriptor, "()Ljava/lang/String;");
}
