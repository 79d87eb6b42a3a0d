//! Scenario A (spec §8): `module app; class Main { fly(args: String[]) ->
//! Unit { println("hi") } }` — the entry-point convention plus a reflected
//! instance call through a static field (`System.out.println`).

mod common;

use common::*;
use firefly_codegen::classfile::opcodes;

fn system_out_oracle() -> firefly_codegen::resolve::class_resolver::FixtureOracle {
    oracle_with(vec![
        reflected_class(
            "java.lang.System",
            "java/lang/System",
            Vec::new(),
            vec![reflected_field("out", "Ljava/io/PrintStream;", true)],
        ),
        reflected_class(
            "java.io.PrintStream",
            "java/io/PrintStream",
            vec![reflected_method("println", false, vec!["Ljava/lang/String;"], "V", "java/io/PrintStream")],
            Vec::new(),
        ),
    ])
}

#[test]
fn hello_world_emits_fly_method_and_synthesized_main() {
    let fly_body = block(vec![expr_stmt(method_call(static_field("System", "out"), "println", vec![lit_string("hi")]))]);
    let fly = fn_decl("fly", false, false, vec![param("args", ty_string_array())], ty_void(), Some(fly_body));
    let main_class = class_decl("Main", vec![fly], Vec::new());
    let u = unit("app", Vec::new(), vec![Declaration::Class(main_class)]);

    let (classes, diagnostics) = compile(&u, system_out_oracle());
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");

    let parsed = parse(&classes, "app/Main");
    assert_eq!(parsed.this_class, "app/Main");
    assert_eq!(parsed.super_class, "java/lang/Object");

    let fly_method = parsed.method("fly").expect("fly instance method emitted");
    assert_eq!(fly_method.descriptor, "([Ljava/lang/String;)V");
    assert!(!is_static_method(fly_method.access_flags));
    let fly_code = fly_method.code.as_ref().expect("fly has a Code attribute");
    assert!(
        fly_code.bytes.contains(&opcodes::GETSTATIC) && fly_code.bytes.contains(&opcodes::INVOKEVIRTUAL),
        "fly body should read System.out then invoke println on it"
    );

    let main_method = parsed.method("main").expect("entry class gets a synthesized static main");
    assert_eq!(main_method.descriptor, "([Ljava/lang/String;)V");
    assert!(is_static_method(main_method.access_flags));
    let main_code = main_method.code.as_ref().expect("main has a Code attribute");
    assert_eq!(main_code.bytes.first().copied(), Some(opcodes::NEW), "main starts by allocating an instance of the class");
    assert!(main_code.bytes.contains(&opcodes::INVOKESPECIAL), "main calls the default constructor");
    assert!(main_code.bytes.contains(&opcodes::INVOKEVIRTUAL), "main invokes fly on the new instance");
    assert!(main_code.bytes.contains(&opcodes::INVOKESTATIC), "main calls System.exit to terminate");
    assert_eq!(main_code.bytes.last().copied(), Some(opcodes::RETURN));
}

#[test]
fn class_without_a_fly_method_gets_no_synthesized_main() {
    let helper = fn_decl("helper", false, false, Vec::new(), ty_void(), Some(block(Vec::new())));
    let plain_class = class_decl("Plain", vec![helper], Vec::new());
    let u = unit("app", Vec::new(), vec![Declaration::Class(plain_class)]);

    let (classes, diagnostics) = compile(&u, oracle_with(Vec::new()));
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");

    let parsed = parse(&classes, "app/Plain");
    assert!(parsed.method("main").is_none());
}
