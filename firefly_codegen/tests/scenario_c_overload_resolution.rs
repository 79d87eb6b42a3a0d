//! Scenario C (spec §8): a call against a reflected class with multiple
//! overloads picks the identity match over a boxing match, per the
//! conversion ranking in `resolve::method_resolver`.

mod common;

use common::*;
use firefly_codegen::classfile::opcodes;

fn string_value_of_oracle() -> firefly_codegen::resolve::class_resolver::FixtureOracle {
    oracle_with(vec![reflected_class(
        "java.lang.String",
        "java/lang/String",
        vec![
            reflected_method("valueOf", true, vec!["I"], "Ljava/lang/String;", "java/lang/String"),
            reflected_method("valueOf", true, vec!["Ljava/lang/Object;"], "Ljava/lang/String;", "java/lang/String"),
        ],
        Vec::new(),
    )])
}

#[test]
fn int_argument_picks_the_identity_overload_over_the_boxing_one() {
    let pick = fn_decl(
        "pick",
        true,
        false,
        vec![param("x", ty_int())],
        ty_string(),
        Some(block(vec![return_stmt(Some(method_call(ident("String"), "valueOf", vec![ident("x")])))])),
    );
    let u = unit("app", Vec::new(), vec![Declaration::Function(pick)]);

    let (classes, diagnostics) = compile(&u, string_value_of_oracle());
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");

    let parsed = parse(&classes, "app/Pick");
    let method = parsed.method("pick").expect("free function compiles to a static method on its own class");
    let code = method.code.as_ref().expect("pick has a Code attribute");

    let invoked = parsed.first_member_ref(&code.bytes, opcodes::INVOKESTATIC).expect("pick invokes a static method");
    assert_eq!(invoked.owner, "java/lang/String");
    assert_eq!(invoked.name, "valueOf");
    assert_eq!(invoked.descriptor, "(I)Ljava/lang/String;", "the identity-matching int overload should win over the boxing Object overload");
}

#[test]
fn no_applicable_overload_is_reported_as_a_diagnostic_not_a_panic() {
    let pick = fn_decl(
        "pick",
        true,
        false,
        vec![param("flag", ty_bool())],
        ty_string(),
        Some(block(vec![return_stmt(Some(method_call(ident("String"), "missingOverload", vec![ident("flag")])))])),
    );
    let u = unit("app", Vec::new(), vec![Declaration::Function(pick)]);

    let (classes, diagnostics) = compile(&u, string_value_of_oracle());
    assert!(!diagnostics.is_empty(), "calling a method the oracle never declared must fail gracefully as a diagnostic");
    assert!(classes.get("app/Pick").is_none(), "a declaration that failed to emit contributes no class file");
}
