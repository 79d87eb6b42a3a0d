//! Scenario D (spec §8): an `async` method wraps its body in
//! `Future.async(() -> body, ForkJoinPool.commonPool())`, and `.await`
//! on a call to it unwraps via `Future.get`.

mod common;

use common::*;
use firefly_codegen::classfile::opcodes;
use firefly_codegen::classfile::writer::ACC_SYNTHETIC;

#[test]
fn async_method_wraps_body_and_await_calls_future_get() {
    let compute = fn_decl(
        "compute",
        true,
        true,
        vec![param("n", ty_int())],
        ty_int(),
        Some(block(vec![expr_stmt(ident("n"))])),
    );
    let run = fn_decl(
        "run",
        true,
        false,
        Vec::new(),
        ty_int(),
        Some(block(vec![
            let_stmt(pat_var("result"), None, await_expr(call(ident("compute"), vec![lit_int(5)]))),
            return_stmt(Some(ident("result"))),
        ])),
    );
    let async_class = class_decl("Async", vec![compute, run], Vec::new());
    let u = unit("app", Vec::new(), vec![Declaration::Class(async_class)]);

    let (classes, diagnostics) = compile(&u, oracle_with(Vec::new()));
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");

    let parsed = parse(&classes, "app/Async");

    let compute_method = parsed.method("compute").expect("async method emitted");
    assert_eq!(compute_method.descriptor, "(I)Lcom/firefly/runtime/async/Future;", "async methods return a Future regardless of their declared surface type");
    let compute_code = compute_method.code.as_ref().expect("compute has a Code attribute");
    assert!(compute_code.bytes.contains(&opcodes::INVOKEDYNAMIC), "the wrapped body is lifted into a capturing Callable");
    assert!(compute_code.bytes.contains(&opcodes::INVOKESTATIC), "compute calls ForkJoinPool.commonPool and Future.async");

    let synthetic = parsed
        .methods
        .iter()
        .find(|m| m.name.starts_with("lambda$"))
        .expect("the async body is compiled into its own synthetic static method");
    assert!(synthetic.access_flags & ACC_SYNTHETIC != 0);

    let run_method = parsed.method("run").expect("run method emitted");
    let run_code = run_method.code.as_ref().expect("run has a Code attribute");
    assert!(run_code.bytes.contains(&opcodes::INVOKESTATIC), "run calls compute as an ordinary same-class static call");
    assert!(run_code.bytes.contains(&opcodes::INVOKEVIRTUAL), "run awaits the Future via Future.get");
    assert!(run_code.bytes.contains(&opcodes::ASTORE) || run_code.bytes.contains(&opcodes::ASTORE_0), "the awaited value is stored as a reference local, not an int");
}
