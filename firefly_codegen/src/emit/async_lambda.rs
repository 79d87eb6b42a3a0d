//! C8 — lambda and async/concurrency lowering (spec §4.6).
//!
//! A lambda literal closes over whatever locals it references and compiles
//! to a synthetic static method plus an `invokedynamic` call site bound
//! through `LambdaMetafactory`, exactly like `javac`'s desugaring of Java
//! lambdas. `async fn`/`async` methods are split the same way: the body
//! becomes a synthetic helper, and the declared method wraps the helper in
//! `Future.async`. Because a `MethodBuilder` holds the only mutable borrow
//! of the class file being built, neither can be compiled in place while
//! the enclosing method's body is still being lowered — both are queued on
//! [`crate::emit::ClassContext::pending_methods`] and compiled afterward by
//! [`flush_pending_methods`].

use crate::ast::{Block, Expr, Stmt};
use crate::classfile::writer::ClassFile;
use crate::emit::{expr, stmt, CapturedLocal, ClassContext, EmitError, MethodContext, PendingSyntheticMethod, SyntheticMethodKind};
use crate::types::{OpcodeFamily, VarType};
use firefly_runtime_abi::symbols;

pub fn lower_lambda(
    params: &[String],
    body: &Expr,
    span: crate::span::Span,
    mb: &mut crate::classfile::writer::MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    if params.len() > 2 {
        return Err(EmitError::Unsupported {
            message: format!("lambdas with more than 2 parameters are not supported (got {})", params.len()),
            span,
        });
    }

    let mut bound = params.iter().cloned().collect::<std::collections::HashSet<_>>();
    let mut free = Vec::new();
    collect_free_vars_expr(body, &mut bound, &mut free);

    let mut captures: Vec<CapturedLocal> = Vec::new();
    for name in &free {
        if let Some(local) = mc.lookup(name) {
            captures.push(CapturedLocal { name: name.clone(), var_type: local.var_type, slot: local.slot });
        }
    }

    for capture in &captures {
        mb.emit_load(capture.var_type.opcode_family(), capture.slot);
        mc.last_type = capture.var_type;
        expr::box_current(mb, mc);
    }

    let (sam_owner, sam_name, sam_descriptor) = functional_interface_for_arity(params.len());
    let synthetic_name = format!("lambda${}", cc.pending_methods.len());
    let impl_descriptor = object_descriptor_for_arity(captures.len() + params.len());
    let instantiated_descriptor = object_descriptor_for_arity(captures.len()).replace(")Ljava/lang/Object;", &format!(")L{sam_owner};"));

    mb.emit_invokedynamic_lambda(sam_name, sam_descriptor, &cc.internal_name, &synthetic_name, &impl_descriptor, &instantiated_descriptor);

    cc.pending_methods.push(PendingSyntheticMethod {
        name: synthetic_name,
        descriptor: impl_descriptor,
        kind: SyntheticMethodKind::Lambda {
            captures,
            params: params.to_vec(),
            body: body.clone(),
        },
    });

    mc.last_type = VarType::Object;
    mc.last_declared_class = None;
    Ok(())
}

/// `timeout(millis) { body }`: lowers to `Future.timeout(millis, () -> body)`.
/// The body closes over the enclosing method's locals exactly like a lambda.
pub fn lower_timeout(
    millis: &Expr,
    body: &Block,
    span: crate::span::Span,
    mb: &mut crate::classfile::writer::MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    expr::lower_expr(millis, mb, mc, cc)?;
    if mc.last_type != VarType::Long {
        expr::widen_numeric(mb, mc, VarType::Long);
    }

    let mut bound = std::collections::HashSet::new();
    let mut free = Vec::new();
    collect_free_vars_block(body, &mut bound, &mut free);
    let mut captures: Vec<CapturedLocal> = Vec::new();
    for name in &free {
        if let Some(local) = mc.lookup(name) {
            captures.push(CapturedLocal { name: name.clone(), var_type: local.var_type, slot: local.slot });
        }
    }
    for capture in &captures {
        mb.emit_load(capture.var_type.opcode_family(), capture.slot);
        mc.last_type = capture.var_type;
        expr::box_current(mb, mc);
    }

    let synthetic_name = format!("lambda${}", cc.pending_methods.len());
    let impl_descriptor = object_descriptor_for_arity(captures.len());
    let instantiated_descriptor = impl_descriptor.replace(")Ljava/lang/Object;", ")Ljava/util/concurrent/Callable;");

    mb.emit_invokedynamic_lambda(
        "call",
        "()Ljava/lang/Object;",
        &cc.internal_name,
        &synthetic_name,
        &impl_descriptor,
        &instantiated_descriptor,
    );

    cc.pending_methods.push(PendingSyntheticMethod {
        name: synthetic_name,
        descriptor: impl_descriptor,
        kind: SyntheticMethodKind::Lambda {
            captures,
            params: Vec::new(),
            body: Expr::Block(body.clone(), span),
        },
    });

    mb.emit_invokestatic(symbols::FUTURE_TIMEOUT.owner, symbols::FUTURE_TIMEOUT.name, symbols::FUTURE_TIMEOUT.descriptor);
    mc.last_type = VarType::Object;
    mc.last_declared_class = Some("com.firefly.runtime.async.Future".to_string());
    Ok(())
}

/// `concurrent { a = expr1; b = expr2; ... }`: every binding's initializer
/// is spilled into a `Future.async` call up front (evaluated exactly once),
/// the futures are blocked on together via `Future.all(...).get()`, and only
/// then is each binding's future unwrapped with its own `.get()` — so each
/// name is bound to the initializer's *value*, not the raw `Future`.
pub fn lower_concurrent(
    bindings: &[(String, Expr)],
    span: crate::span::Span,
    mb: &mut crate::classfile::writer::MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    let mut future_slots = Vec::new();
    for (name, init) in bindings {
        let mut bound = std::collections::HashSet::new();
        let mut free = Vec::new();
        collect_free_vars_expr(init, &mut bound, &mut free);
        let mut captures: Vec<CapturedLocal> = Vec::new();
        for captured_name in &free {
            if let Some(local) = mc.lookup(captured_name) {
                captures.push(CapturedLocal { name: captured_name.clone(), var_type: local.var_type, slot: local.slot });
            }
        }
        for capture in &captures {
            mb.emit_load(capture.var_type.opcode_family(), capture.slot);
            mc.last_type = capture.var_type;
            expr::box_current(mb, mc);
        }

        let synthetic_name = format!("lambda${}", cc.pending_methods.len());
        let impl_descriptor = object_descriptor_for_arity(captures.len());
        let instantiated_descriptor = impl_descriptor.replace(")Ljava/lang/Object;", ")Ljava/util/concurrent/Callable;");
        mb.emit_invokedynamic_lambda(
            "call",
            "()Ljava/lang/Object;",
            &cc.internal_name,
            &synthetic_name,
            &impl_descriptor,
            &instantiated_descriptor,
        );
        cc.pending_methods.push(PendingSyntheticMethod {
            name: synthetic_name,
            descriptor: impl_descriptor,
            kind: SyntheticMethodKind::Lambda { captures, params: Vec::new(), body: init.clone() },
        });

        mb.emit_invokestatic(
            symbols::jdk::FORK_JOIN_POOL_COMMON_POOL.owner,
            symbols::jdk::FORK_JOIN_POOL_COMMON_POOL.name,
            symbols::jdk::FORK_JOIN_POOL_COMMON_POOL.descriptor,
        );
        mb.emit_invokestatic(
            symbols::FUTURE_ASYNC_CALLABLE.owner,
            symbols::FUTURE_ASYNC_CALLABLE.name,
            symbols::FUTURE_ASYNC_CALLABLE.descriptor,
        );

        let future_slot = mc.alloc_temp(VarType::Object);
        mb.emit_store(OpcodeFamily::Reference, future_slot);
        future_slots.push((name.clone(), future_slot));
    }

    mb.emit_iconst(future_slots.len() as i32);
    mb.emit_anewarray(symbols::FUTURE);
    for (i, (_, slot)) in future_slots.iter().enumerate() {
        mb.emit_dup();
        mb.emit_iconst(i as i32);
        mb.emit_load(OpcodeFamily::Reference, *slot);
        mb.emit_aastore();
    }
    mb.emit_invokestatic(symbols::FUTURE_ALL.owner, symbols::FUTURE_ALL.name, symbols::FUTURE_ALL.descriptor);
    mb.emit_invokevirtual(symbols::FUTURE_GET.owner, symbols::FUTURE_GET.name, symbols::FUTURE_GET.descriptor);
    mb.emit_pop();

    let mut bound_slots = Vec::new();
    for (name, future_slot) in &future_slots {
        mb.emit_load(OpcodeFamily::Reference, *future_slot);
        mb.emit_invokevirtual(symbols::FUTURE_GET.owner, symbols::FUTURE_GET.name, symbols::FUTURE_GET.descriptor);
        let bound_slot = mc.declare_local(name.clone(), VarType::Object, None);
        mb.emit_store(OpcodeFamily::Reference, bound_slot);
        bound_slots.push(bound_slot);
    }

    // The block's own value is the last binding's unwrapped value, matching
    // how `lower_block_expr` treats a trailing non-expression statement.
    if let Some(&last) = bound_slots.last() {
        mb.emit_load(OpcodeFamily::Reference, last);
    } else {
        mb.emit_aconst_null();
    }
    mc.last_type = VarType::Object;
    mc.last_declared_class = None;
    let _ = span;
    Ok(())
}

/// Wrap an `async fn`/`async` method's body as `Future.async(() -> body, ForkJoinPool.commonPool())`,
/// the same capture-as-zero-arg-`Callable` shape `lower_timeout` uses for
/// its body argument (spec §4.6: "an `async` declaration's body runs
/// exactly like a `timeout`/`concurrent` block's initializer, minus the
/// deadline/fan-out wrapper"). Called by `decl.rs` once per `async`
/// function or method, in place of lowering the body straight into the
/// declared method.
pub fn lower_async_wrapper(
    body: &Block,
    span: crate::span::Span,
    mb: &mut crate::classfile::writer::MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    let mut bound = std::collections::HashSet::new();
    let mut free = Vec::new();
    collect_free_vars_block(body, &mut bound, &mut free);
    let mut captures: Vec<CapturedLocal> = Vec::new();
    for name in &free {
        if let Some(local) = mc.lookup(name) {
            captures.push(CapturedLocal { name: name.clone(), var_type: local.var_type, slot: local.slot });
        }
    }
    for capture in &captures {
        mb.emit_load(capture.var_type.opcode_family(), capture.slot);
        mc.last_type = capture.var_type;
        expr::box_current(mb, mc);
    }

    let synthetic_name = format!("lambda${}", cc.pending_methods.len());
    let impl_descriptor = object_descriptor_for_arity(captures.len());
    let instantiated_descriptor = impl_descriptor.replace(")Ljava/lang/Object;", ")Ljava/util/concurrent/Callable;");
    mb.emit_invokedynamic_lambda(
        "call",
        "()Ljava/lang/Object;",
        &cc.internal_name,
        &synthetic_name,
        &impl_descriptor,
        &instantiated_descriptor,
    );
    cc.pending_methods.push(PendingSyntheticMethod {
        name: synthetic_name,
        descriptor: impl_descriptor,
        kind: SyntheticMethodKind::Lambda { captures, params: Vec::new(), body: Expr::Block(body.clone(), span) },
    });

    mb.emit_invokestatic(
        symbols::jdk::FORK_JOIN_POOL_COMMON_POOL.owner,
        symbols::jdk::FORK_JOIN_POOL_COMMON_POOL.name,
        symbols::jdk::FORK_JOIN_POOL_COMMON_POOL.descriptor,
    );
    mb.emit_invokestatic(symbols::FUTURE_ASYNC_CALLABLE.owner, symbols::FUTURE_ASYNC_CALLABLE.name, symbols::FUTURE_ASYNC_CALLABLE.descriptor);
    mc.last_type = VarType::Object;
    mc.last_declared_class = Some("com.firefly.runtime.async.Future".to_string());
    Ok(())
}

/// `race(f1, f2, ...)`: lowers to `Future.any(new Future[]{...})`.
pub fn lower_race(
    futures: &[Expr],
    span: crate::span::Span,
    mb: &mut crate::classfile::writer::MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    mb.emit_iconst(futures.len() as i32);
    mb.emit_anewarray(symbols::FUTURE);
    for (i, f) in futures.iter().enumerate() {
        mb.emit_dup();
        mb.emit_iconst(i as i32);
        expr::lower_expr(f, mb, mc, cc)?;
        mb.emit_aastore();
    }
    mb.emit_invokestatic(symbols::FUTURE_ANY.owner, symbols::FUTURE_ANY.name, symbols::FUTURE_ANY.descriptor);
    mc.last_type = VarType::Object;
    mc.last_declared_class = Some("com.firefly.runtime.async.Future".to_string());
    let _ = span;
    Ok(())
}

/// Compile every queued lambda/async-helper body into a real synthetic
/// static method on `class`, draining recursively since a lambda's own
/// body may itself contain nested lambdas that enqueue further work.
pub fn flush_pending_methods(class: &mut ClassFile, cc: &mut ClassContext) -> Result<(), EmitError> {
    while let Some(pending) = cc.pending_methods.pop() {
        match pending.kind {
            SyntheticMethodKind::Lambda { captures, params, body } => {
                let mut mb = class.new_method(
                    crate::classfile::writer::ACC_PUBLIC | crate::classfile::writer::ACC_STATIC | crate::classfile::writer::ACC_SYNTHETIC,
                    pending.name.clone(),
                    pending.descriptor.clone(),
                );
                let mut method_mc = MethodContext::new(0);
                let mut slot = 0u16;
                for capture in &captures {
                    method_mc.bind_param(capture.name.clone(), slot, VarType::Object, None);
                    slot += 1;
                }
                for param in &params {
                    method_mc.bind_param(param.clone(), slot, VarType::Object, None);
                    slot += 1;
                }
                expr::lower_expr(&body, &mut mb, &mut method_mc, cc)?;
                if method_mc.code_reachable {
                    expr::box_current(&mut mb, &mut method_mc);
                    mb.emit_return(Some(OpcodeFamily::Reference));
                }
                mb.note_max_locals(method_mc.max_locals_watermark());
                mb.finish();
            }
            SyntheticMethodKind::AsyncBody { captures, params, body, return_var_type } => {
                let mut mb = class.new_method(
                    crate::classfile::writer::ACC_PUBLIC | crate::classfile::writer::ACC_STATIC | crate::classfile::writer::ACC_SYNTHETIC,
                    pending.name.clone(),
                    pending.descriptor.clone(),
                );
                let mut method_mc = MethodContext::new(0);
                method_mc.set_return_descriptor(return_var_type.descriptor());
                let mut slot = 0u16;
                for capture in &captures {
                    method_mc.bind_param(capture.name.clone(), slot, capture.var_type, None);
                    slot += capture.var_type.slot_size();
                }
                for (name, var_type) in &params {
                    method_mc.bind_param(name.clone(), slot, *var_type, None);
                    slot += var_type.slot_size();
                }
                stmt::lower_block(&body, &mut mb, &mut method_mc, cc)?;
                if method_mc.code_reachable {
                    mb.emit_return(None);
                }
                mb.note_max_locals(method_mc.max_locals_watermark());
                mb.finish();
            }
        }
    }
    Ok(())
}

fn functional_interface_for_arity(arity: usize) -> (&'static str, &'static str, &'static str) {
    match arity {
        0 => ("java/util/function/Supplier", "get", "()Ljava/lang/Object;"),
        1 => ("java/util/function/Function", "apply", "(Ljava/lang/Object;)Ljava/lang/Object;"),
        _ => ("java/util/function/BiFunction", "apply", "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;"),
    }
}

fn object_descriptor_for_arity(arity: usize) -> String {
    let params = "Ljava/lang/Object;".repeat(arity);
    format!("({params})Ljava/lang/Object;")
}

fn collect_free_vars_expr(expr: &Expr, bound: &mut std::collections::HashSet<String>, free: &mut Vec<String>) {
    match expr {
        Expr::Literal(..) | Expr::SelfExpr(_) => {}
        Expr::Ident(name, _) => {
            if !bound.contains(name) && !free.contains(name) {
                free.push(name.clone());
            }
        }
        Expr::Binary { lhs, rhs, .. } => {
            collect_free_vars_expr(lhs, bound, free);
            collect_free_vars_expr(rhs, bound, free);
        }
        Expr::Unary { operand, .. } => collect_free_vars_expr(operand, bound, free),
        Expr::SafeNav { receiver, access, .. } => {
            collect_free_vars_expr(receiver, bound, free);
            collect_free_vars_expr(access, bound, free);
        }
        Expr::Call { callee, args, .. } => {
            collect_free_vars_expr(callee, bound, free);
            for a in args {
                collect_free_vars_expr(a, bound, free);
            }
        }
        Expr::MethodCall { receiver, args, .. } => {
            collect_free_vars_expr(receiver, bound, free);
            for a in args {
                collect_free_vars_expr(a, bound, free);
            }
        }
        Expr::FieldAccess { receiver, .. } => collect_free_vars_expr(receiver, bound, free),
        Expr::StaticFieldAccess { .. } => {}
        Expr::Index { receiver, index, .. } => {
            collect_free_vars_expr(receiver, bound, free);
            collect_free_vars_expr(index, bound, free);
        }
        Expr::Tuple(elems, _) | Expr::ArrayLiteral(elems, _) => {
            for e in elems {
                collect_free_vars_expr(e, bound, free);
            }
        }
        Expr::TupleIndex { receiver, .. } => collect_free_vars_expr(receiver, bound, free),
        Expr::StructLiteral { fields, .. } => {
            for (_, v) in fields {
                collect_free_vars_expr(v, bound, free);
            }
        }
        Expr::MapLiteral(entries, _) => {
            for (k, v) in entries {
                collect_free_vars_expr(k, bound, free);
                collect_free_vars_expr(v, bound, free);
            }
        }
        Expr::If { cond, then_branch, else_branch, .. } => {
            collect_free_vars_expr(cond, bound, free);
            collect_free_vars_expr(then_branch, bound, free);
            if let Some(e) = else_branch {
                collect_free_vars_expr(e, bound, free);
            }
        }
        Expr::Match { scrutinee, arms, .. } => {
            collect_free_vars_expr(scrutinee, bound, free);
            for arm in arms {
                let mut arm_bound = bound.clone();
                collect_pattern_names(&arm.pattern, &mut arm_bound);
                if let Some(guard) = &arm.guard {
                    collect_free_vars_expr(guard, &mut arm_bound, free);
                }
                collect_free_vars_expr(&arm.body, &mut arm_bound, free);
            }
        }
        Expr::Lambda { params, body, .. } => {
            let mut inner_bound = bound.clone();
            for p in params {
                inner_bound.insert(p.clone());
            }
            collect_free_vars_expr(body, &mut inner_bound, free);
        }
        Expr::Block(block, _) => collect_free_vars_block(block, bound, free),
        Expr::Timeout { millis, body, .. } => {
            collect_free_vars_expr(millis, bound, free);
            collect_free_vars_block(body, bound, free);
        }
        Expr::Concurrent { bindings, .. } => {
            let mut inner_bound = bound.clone();
            for (name, init) in bindings {
                collect_free_vars_expr(init, &mut inner_bound, free);
                inner_bound.insert(name.clone());
            }
        }
        Expr::Race { futures, .. } => {
            for f in futures {
                collect_free_vars_expr(f, bound, free);
            }
        }
    }
}

fn collect_free_vars_block(block: &Block, bound: &std::collections::HashSet<String>, free: &mut Vec<String>) {
    let mut scope = bound.clone();
    for stmt in &block.statements {
        collect_free_vars_stmt(stmt, &mut scope, free);
    }
}

fn collect_free_vars_stmt(stmt: &Stmt, bound: &mut std::collections::HashSet<String>, free: &mut Vec<String>) {
    match stmt {
        Stmt::Let { pattern, value, .. } => {
            collect_free_vars_expr(value, bound, free);
            collect_pattern_names(pattern, bound);
        }
        Stmt::Expr(e) => collect_free_vars_expr(e, bound, free),
        Stmt::If { cond, then_branch, else_branch, .. } => {
            collect_free_vars_expr(cond, bound, free);
            collect_free_vars_block(then_branch, bound, free);
            if let Some(b) = else_branch {
                collect_free_vars_block(b, bound, free);
            }
        }
        Stmt::For { pattern, iterable, body, .. } => {
            collect_free_vars_expr(iterable, bound, free);
            let mut inner = bound.clone();
            collect_pattern_names(pattern, &mut inner);
            collect_free_vars_block(body, &inner, free);
        }
        Stmt::While { cond, body, .. } => {
            collect_free_vars_expr(cond, bound, free);
            collect_free_vars_block(body, bound, free);
        }
        Stmt::Break(_) | Stmt::Continue(_) => {}
        Stmt::Return(value, _) => {
            if let Some(v) = value {
                collect_free_vars_expr(v, bound, free);
            }
        }
        Stmt::Throw(e, _) => collect_free_vars_expr(e, bound, free),
        Stmt::Try { body, catches, finally, .. } => {
            collect_free_vars_block(body, bound, free);
            for catch in catches {
                let mut inner = bound.clone();
                inner.insert(catch.binding.clone());
                collect_free_vars_block(&catch.body, &inner, free);
            }
            if let Some(f) = finally {
                collect_free_vars_block(f, bound, free);
            }
        }
    }
}

fn collect_pattern_names(pattern: &crate::ast::Pattern, bound: &mut std::collections::HashSet<String>) {
    match pattern {
        crate::ast::Pattern::Wildcard(_) | crate::ast::Pattern::Literal(..) | crate::ast::Pattern::Range { .. } => {}
        crate::ast::Pattern::Variable(name, _) | crate::ast::Pattern::TypedVariable(name, _, _) => {
            bound.insert(name.clone());
        }
        crate::ast::Pattern::Tuple(elems, _) => {
            for e in elems {
                collect_pattern_names(e, bound);
            }
        }
        crate::ast::Pattern::Struct { fields, .. } => {
            for (_, p) in fields {
                collect_pattern_names(p, bound);
            }
        }
        crate::ast::Pattern::Constructor { args, .. } => {
            for p in args {
                collect_pattern_names(p, bound);
            }
        }
    }
}
