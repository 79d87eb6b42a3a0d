//! Statement-level lowering: `let`, control flow, `return`/`throw`,
//! `try`/`catch`/`finally` (spec §4.4). Expression lowering lives in
//! `emit::expr`.

use crate::ast::{Block, CatchClause, Stmt};
use crate::classfile::writer::MethodBuilder;
use crate::emit::expr::{self, coerce_to_descriptor};
use crate::emit::{ClassContext, EmitError, MethodContext};
use crate::types::{OpcodeFamily, VarType};
use firefly_runtime_abi::symbols;

pub fn lower_block(block: &Block, mb: &mut MethodBuilder, mc: &mut MethodContext, cc: &mut ClassContext) -> Result<(), EmitError> {
    for stmt in &block.statements {
        if !mc.code_reachable {
            // Dead code after an unconditional `return`/`throw`/`break`/
            // `continue`; the surface language permits trailing statements
            // there (e.g. an unreachable `else` tail) but nothing after them
            // should emit bytecode or touch the virtual stack.
            continue;
        }
        lower_stmt(stmt, mb, mc, cc)?;
    }
    Ok(())
}

/// A `Block` used as an expression (the last statement's value, or `null`
/// if the block ends in a non-expression statement or is empty).
pub fn lower_block_expr(block: &Block, mb: &mut MethodBuilder, mc: &mut MethodContext, cc: &mut ClassContext) -> Result<(), EmitError> {
    if block.statements.is_empty() {
        mb.emit_aconst_null();
        mc.last_type = VarType::Object;
        return Ok(());
    }
    let (last, init) = block.statements.split_last().expect("checked non-empty above");
    for stmt in init {
        if !mc.code_reachable {
            continue;
        }
        lower_stmt(stmt, mb, mc, cc)?;
    }
    if !mc.code_reachable {
        // The tail statement is unreachable; the block as an expression has
        // no value an enclosing expression could observe, so push a
        // placeholder to keep the virtual stack shape uniform.
        mb.emit_aconst_null();
        mc.last_type = VarType::Object;
        return Ok(());
    }
    match last {
        Stmt::Expr(e) => {
            expr::lower_expr(e, mb, mc, cc)?;
            expr::box_current(mb, mc);
        }
        other => {
            lower_stmt(other, mb, mc, cc)?;
            mb.emit_aconst_null();
            mc.last_type = VarType::Object;
        }
    }
    Ok(())
}

fn lower_stmt(stmt: &Stmt, mb: &mut MethodBuilder, mc: &mut MethodContext, cc: &mut ClassContext) -> Result<(), EmitError> {
    match stmt {
        Stmt::Let { pattern, declared_type, value, span } => lower_let(pattern, declared_type.as_ref(), value, *span, mb, mc, cc),
        Stmt::Expr(e) => {
            expr::lower_expr(e, mb, mc, cc)?;
            // Expression statements discard their value. A void-returning
            // call pushes nothing, so there is nothing to pop; every other
            // expression leaves exactly one (possibly wide) value that
            // `emit_pop` discards, selecting `pop`/`pop2` by category.
            if !mc.last_call_was_void {
                mb.emit_pop();
            }
            Ok(())
        }
        Stmt::If { cond, then_branch, else_branch, span } => lower_if_stmt(cond, then_branch, else_branch.as_ref(), *span, mb, mc, cc),
        Stmt::For { pattern, iterable, body, span } => lower_for(pattern, iterable, body, *span, mb, mc, cc),
        Stmt::While { cond, body, span } => lower_while(cond, body, *span, mb, mc, cc),
        Stmt::Break(span) => lower_break(*span, mb, mc),
        Stmt::Continue(span) => lower_continue(*span, mb, mc),
        Stmt::Return(value, _span) => lower_return(value.as_ref(), mb, mc, cc),
        Stmt::Throw(e, _span) => {
            expr::lower_expr(e, mb, mc, cc)?;
            mb.emit_athrow();
            mc.code_reachable = false;
            Ok(())
        }
        Stmt::Try { body, catches, finally, span } => lower_try(body, catches, finally.as_ref(), *span, mb, mc, cc),
    }
}

fn lower_let(
    pattern: &crate::ast::Pattern,
    declared_type: Option<&crate::ast::SurfaceType>,
    value: &crate::ast::Expr,
    span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    expr::lower_expr(value, mb, mc, cc)?;

    match pattern {
        crate::ast::Pattern::Variable(name, _) | crate::ast::Pattern::TypedVariable(name, _, _) => {
            let declared_class = mc.last_declared_class.clone();
            if let Some(ty) = declared_type {
                let descriptor = crate::types::surface_descriptor(ty);
                coerce_to_descriptor(mb, mc, &descriptor);
            }
            let var_type = mc.last_type;
            let slot = mc.declare_local(name.clone(), var_type, declared_class);
            mb.emit_store(var_type.opcode_family(), slot);
            Ok(())
        }
        crate::ast::Pattern::Tuple(..) | crate::ast::Pattern::Struct { .. } | crate::ast::Pattern::Constructor { .. } => {
            // Destructuring lets: spill the scrutinee, then drive the same
            // binding machinery the match lowerer uses for an irrefutable
            // pattern (a destructuring `let` has exactly one arm).
            let slot = mc.alloc_temp(VarType::Object);
            expr::box_current(mb, mc);
            mb.emit_store(crate::types::OpcodeFamily::Reference, slot);
            crate::emit::pattern::bind_irrefutable(pattern, slot, mb, mc, cc, span)
        }
        crate::ast::Pattern::Wildcard(_) => {
            mb.emit_pop();
            Ok(())
        }
        crate::ast::Pattern::Literal(..) | crate::ast::Pattern::Range { .. } => Err(EmitError::PatternCodegen {
            message: "a `let` binding pattern must be irrefutable".to_string(),
            span,
        }),
    }
}

fn lower_if_stmt(
    cond: &crate::ast::Expr,
    then_branch: &Block,
    else_branch: Option<&Block>,
    _span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    expr::lower_expr(cond, mb, mc, cc)?;
    let else_target = mb.emit_if(crate::classfile::opcodes::IFEQ);

    lower_block(then_branch, mb, mc, cc)?;
    let then_reachable = mc.code_reachable;
    let join = if then_reachable { Some(mb.emit_goto()) } else { None };

    let else_label = mb.current_location();
    mb.set_target(else_target, else_label);
    mb.mark_frame(else_label);
    mc.code_reachable = true;

    if let Some(else_block) = else_branch {
        lower_block(else_block, mb, mc, cc)?;
    }
    let else_reachable = mc.code_reachable;

    if let Some(join) = join {
        let end = mb.current_location();
        mb.set_target(join, end);
        mb.mark_frame(end);
        mc.code_reachable = true;
    } else {
        mc.code_reachable = else_reachable;
    }
    Ok(())
}

fn lower_while(
    cond: &crate::ast::Expr,
    body: &Block,
    _span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    let cond_label = mb.current_location();
    mb.mark_frame(cond_label);
    expr::lower_expr(cond, mb, mc, cc)?;
    let exit = mb.emit_if(crate::classfile::opcodes::IFEQ);

    mc.push_loop();
    lower_block(body, mb, mc, cc)?;
    let body_reachable = mc.code_reachable;
    let loop_labels = mc.pop_loop();
    for continue_target in loop_labels.continue_targets {
        mb.set_target(continue_target, cond_label);
    }
    if body_reachable {
        let back_edge = mb.emit_goto();
        mb.set_target(back_edge, cond_label);
    }

    let exit_label = mb.current_location();
    mb.set_target(exit, exit_label);
    mb.mark_frame(exit_label);
    for break_target in loop_labels.break_targets {
        mb.set_target(break_target, exit_label);
    }
    mc.code_reachable = true;
    Ok(())
}

/// `for x in iterable { ... }` lowers against `java.util.Iterator` (spec
/// §4.4): the iterable's runtime representation (`PersistentVector`,
/// `Range`, any `java.lang.Iterable`) is asked for `.iterator()`, then the
/// loop is the textbook `hasNext`/`next` pattern.
fn lower_for(
    pattern: &crate::ast::Pattern,
    iterable: &crate::ast::Expr,
    body: &Block,
    span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    expr::lower_expr(iterable, mb, mc, cc)?;
    expr::box_current(mb, mc);
    mb.emit_invokeinterface("java/lang/Iterable", "iterator", "()Ljava/util/Iterator;");
    let iter_slot = mc.alloc_temp(VarType::Object);
    mb.emit_store(crate::types::OpcodeFamily::Reference, iter_slot);

    let cond_label = mb.current_location();
    mb.mark_frame(cond_label);
    mb.emit_load(crate::types::OpcodeFamily::Reference, iter_slot);
    mb.emit_invokeinterface("java/util/Iterator", "hasNext", "()Z");
    let exit = mb.emit_if(crate::classfile::opcodes::IFEQ);

    mb.emit_load(crate::types::OpcodeFamily::Reference, iter_slot);
    mb.emit_invokeinterface("java/util/Iterator", "next", "()Ljava/lang/Object;");
    let bind_slot = mc.alloc_temp(VarType::Object);
    mb.emit_store(crate::types::OpcodeFamily::Reference, bind_slot);

    match pattern {
        crate::ast::Pattern::Variable(name, _) | crate::ast::Pattern::TypedVariable(name, _, _) => {
            mc.bind_param(name.clone(), bind_slot, VarType::Object, None);
        }
        crate::ast::Pattern::Wildcard(_) => {}
        _ => {
            crate::emit::pattern::bind_irrefutable(pattern, bind_slot, mb, mc, cc, span)?;
        }
    }

    mc.push_loop();
    lower_block(body, mb, mc, cc)?;
    let body_reachable = mc.code_reachable;
    let loop_labels = mc.pop_loop();
    let continue_label = mb.current_location();
    mb.mark_frame(continue_label);
    for continue_target in loop_labels.continue_targets {
        mb.set_target(continue_target, continue_label);
    }
    if body_reachable {
        let back_edge = mb.emit_goto();
        mb.set_target(back_edge, cond_label);
    }

    let exit_label = mb.current_location();
    mb.set_target(exit, exit_label);
    mb.mark_frame(exit_label);
    for break_target in loop_labels.break_targets {
        mb.set_target(break_target, exit_label);
    }
    mc.code_reachable = true;
    Ok(())
}

fn lower_break(span: crate::span::Span, mb: &mut MethodBuilder, mc: &mut MethodContext) -> Result<(), EmitError> {
    if !mc.in_loop() {
        return Err(EmitError::LoopControlOutsideLoop { span });
    }
    let branch = mb.emit_goto();
    mc.current_loop_mut().expect("in_loop checked above").break_targets.push(branch);
    mc.code_reachable = false;
    Ok(())
}

fn lower_continue(span: crate::span::Span, mb: &mut MethodBuilder, mc: &mut MethodContext) -> Result<(), EmitError> {
    if !mc.in_loop() {
        return Err(EmitError::LoopControlOutsideLoop { span });
    }
    let branch = mb.emit_goto();
    mc.current_loop_mut().expect("in_loop checked above").continue_targets.push(branch);
    mc.code_reachable = false;
    Ok(())
}

fn lower_return(value: Option<&crate::ast::Expr>, mb: &mut MethodBuilder, mc: &mut MethodContext, cc: &mut ClassContext) -> Result<(), EmitError> {
    match value {
        Some(e) => {
            expr::lower_expr(e, mb, mc, cc)?;
            if let Some(descriptor) = mc.return_descriptor.clone() {
                if descriptor != "V" {
                    coerce_to_descriptor(mb, mc, &descriptor);
                }
            }
            let family = if mc.return_descriptor.as_deref() == Some("V") { None } else { Some(mc.last_type.opcode_family()) };
            mb.emit_return(family);
        }
        None => mb.emit_return(None),
    }
    mc.code_reachable = false;
    Ok(())
}

fn lower_try(
    body: &Block,
    catches: &[CatchClause],
    finally: Option<&Block>,
    _span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    let try_start = mb.current_location();
    lower_block(body, mb, mc, cc)?;
    let try_body_reachable = mc.code_reachable;
    let try_end = mb.current_location();
    let join = if try_body_reachable { Some(mb.emit_goto()) } else { None };

    let mut catch_joins = Vec::new();
    let mut any_catch_reachable = false;
    for catch in catches {
        let handler_label = mb.current_location();
        let exception_internal = crate::types::surface_descriptor(&catch.exception_type);
        let exception_internal = exception_internal.trim_start_matches('L').trim_end_matches(';').to_string();
        // A catch declared against the root `FlyException` has to be
        // registered with the JVM against `Throwable`: any value thrown from
        // Java interop or a runtime-library call may not already be a
        // `FlyException`, and the handler below wraps it if not.
        let is_root_fly_exception = exception_internal == symbols::FLY_EXCEPTION;
        let registered_type = if is_root_fly_exception { "java/lang/Throwable".to_string() } else { exception_internal.clone() };
        mb.push_caught_exception(registered_type.clone());
        mb.mark_frame(handler_label);
        mc.code_reachable = true;
        let slot = mc.alloc_temp(VarType::Object);
        mb.emit_store(OpcodeFamily::Reference, slot);
        mb.add_exception_handler(try_start, try_end, handler_label, Some(registered_type));

        if is_root_fly_exception {
            mb.emit_load(OpcodeFamily::Reference, slot);
            mb.emit_instanceof(exception_internal.clone());
            let already_wrapped = mb.emit_if(crate::classfile::opcodes::IFNE);
            mb.emit_new(exception_internal.clone());
            mb.emit_dup();
            mb.emit_load(OpcodeFamily::Reference, slot);
            mb.emit_invokespecial(exception_internal.clone(), "<init>", "(Ljava/lang/Throwable;)V");
            mb.emit_store(OpcodeFamily::Reference, slot);
            let wrapped_label = mb.current_location();
            mb.mark_frame(wrapped_label);
            mb.set_target(already_wrapped, wrapped_label);
        }

        mc.bind_param(catch.binding.clone(), slot, VarType::Object, Some(exception_internal.replace('/', ".")));

        lower_block(&catch.body, mb, mc, cc)?;
        if mc.code_reachable {
            any_catch_reachable = true;
            catch_joins.push(mb.emit_goto());
        }
    }

    // End of the region a `finally`'s catch-all has to cover: the try body
    // plus every catch arm (spec §4.4: "with catches, the catch-all covers
    // the catch regions too").
    let protected_end = mb.current_location();
    let reachable_after_try = try_body_reachable || any_catch_reachable || catches.is_empty();

    if let Some(finally_block) = finally {
        let after_label = mb.current_location();
        mb.mark_frame(after_label);
        if let Some(join) = join {
            mb.set_target(join, after_label);
        }
        for catch_join in catch_joins {
            mb.set_target(catch_join, after_label);
        }
        mc.code_reachable = reachable_after_try;
        lower_block(finally_block, mb, mc, cc)?;
        let reachable_after_finally = mc.code_reachable;

        let skip_handler = if reachable_after_finally { Some(mb.emit_goto()) } else { None };

        // Catch-all: runs `finally` again on any exception the try/catch
        // region didn't handle, then re-throws it (Scenario F).
        let catch_all_label = mb.current_location();
        mb.push_caught_exception("java/lang/Throwable");
        mb.mark_frame(catch_all_label);
        let exc_slot = mc.alloc_temp(VarType::Object);
        mb.emit_store(OpcodeFamily::Reference, exc_slot);
        mb.add_exception_handler(try_start, protected_end, catch_all_label, None);
        mc.code_reachable = true;
        lower_block(finally_block, mb, mc, cc)?;
        if mc.code_reachable {
            mb.emit_load(OpcodeFamily::Reference, exc_slot);
            mb.emit_athrow();
        }

        let end_label = mb.current_location();
        mb.mark_frame(end_label);
        if let Some(skip) = skip_handler {
            mb.set_target(skip, end_label);
        }
        mc.code_reachable = reachable_after_finally;
    } else {
        let after_label = mb.current_location();
        mb.mark_frame(after_label);
        if let Some(join) = join {
            mb.set_target(join, after_label);
        }
        for catch_join in catch_joins {
            mb.set_target(catch_join, after_label);
        }
        mc.code_reachable = reachable_after_try;
    }

    Ok(())
}
