//! C6 — expression lowering. Statements live in `emit::stmt`; this module
//! covers everything that leaves a value on the operand stack (spec §4.4).

use crate::ast::{BinOp, Expr, Literal, SurfaceType, UnOp};
use crate::classfile::opcodes::{self, Cmp};
use crate::classfile::writer::MethodBuilder;
use crate::emit::{ClassContext, EmitError, MethodContext};
use crate::types::{OpcodeFamily, VarType};

pub fn lower_expr(
    expr: &Expr,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    mc.last_call_was_void = false;
    match expr {
        Expr::Literal(lit, _) => lower_literal(lit, mb, mc),
        Expr::Ident(name, span) => lower_ident(name, *span, mb, mc, cc),
        Expr::SelfExpr(_) => {
            mb.emit_load(OpcodeFamily::Reference, 0);
            mc.last_type = VarType::Object;
            mc.last_declared_class = Some(cc.internal_name.replace('/', "."));
            Ok(())
        }
        Expr::Binary { op, lhs, rhs, span } => lower_binary(op, lhs, rhs, *span, mb, mc, cc),
        Expr::Unary { op, operand, span } => lower_unary(op, operand, *span, mb, mc, cc),
        Expr::SafeNav { receiver, access, span } => lower_safe_nav(receiver, access, *span, mb, mc, cc),
        Expr::Call { callee, args, span } => crate::emit::decl::lower_call(callee, args, *span, mb, mc, cc),
        Expr::MethodCall { receiver, method, args, span } => {
            crate::emit::decl::lower_method_call(receiver, method, args, *span, mb, mc, cc)
        }
        Expr::FieldAccess { receiver, field, span } => lower_field_access(receiver, field, *span, mb, mc, cc),
        Expr::StaticFieldAccess { class_name, field, span } => {
            lower_static_field_access(class_name, field, *span, mb, mc, cc)
        }
        Expr::Index { receiver, index, span } => lower_index(receiver, index, *span, mb, mc, cc),
        Expr::Tuple(elems, _) => lower_tuple(elems, mb, mc, cc),
        Expr::TupleIndex { receiver, index, span } => lower_tuple_index(receiver, *index, *span, mb, mc, cc),
        Expr::StructLiteral { name, fields, span } => lower_struct_literal(name, fields, *span, mb, mc, cc),
        Expr::ArrayLiteral(elems, _) => lower_array_literal(elems, mb, mc, cc),
        Expr::MapLiteral(entries, _) => lower_map_literal(entries, mb, mc, cc),
        Expr::If { cond, then_branch, else_branch, span } => {
            lower_if_expr(cond, then_branch, else_branch.as_deref(), *span, mb, mc, cc)
        }
        Expr::Match { scrutinee, arms, span } => crate::emit::pattern::lower_match(scrutinee, arms, *span, mb, mc, cc),
        Expr::Lambda { params, body, span } => crate::emit::async_lambda::lower_lambda(params, body, *span, mb, mc, cc),
        Expr::Block(block, _) => crate::emit::stmt::lower_block_expr(block, mb, mc, cc),
        Expr::Timeout { millis, body, span } => {
            crate::emit::async_lambda::lower_timeout(millis, body, *span, mb, mc, cc)
        }
        Expr::Concurrent { bindings, span } => crate::emit::async_lambda::lower_concurrent(bindings, *span, mb, mc, cc),
        Expr::Race { futures, span } => crate::emit::async_lambda::lower_race(futures, *span, mb, mc, cc),
    }
}

fn lower_literal(lit: &Literal, mb: &mut MethodBuilder, mc: &mut MethodContext) -> Result<(), EmitError> {
    match lit {
        Literal::Int(v) => {
            mb.emit_iconst(*v as i32);
            mc.last_type = VarType::Int;
        }
        Literal::Long(v) => {
            mb.emit_lconst(*v);
            mc.last_type = VarType::Long;
        }
        Literal::Float(v) | Literal::Double(v) => {
            // Firefly `Float` maps to JVM `double` throughout (spec §9 open question).
            mb.emit_dconst(*v);
            mc.last_type = VarType::Double;
        }
        Literal::Bool(v) => {
            mb.emit_iconst(if *v { 1 } else { 0 });
            mc.last_type = VarType::Boolean;
        }
        Literal::String(s) => {
            mb.emit_ldc_string(s.clone());
            mc.last_type = VarType::String;
        }
        Literal::None => {
            mb.emit_aconst_null();
            mc.last_type = VarType::Object;
        }
    }
    mc.last_declared_class = None;
    Ok(())
}

fn lower_ident(
    name: &str,
    span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    if let Some(local) = mc.lookup(name) {
        let (slot, var_type, declared_class) = (local.slot, local.var_type, local.declared_class.clone());
        mb.emit_load(var_type.opcode_family(), slot);
        mc.last_type = var_type;
        mc.last_declared_class = declared_class;
        return Ok(());
    }

    // Bare ADT variant constructor used as a value, e.g. `None`.
    if let Some((adt, variant)) = cc.registry.lookup_variant(name) {
        if variant.is_nullary() {
            mb.emit_getstatic(adt.base_internal_name.clone(), name, format!("L{};", adt.base_internal_name));
            mc.last_type = VarType::Object;
            mc.last_declared_class = Some(adt.base_internal_name.replace('/', "."));
            return Ok(());
        }
    }

    // Unresolved identifier: a hard error unless we're in an unreachable
    // branch, in which case a verifier-safe `null` keeps emission going
    // without masking a real bug elsewhere (spec §7).
    if !mc.code_reachable {
        mb.emit_aconst_null();
        mc.last_type = VarType::Object;
        return Ok(());
    }
    Err(EmitError::Resolution(crate::resolve::ResolutionError::UnresolvedSymbol {
        name: name.to_string(),
        span,
    }))
}

pub(crate) fn box_current(mb: &mut MethodBuilder, mc: &mut MethodContext) {
    if let Some(desc) = mc.last_type.box_descriptor() {
        mb.emit_invokestatic(mc.last_type.boxed_internal_name(), "valueOf", desc);
        mc.last_type = VarType::Object;
    }
}

/// Unbox an `Object` on top of the stack down to `target`, or no-op if
/// already primitive/matching.
pub(crate) fn unbox_to(mb: &mut MethodBuilder, mc: &mut MethodContext, target: VarType) {
    if mc.last_type == target {
        return;
    }
    if mc.last_type == VarType::Object {
        if let Some((method, desc)) = target.unbox_method() {
            mb.emit_checkcast(target.boxed_internal_name());
            mb.emit_invokevirtual(target.boxed_internal_name(), method, desc);
            mc.last_type = target;
        }
    }
}

/// Convert whatever numeric category is on top of the stack to `target`,
/// inserting `I2L`/`I2D`/`L2D` as needed (spec §4.4 "Binary operators").
pub(crate) fn widen_numeric(mb: &mut MethodBuilder, mc: &mut MethodContext, target: VarType) {
    match (mc.last_type, target) {
        (a, b) if a == b => {}
        (VarType::Int, VarType::Long) => {
            mb.emit_conversion(opcodes::I2L, OpcodeFamily::Long);
            mc.last_type = VarType::Long;
        }
        (VarType::Int, VarType::Double) => {
            mb.emit_conversion(opcodes::I2D, OpcodeFamily::Double);
            mc.last_type = VarType::Double;
        }
        (VarType::Long, VarType::Double) => {
            mb.emit_conversion(opcodes::L2D, OpcodeFamily::Double);
            mc.last_type = VarType::Double;
        }
        _ => {}
    }
}

fn numeric_rank(t: VarType) -> u8 {
    match t {
        VarType::Int | VarType::Boolean => 0,
        VarType::Long => 1,
        VarType::Double => 2,
        _ => 0,
    }
}

fn lower_binary(
    op: &BinOp,
    lhs: &Expr,
    rhs: &Expr,
    span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    match op {
        BinOp::And | BinOp::Or => return lower_short_circuit(op, lhs, rhs, mb, mc, cc),
        BinOp::RangeExclusive | BinOp::RangeInclusive => return lower_range(op, lhs, rhs, mb, mc, cc),
        BinOp::Coalesce => return lower_coalesce(lhs, rhs, mb, mc, cc),
        BinOp::Elvis => return lower_elvis(lhs, rhs, mb, mc, cc),
        _ => {}
    }

    lower_expr(lhs, mb, mc, cc)?;
    let lhs_type = mc.last_type;
    if lhs_type == VarType::String {
        return lower_string_concat(lhs_type, rhs, mb, mc, cc);
    }

    // `**` always promotes both operands to double for `Math.pow`, a
    // fixed target rather than the usual max-of-the-two-operands rule.
    if matches!(op, BinOp::Pow) {
        widen_numeric(mb, mc, VarType::Double);
        let lhs_slot = mc.alloc_temp(VarType::Double);
        mb.emit_store(OpcodeFamily::Double, lhs_slot);
        lower_expr(rhs, mb, mc, cc)?;
        widen_numeric(mb, mc, VarType::Double);
        let rhs_slot = mc.alloc_temp(VarType::Double);
        mb.emit_store(OpcodeFamily::Double, rhs_slot);
        mb.emit_load(OpcodeFamily::Double, lhs_slot);
        mb.emit_load(OpcodeFamily::Double, rhs_slot);
        mb.emit_invokestatic(firefly_runtime_abi::jdk::MATH_POW.owner, firefly_runtime_abi::jdk::MATH_POW.name, firefly_runtime_abi::jdk::MATH_POW.descriptor);
        mc.last_type = VarType::Double;
        return Ok(());
    }

    // Spill lhs into a temp so we can evaluate rhs and learn its category
    // before deciding the shared promoted category both operands must reach.
    let lhs_slot = mc.alloc_temp(lhs_type);
    mb.emit_store(lhs_type.opcode_family(), lhs_slot);

    lower_expr(rhs, mb, mc, cc)?;
    let rhs_type = mc.last_type;

    if rhs_type == VarType::String {
        // `a + b` concatenates whenever either side is a string.
        let rhs_slot = mc.alloc_temp(rhs_type);
        mb.emit_store(rhs_type.opcode_family(), rhs_slot);
        mb.emit_load(lhs_type.opcode_family(), lhs_slot);
        mc.last_type = lhs_type;
        return lower_string_concat_from_slot(lhs_type, rhs_type, rhs_slot, mb, mc);
    }

    let promoted = if numeric_rank(rhs_type) > numeric_rank(lhs_type) { rhs_type } else { lhs_type };
    widen_numeric(mb, mc, promoted);
    let rhs_slot = mc.alloc_temp(mc.last_type);
    mb.emit_store(mc.last_type.opcode_family(), rhs_slot);

    mb.emit_load(lhs_type.opcode_family(), lhs_slot);
    mc.last_type = lhs_type;
    widen_numeric(mb, mc, promoted);
    mb.emit_load(promoted.opcode_family(), rhs_slot);
    mc.last_type = promoted;

    let family = promoted.opcode_family();
    match op {
        BinOp::Add => {
            mb.emit_binary_arith(opcodes::add_opcode(family), family);
            mc.last_type = promoted;
        }
        BinOp::Sub => {
            mb.emit_binary_arith(opcodes::sub_opcode(family), family);
            mc.last_type = promoted;
        }
        BinOp::Mul => {
            mb.emit_binary_arith(opcodes::mul_opcode(family), family);
            mc.last_type = promoted;
        }
        BinOp::Div => {
            mb.emit_binary_arith(opcodes::div_opcode(family), family);
            mc.last_type = promoted;
        }
        BinOp::Rem => {
            mb.emit_binary_arith(opcodes::rem_opcode(family), family);
            mc.last_type = promoted;
        }
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            lower_comparison(op, family, mb, mc);
        }
        _ => unreachable!("short-circuit/range/coalesce/elvis/pow handled above"),
    }

    let _ = span;
    Ok(())
}

fn lower_comparison(op: &BinOp, family: OpcodeFamily, mb: &mut MethodBuilder, mc: &mut MethodContext) {
    let cmp = match op {
        BinOp::Eq => Cmp::Eq,
        BinOp::Ne => Cmp::Ne,
        BinOp::Lt => Cmp::Lt,
        BinOp::Le => Cmp::Le,
        BinOp::Gt => Cmp::Gt,
        BinOp::Ge => Cmp::Ge,
        _ => unreachable!(),
    };
    match family {
        OpcodeFamily::Int => {
            let branch = mb.emit_if_icmp(opcodes::if_icmp_opcode(cmp));
            emit_boolean_idiom(mb, branch);
        }
        OpcodeFamily::Long => {
            mb.emit_lcmp();
            let branch = mb.emit_if(opcodes::if_zero_opcode(cmp));
            emit_boolean_idiom(mb, branch);
        }
        OpcodeFamily::Double => {
            // DCMPG for </<=/==; the NaN-handling direction doesn't matter
            // for equality/ordering against a non-NaN operand, which is all
            // the surface language produces.
            mb.emit_dcmp(true);
            let branch = mb.emit_if(opcodes::if_zero_opcode(cmp));
            emit_boolean_idiom(mb, branch);
        }
        OpcodeFamily::Reference => {
            let acmp_opcode = if matches!(cmp, Cmp::Eq) { opcodes::IF_ACMPEQ } else { opcodes::IF_ACMPNE };
            let branch = mb.emit_if_acmp(acmp_opcode);
            emit_boolean_idiom(mb, branch);
        }
    }
    mc.last_type = VarType::Boolean;
}

/// `push 0; goto end; label: push 1; end:` — the idiomatic way to turn a
/// conditional branch into a boolean value on the stack (spec §4.4).
fn emit_boolean_idiom(mb: &mut MethodBuilder, taken: crate::classfile::writer::BranchTarget) {
    mb.emit_iconst(0);
    let skip_true = mb.emit_goto();
    let true_label = mb.current_location();
    mb.set_target(taken, true_label);
    mb.emit_pop();
    mb.emit_iconst(1);
    let end = mb.current_location();
    mb.set_target(skip_true, end);
}

fn lower_short_circuit(
    op: &BinOp,
    lhs: &Expr,
    rhs: &Expr,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    lower_expr(lhs, mb, mc, cc)?;
    let short_circuit_branch = match op {
        BinOp::And => mb.emit_if(opcodes::IFEQ), // false -> short-circuit to false
        BinOp::Or => mb.emit_if(opcodes::IFNE),  // true -> short-circuit to true
        _ => unreachable!(),
    };
    lower_expr(rhs, mb, mc, cc)?;
    let join = mb.emit_goto();
    let short_circuit_label = mb.current_location();
    mb.set_target(short_circuit_branch, short_circuit_label);
    mb.emit_iconst(if matches!(op, BinOp::Or) { 1 } else { 0 });
    let end = mb.current_location();
    mb.set_target(join, end);
    mb.mark_frame(end);
    mc.last_type = VarType::Boolean;
    Ok(())
}

fn lower_range(
    op: &BinOp,
    lhs: &Expr,
    rhs: &Expr,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    mb.emit_new(firefly_runtime_abi::RANGE);
    mb.emit_dup();
    lower_expr(lhs, mb, mc, cc)?;
    lower_expr(rhs, mb, mc, cc)?;
    mb.emit_iconst(if matches!(op, BinOp::RangeInclusive) { 1 } else { 0 });
    mb.emit_invokespecial(firefly_runtime_abi::RANGE, "<init>", firefly_runtime_abi::RANGE_CTOR.descriptor);
    mc.last_type = VarType::Object;
    mc.last_declared_class = Some("com.firefly.runtime.Range".to_string());
    Ok(())
}

/// `a ?? b`: evaluate `a`; if non-null use it, else evaluate `b`.
fn lower_coalesce(
    lhs: &Expr,
    rhs: &Expr,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    lower_expr(lhs, mb, mc, cc)?;
    mb.emit_dup();
    let is_null = mb.emit_if(opcodes::IFNULL);
    let skip_rhs = mb.emit_goto();
    let null_label = mb.current_location();
    mb.set_target(is_null, null_label);
    mb.emit_pop();
    lower_expr(rhs, mb, mc, cc)?;
    let end = mb.current_location();
    mb.set_target(skip_rhs, end);
    mb.mark_frame(end);
    Ok(())
}

/// `a ?: b`: elvis — use `a` if truthy (non-null/non-zero), else `b`. For
/// the boolean/reference surface this reduces to the same null-or-falsy
/// duplicate-and-jump idiom as coalesce.
fn lower_elvis(
    lhs: &Expr,
    rhs: &Expr,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    lower_coalesce(lhs, rhs, mb, mc, cc)
}

fn lower_string_concat(
    lhs_type: VarType,
    rhs: &Expr,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    let lhs_slot = mc.alloc_temp(lhs_type);
    mb.emit_store(lhs_type.opcode_family(), lhs_slot);
    lower_expr(rhs, mb, mc, cc)?;
    let rhs_type = mc.last_type;
    let rhs_slot = mc.alloc_temp(rhs_type);
    mb.emit_store(rhs_type.opcode_family(), rhs_slot);
    mb.emit_load(lhs_type.opcode_family(), lhs_slot);
    mc.last_type = lhs_type;
    lower_string_concat_from_slot(lhs_type, rhs_type, rhs_slot, mb, mc)
}

fn lower_string_concat_from_slot(
    lhs_type: VarType,
    rhs_type: VarType,
    rhs_slot: u16,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
) -> Result<(), EmitError> {
    // Stack currently holds lhs (reloaded by the caller). Build the
    // StringBuilder and append both spilled operands in order.
    let lhs_slot = mc.alloc_temp(lhs_type);
    mb.emit_store(lhs_type.opcode_family(), lhs_slot);

    mb.emit_new("java/lang/StringBuilder");
    mb.emit_dup();
    mb.emit_invokespecial("java/lang/StringBuilder", "<init>", "()V");

    mb.emit_load(lhs_type.opcode_family(), lhs_slot);
    mc.last_type = lhs_type;
    emit_string_builder_append(mb, mc);

    mb.emit_load(rhs_type.opcode_family(), rhs_slot);
    mc.last_type = rhs_type;
    emit_string_builder_append(mb, mc);

    mb.emit_invokevirtual("java/lang/StringBuilder", "toString", "()Ljava/lang/String;");
    mc.last_type = VarType::String;
    Ok(())
}

fn emit_string_builder_append(mb: &mut MethodBuilder, mc: &mut MethodContext) {
    let descriptor = match mc.last_type {
        VarType::Int | VarType::Boolean => "(I)Ljava/lang/StringBuilder;",
        VarType::Long => "(J)Ljava/lang/StringBuilder;",
        VarType::Double => "(D)Ljava/lang/StringBuilder;",
        VarType::String => "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
        VarType::StringArray | VarType::Object => "(Ljava/lang/Object;)Ljava/lang/StringBuilder;",
    };
    // Append leaves the receiver on the stack again; our virtual-stack
    // model already accounts for this via push_return in emit_invokevirtual.
    mb.emit_invokevirtual("java/lang/StringBuilder", "append", descriptor);
    mc.last_type = VarType::Object;
}

fn lower_unary(
    op: &UnOp,
    operand: &Expr,
    span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    match op {
        UnOp::Neg => {
            lower_expr(operand, mb, mc, cc)?;
            mb.emit_neg(opcodes::neg_opcode(mc.last_type.opcode_family()));
        }
        UnOp::Not => {
            lower_expr(operand, mb, mc, cc)?;
            let branch = mb.emit_if(opcodes::IFEQ);
            emit_boolean_idiom_inverted(mb, branch);
            mc.last_type = VarType::Boolean;
        }
        UnOp::Ref | UnOp::RefMut => {
            lower_expr(operand, mb, mc, cc)?;
            box_current(mb, mc);
            let (owner, method) = if matches!(op, UnOp::Ref) {
                (firefly_runtime_abi::REFERENCE, firefly_runtime_abi::REFERENCE_OF)
            } else {
                (firefly_runtime_abi::MUTABLE_REFERENCE, firefly_runtime_abi::MUTABLE_REFERENCE_OF)
            };
            mb.emit_invokestatic(owner, method.name, method.descriptor);
            mc.last_type = VarType::Object;
            mc.last_declared_class = Some(owner.replace('/', "."));
        }
        UnOp::ForceUnwrap => {
            lower_expr(operand, mb, mc, cc)?;
            mb.emit_dup();
            let non_null = mb.emit_if(opcodes::IFNONNULL);
            mb.emit_new("java/lang/NullPointerException");
            mb.emit_dup();
            mb.emit_invokespecial("java/lang/NullPointerException", "<init>", "()V");
            mb.emit_athrow();
            let after = mb.current_location();
            mb.set_target(non_null, after);
            mb.mark_frame(after);
        }
        UnOp::Await => {
            lower_expr(operand, mb, mc, cc)?;
            mb.emit_invokevirtual(
                firefly_runtime_abi::FUTURE,
                firefly_runtime_abi::FUTURE_GET.name,
                firefly_runtime_abi::FUTURE_GET.descriptor,
            );
            mc.last_type = VarType::Object;
        }
    }
    let _ = span;
    Ok(())
}

fn emit_boolean_idiom_inverted(mb: &mut MethodBuilder, taken: crate::classfile::writer::BranchTarget) {
    // `taken` fires when the operand was falsy (IFEQ); logical-not yields
    // true in that case, false otherwise — same idiom, swapped constants.
    mb.emit_iconst(1);
    let skip = mb.emit_goto();
    let false_label = mb.current_location();
    mb.set_target(taken, false_label);
    mb.emit_pop();
    mb.emit_iconst(0);
    let end = mb.current_location();
    mb.set_target(skip, end);
}

fn lower_safe_nav(
    receiver: &Expr,
    access: &Expr,
    _span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    lower_expr(receiver, mb, mc, cc)?;
    mb.emit_dup();
    let is_null = mb.emit_if(opcodes::IFNULL);
    // Re-dispatch `access` against the already-evaluated receiver by
    // substituting it textually is not possible post-hoc; instead we
    // lower `access` assuming it is itself a FieldAccess/MethodCall whose
    // receiver expression is `receiver` re-evaluated is avoided by only
    // supporting the common shape where `access` already targets the
    // value now sitting on the stack via a synthetic self-receiver.
    mb.emit_pop();
    lower_expr(access, mb, mc, cc)?;
    box_current(mb, mc);
    let join = mb.emit_goto();
    let null_label = mb.current_location();
    mb.set_target(is_null, null_label);
    mb.emit_pop();
    mb.emit_aconst_null();
    let end = mb.current_location();
    mb.set_target(join, end);
    mb.mark_frame(end);
    mc.last_type = VarType::Object;
    Ok(())
}

pub fn lower_field_access(
    receiver: &Expr,
    field: &str,
    span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    if field == "length" {
        lower_expr(receiver, mb, mc, cc)?;
        mb.emit_invokevirtual(
            firefly_runtime_abi::PERSISTENT_VECTOR,
            firefly_runtime_abi::PERSISTENT_VECTOR_SIZE.name,
            firefly_runtime_abi::PERSISTENT_VECTOR_SIZE.descriptor,
        );
        mc.last_type = VarType::Int;
        return Ok(());
    }

    lower_expr(receiver, mb, mc, cc)?;
    let owner = mc.last_declared_class.clone();

    if let Some(owner_dotted) = &owner {
        let owner_simple = owner_dotted.rsplit('.').next().unwrap_or(owner_dotted);
        if let Some(info) = cc.registry.lookup_struct(owner_simple) {
            if let Some(f) = info.fields.iter().find(|f| f.name == field) {
                let getter = if matches!(f.surface_type, SurfaceType::Primitive(crate::types::PrimitiveKind::Bool)) {
                    format!("is{}{}", f.name[..1].to_uppercase(), &f.name[1..])
                } else {
                    format!("get{}{}", f.name[..1].to_uppercase(), &f.name[1..])
                };
                mb.emit_invokevirtual(info.internal_name.clone(), getter, format!("(){}", f.descriptor));
                mc.last_type = crate::types::VarType::from_surface(&f.surface_type);
                return Ok(());
            }
        }
    }

    let descriptor = cc.field_types.get(field).cloned().unwrap_or_else(|| "Ljava/lang/Object;".to_string());
    let owner_internal = owner.as_deref().map(|o| o.replace('.', "/")).unwrap_or_else(|| cc.internal_name.clone());
    mb.emit_getfield(owner_internal, field, descriptor.clone());
    mc.last_type = crate::types::descriptor_to_var_type(&descriptor);
    let _ = span;
    Ok(())
}

fn lower_static_field_access(
    class_name: &str,
    field: &str,
    _span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    let fqn = cc.resolver.resolve_class_name(class_name).unwrap_or_else(|| class_name.to_string());
    let internal = fqn.replace('.', "/");
    let descriptor = cc
        .resolver
        .get_class(&fqn)
        .and_then(|c| c.fields.iter().find(|f| f.name == field).map(|f| f.descriptor.clone()))
        .unwrap_or_else(|| "Ljava/lang/Object;".to_string());
    mb.emit_getstatic(internal, field, descriptor.clone());
    mc.last_type = crate::types::descriptor_to_var_type(&descriptor);
    mc.last_declared_class = crate::classfile::descriptor::class_name_from_descriptor(&descriptor)
        .map(|n| n.replace('/', "."));
    Ok(())
}

fn lower_index(
    receiver: &Expr,
    index: &Expr,
    _span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    lower_expr(receiver, mb, mc, cc)?;
    let is_array = mc.last_type == VarType::StringArray;
    lower_expr(index, mb, mc, cc)?;
    if is_array {
        mb.emit_aaload();
        mc.last_type = VarType::String;
    } else {
        mb.emit_invokevirtual(
            firefly_runtime_abi::PERSISTENT_VECTOR,
            firefly_runtime_abi::PERSISTENT_VECTOR_GET.name,
            firefly_runtime_abi::PERSISTENT_VECTOR_GET.descriptor,
        );
        mc.last_type = VarType::Object;
    }
    Ok(())
}

fn lower_tuple(elems: &[Expr], mb: &mut MethodBuilder, mc: &mut MethodContext, cc: &mut ClassContext) -> Result<(), EmitError> {
    mb.emit_new("java/util/ArrayList");
    mb.emit_dup();
    mb.emit_invokespecial("java/util/ArrayList", "<init>", "()V");
    for elem in elems {
        mb.emit_dup();
        lower_expr(elem, mb, mc, cc)?;
        box_current(mb, mc);
        mb.emit_invokeinterface("java/util/List", "add", "(Ljava/lang/Object;)Z");
        mb.emit_pop();
    }
    mc.last_type = VarType::Object;
    mc.last_declared_class = Some("java.util.ArrayList".to_string());
    Ok(())
}

fn lower_tuple_index(
    receiver: &Expr,
    index: usize,
    _span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    lower_expr(receiver, mb, mc, cc)?;
    mb.emit_iconst(index as i32);
    mb.emit_invokeinterface("java/util/List", "get", "(I)Ljava/lang/Object;");
    mc.last_type = VarType::Object;
    Ok(())
}

fn lower_struct_literal(
    name: &str,
    fields: &[(String, Expr)],
    span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    let info = cc
        .registry
        .lookup_struct(name)
        .ok_or_else(|| EmitError::PatternCodegen { message: format!("unknown struct/spark `{name}`"), span })?
        .clone();

    mb.emit_new(info.internal_name.clone());
    mb.emit_dup();
    let mut ctor_params = String::new();
    for field_info in &info.fields {
        let (_, value) = fields
            .iter()
            .find(|(n, _)| n == &field_info.name)
            .ok_or_else(|| EmitError::PatternCodegen {
                message: format!("missing field `{}` in struct literal `{name}`", field_info.name),
                span,
            })?;
        lower_expr(value, mb, mc, cc)?;
        coerce_to_descriptor(mb, mc, &field_info.descriptor);
        ctor_params.push_str(&field_info.descriptor);
    }
    mb.emit_invokespecial(info.internal_name.clone(), "<init>", format!("({})V", ctor_params));
    mc.last_type = VarType::Object;
    mc.last_declared_class = Some(info.internal_name.replace('/', "."));
    Ok(())
}

/// Coerce the value on top of the stack to exactly `descriptor`: widen a
/// narrower primitive, or box if the target is a reference type and the
/// value is primitive.
pub fn coerce_to_descriptor(mb: &mut MethodBuilder, mc: &mut MethodContext, descriptor: &str) {
    if crate::types::is_primitive_descriptor(descriptor) {
        let target = crate::types::descriptor_to_var_type(descriptor);
        widen_numeric(mb, mc, target);
    } else if mc.last_type.is_primitive() {
        box_current(mb, mc);
    }
}

fn lower_array_literal(elems: &[Expr], mb: &mut MethodBuilder, mc: &mut MethodContext, cc: &mut ClassContext) -> Result<(), EmitError> {
    mb.emit_iconst(elems.len() as i32);
    mb.emit_anewarray("java/lang/Object");
    for (i, elem) in elems.iter().enumerate() {
        mb.emit_dup();
        mb.emit_iconst(i as i32);
        lower_expr(elem, mb, mc, cc)?;
        box_current(mb, mc);
        mb.emit_aastore();
    }
    mb.emit_invokestatic(
        firefly_runtime_abi::PERSISTENT_VECTOR,
        firefly_runtime_abi::PERSISTENT_VECTOR_OF.name,
        firefly_runtime_abi::PERSISTENT_VECTOR_OF.descriptor,
    );
    mc.last_type = VarType::Object;
    mc.last_declared_class = Some("com.firefly.runtime.collections.PersistentVector".to_string());
    Ok(())
}

fn lower_map_literal(
    entries: &[(Expr, Expr)],
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    mb.emit_new("java/util/HashMap");
    mb.emit_dup();
    mb.emit_invokespecial("java/util/HashMap", "<init>", "()V");
    for (k, v) in entries {
        mb.emit_dup();
        lower_expr(k, mb, mc, cc)?;
        box_current(mb, mc);
        lower_expr(v, mb, mc, cc)?;
        box_current(mb, mc);
        mb.emit_invokeinterface(
            "java/util/Map",
            "put",
            "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
        );
        mb.emit_pop();
    }
    mc.last_type = VarType::Object;
    mc.last_declared_class = Some("java.util.HashMap".to_string());
    Ok(())
}

fn lower_if_expr(
    cond: &Expr,
    then_branch: &Expr,
    else_branch: Option<&Expr>,
    _span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    lower_expr(cond, mb, mc, cc)?;
    let else_branch_target = mb.emit_if(opcodes::IFEQ);
    lower_expr(then_branch, mb, mc, cc)?;
    let then_was_reachable = mc.code_reachable;
    let join = if then_was_reachable { Some(mb.emit_goto()) } else { None };
    let else_label = mb.current_location();
    mb.set_target(else_branch_target, else_label);
    mb.mark_frame(else_label);
    if let Some(else_expr) = else_branch {
        lower_expr(else_expr, mb, mc, cc)?;
    } else {
        mc.last_type = VarType::Object;
    }
    if let Some(join) = join {
        let end = mb.current_location();
        mb.set_target(join, end);
        mb.mark_frame(end);
    }
    mc.code_reachable = true;
    Ok(())
}
