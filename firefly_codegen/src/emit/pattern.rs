//! C7 — the pattern-match lowerer (spec §4.5).
//!
//! A `match` compiles to a cascade: each arm tests its pattern against the
//! (once-evaluated, spilled) scrutinee, binds on success, evaluates its
//! optional guard, and falls through to the next arm's test on any failure.
//! `let`/`for` destructuring reuses the same per-pattern extraction code
//! through [`bind_irrefutable`], trusting the caller that the pattern
//! cannot fail (spec §4.4's "a `let` binding pattern must be irrefutable").

use crate::ast::{Literal, MatchArm, Pattern};
use crate::classfile::opcodes;
use crate::classfile::writer::{BranchTarget, MethodBuilder};
use crate::emit::derive::getter_name;
use crate::emit::{expr, ClassContext, EmitError, MethodContext};
use crate::types::{descriptor_to_var_type, OpcodeFamily, VarType};

pub fn lower_match(
    scrutinee: &crate::ast::Expr,
    arms: &[MatchArm],
    span: crate::span::Span,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<(), EmitError> {
    expr::lower_expr(scrutinee, mb, mc, cc)?;
    expr::box_current(mb, mc);
    let slot = mc.alloc_temp(VarType::Object);
    mb.emit_store(OpcodeFamily::Reference, slot);

    let mut end_joins = Vec::new();

    for arm in arms {
        let mut fail_branches = compile_pattern(&arm.pattern, slot, VarType::Object, mb, mc, cc)?;

        if let Some(guard) = &arm.guard {
            expr::lower_expr(guard, mb, mc, cc)?;
            fail_branches.push(mb.emit_if(opcodes::IFEQ));
        }

        expr::lower_expr(&arm.body, mb, mc, cc)?;
        expr::box_current(mb, mc);
        if mc.code_reachable {
            end_joins.push(mb.emit_goto());
        }

        let next_label = mb.current_location();
        mb.mark_frame(next_label);
        mc.code_reachable = true;
        for branch in fail_branches {
            mb.set_target(branch, next_label);
        }
    }

    // Every arm fell through: the frontend guarantees match exhaustiveness,
    // so reaching here means either a non-exhaustive match slipped through
    // or a pattern bug in this lowerer. Fail loudly rather than falling
    // into whatever garbage sits on the stack next.
    mb.emit_new("java/lang/IllegalStateException");
    mb.emit_dup();
    mb.emit_ldc_string("no match arm matched");
    mb.emit_invokespecial("java/lang/IllegalStateException", "<init>", "(Ljava/lang/String;)V");
    mb.emit_athrow();
    mc.code_reachable = false;

    let end_label = mb.current_location();
    mb.mark_frame(end_label);
    for join in end_joins {
        mb.set_target(join, end_label);
    }
    mc.code_reachable = true;
    mc.last_type = VarType::Object;
    let _ = span;
    Ok(())
}

/// Test `pattern` against the value in `slot` (of category `value_type`),
/// binding every variable the pattern introduces along the way. Returns
/// the branch targets that must be patched to the "pattern did not match,
/// try the next arm" label.
fn compile_pattern(
    pattern: &Pattern,
    slot: u16,
    value_type: VarType,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
) -> Result<Vec<BranchTarget>, EmitError> {
    match pattern {
        Pattern::Wildcard(_) => Ok(Vec::new()),
        Pattern::Variable(name, _) => {
            mc.bind_param(name.clone(), slot, value_type, None);
            Ok(Vec::new())
        }
        Pattern::TypedVariable(name, ty, _) => {
            let mut fails = Vec::new();
            if let crate::ast::SurfaceType::Named(type_name) = ty {
                let internal = cc.resolver.resolve_class_name(type_name).map(|fqn| fqn.replace('.', "/")).unwrap_or_else(|| type_name.replace('.', "/"));
                mb.emit_load(OpcodeFamily::Reference, slot);
                mb.emit_instanceof(internal.clone());
                fails.push(mb.emit_if(opcodes::IFEQ));
                mc.bind_param(name.clone(), slot, value_type, Some(internal.replace('/', ".")));
            } else {
                mc.bind_param(name.clone(), slot, value_type, None);
            }
            Ok(fails)
        }
        Pattern::Literal(lit, span) => Ok(vec![compile_literal_test(lit, slot, value_type, *span, mb)?]),
        Pattern::Range { start, end, inclusive, span } => compile_range_test(start, end, *inclusive, slot, *span, mb),
        Pattern::Tuple(elems, _) => {
            let mut fails = Vec::new();
            for (i, elem_pattern) in elems.iter().enumerate() {
                mb.emit_load(OpcodeFamily::Reference, slot);
                mb.emit_iconst(i as i32);
                mb.emit_invokeinterface("java/util/List", "get", "(I)Ljava/lang/Object;");
                let elem_slot = mc.alloc_temp(VarType::Object);
                mb.emit_store(OpcodeFamily::Reference, elem_slot);
                fails.extend(compile_pattern(elem_pattern, elem_slot, VarType::Object, mb, mc, cc)?);
            }
            Ok(fails)
        }
        Pattern::Struct { name, fields, span } => {
            let info = cc
                .registry
                .lookup_struct(name)
                .ok_or_else(|| EmitError::PatternCodegen { message: format!("unknown struct `{name}` in pattern"), span: *span })?
                .clone();
            let mut fails = Vec::new();
            mb.emit_load(OpcodeFamily::Reference, slot);
            mb.emit_instanceof(info.internal_name.clone());
            fails.push(mb.emit_if(opcodes::IFEQ));

            mb.emit_load(OpcodeFamily::Reference, slot);
            mb.emit_checkcast(info.internal_name.clone());
            let cast_slot = mc.alloc_temp(VarType::Object);
            mb.emit_store(OpcodeFamily::Reference, cast_slot);

            for (field_name, field_pattern) in fields {
                let field = info.fields.iter().find(|f| &f.name == field_name).ok_or_else(|| EmitError::PatternCodegen {
                    message: format!("struct `{name}` has no field `{field_name}`"),
                    span: *span,
                })?;
                mb.emit_load(OpcodeFamily::Reference, cast_slot);
                mb.emit_invokevirtual(info.internal_name.clone(), getter_name(field), format!("(){}", field.descriptor));
                let field_type = descriptor_to_var_type(&field.descriptor);
                let field_slot = mc.alloc_temp(field_type);
                mb.emit_store(field_type.opcode_family(), field_slot);
                fails.extend(compile_pattern(field_pattern, field_slot, field_type, mb, mc, cc)?);
            }
            Ok(fails)
        }
        Pattern::Constructor { name, args, span } => {
            let (_, variant) = cc
                .registry
                .lookup_variant(name)
                .ok_or_else(|| EmitError::PatternCodegen { message: format!("unknown variant `{name}` in pattern"), span: *span })?;
            let variant = variant.clone();
            let mut fails = Vec::new();

            if variant.is_nullary() {
                mb.emit_load(OpcodeFamily::Reference, slot);
                mb.emit_getstatic(variant.internal_name.clone(), "INSTANCE", format!("L{};", variant.internal_name));
                fails.push(mb.emit_if_acmp(opcodes::IF_ACMPNE));
                return Ok(fails);
            }

            mb.emit_load(OpcodeFamily::Reference, slot);
            mb.emit_instanceof(variant.internal_name.clone());
            fails.push(mb.emit_if(opcodes::IFEQ));

            mb.emit_load(OpcodeFamily::Reference, slot);
            mb.emit_checkcast(variant.internal_name.clone());
            let cast_slot = mc.alloc_temp(VarType::Object);
            mb.emit_store(OpcodeFamily::Reference, cast_slot);

            for (field, arg_pattern) in variant.fields.iter().zip(args.iter()) {
                mb.emit_load(OpcodeFamily::Reference, cast_slot);
                mb.emit_getfield(variant.internal_name.clone(), field.name.clone(), field.descriptor.clone());
                let field_type = descriptor_to_var_type(&field.descriptor);
                let field_slot = mc.alloc_temp(field_type);
                mb.emit_store(field_type.opcode_family(), field_slot);
                fails.extend(compile_pattern(arg_pattern, field_slot, field_type, mb, mc, cc)?);
            }
            Ok(fails)
        }
    }
}

fn compile_literal_test(
    lit: &Literal,
    slot: u16,
    value_type: VarType,
    span: crate::span::Span,
    mb: &mut MethodBuilder,
) -> Result<BranchTarget, EmitError> {
    let _ = (value_type, span);
    let branch = match lit {
        Literal::Int(v) => {
            mb.emit_load(OpcodeFamily::Int, slot);
            mb.emit_iconst(*v as i32);
            mb.emit_if_icmp(opcodes::IF_ICMPNE)
        }
        Literal::Long(v) => {
            mb.emit_load(OpcodeFamily::Long, slot);
            mb.emit_lconst(*v);
            mb.emit_lcmp();
            mb.emit_if(opcodes::IFNE)
        }
        Literal::Float(v) | Literal::Double(v) => {
            mb.emit_load(OpcodeFamily::Double, slot);
            mb.emit_dconst(*v);
            mb.emit_dcmp(true);
            mb.emit_if(opcodes::IFNE)
        }
        Literal::Bool(v) => {
            mb.emit_load(OpcodeFamily::Int, slot);
            mb.emit_iconst(if *v { 1 } else { 0 });
            mb.emit_if_icmp(opcodes::IF_ICMPNE)
        }
        Literal::String(s) => {
            mb.emit_load(OpcodeFamily::Reference, slot);
            mb.emit_ldc_string(s.clone());
            mb.emit_invokevirtual("java/lang/String", "equals", "(Ljava/lang/Object;)Z");
            mb.emit_if(opcodes::IFEQ)
        }
        Literal::None => {
            mb.emit_load(OpcodeFamily::Reference, slot);
            mb.emit_if(opcodes::IFNONNULL)
        }
    };
    Ok(branch)
}

fn compile_range_test(
    start: &Literal,
    end: &Literal,
    inclusive: bool,
    slot: u16,
    span: crate::span::Span,
    mb: &mut MethodBuilder,
) -> Result<Vec<BranchTarget>, EmitError> {
    let (start_v, end_v) = match (start, end) {
        (Literal::Int(a), Literal::Int(b)) => (*a, *b),
        _ => {
            return Err(EmitError::PatternCodegen {
                message: "range patterns are only supported over integer literals".to_string(),
                span,
            })
        }
    };
    let mut fails = Vec::new();
    mb.emit_load(OpcodeFamily::Int, slot);
    mb.emit_iconst(start_v as i32);
    fails.push(mb.emit_if_icmp(opcodes::IF_ICMPLT));
    mb.emit_load(OpcodeFamily::Int, slot);
    mb.emit_iconst(end_v as i32);
    fails.push(mb.emit_if_icmp(if inclusive { opcodes::IF_ICMPGT } else { opcodes::IF_ICMPGE }));
    Ok(fails)
}

/// Bind every variable a (trusted-irrefutable) pattern introduces, without
/// emitting any failure branch. Used by destructuring `let`/`for` bindings,
/// which the frontend guarantees cannot fail to match.
pub fn bind_irrefutable(
    pattern: &Pattern,
    slot: u16,
    mb: &mut MethodBuilder,
    mc: &mut MethodContext,
    cc: &mut ClassContext,
    span: crate::span::Span,
) -> Result<(), EmitError> {
    match pattern {
        Pattern::Wildcard(_) => Ok(()),
        Pattern::Variable(name, _) | Pattern::TypedVariable(name, _, _) => {
            mc.bind_param(name.clone(), slot, VarType::Object, None);
            Ok(())
        }
        Pattern::Tuple(elems, _) => {
            for (i, elem_pattern) in elems.iter().enumerate() {
                mb.emit_load(OpcodeFamily::Reference, slot);
                mb.emit_iconst(i as i32);
                mb.emit_invokeinterface("java/util/List", "get", "(I)Ljava/lang/Object;");
                let elem_slot = mc.alloc_temp(VarType::Object);
                mb.emit_store(OpcodeFamily::Reference, elem_slot);
                bind_irrefutable(elem_pattern, elem_slot, mb, mc, cc, span)?;
            }
            Ok(())
        }
        Pattern::Struct { name, fields, .. } => {
            let info = cc
                .registry
                .lookup_struct(name)
                .ok_or_else(|| EmitError::PatternCodegen { message: format!("unknown struct `{name}` in pattern"), span })?
                .clone();
            mb.emit_load(OpcodeFamily::Reference, slot);
            mb.emit_checkcast(info.internal_name.clone());
            let cast_slot = mc.alloc_temp(VarType::Object);
            mb.emit_store(OpcodeFamily::Reference, cast_slot);
            for (field_name, field_pattern) in fields {
                let field = info.fields.iter().find(|f| &f.name == field_name).ok_or_else(|| EmitError::PatternCodegen {
                    message: format!("struct `{name}` has no field `{field_name}`"),
                    span,
                })?;
                mb.emit_load(OpcodeFamily::Reference, cast_slot);
                mb.emit_invokevirtual(info.internal_name.clone(), getter_name(field), format!("(){}", field.descriptor));
                let field_type = descriptor_to_var_type(&field.descriptor);
                let field_slot = mc.alloc_temp(field_type);
                mb.emit_store(field_type.opcode_family(), field_slot);
                bind_irrefutable(field_pattern, field_slot, mb, mc, cc, span)?;
            }
            Ok(())
        }
        Pattern::Constructor { name, args, .. } => {
            let (_, variant) = cc
                .registry
                .lookup_variant(name)
                .ok_or_else(|| EmitError::PatternCodegen { message: format!("unknown variant `{name}` in pattern"), span })?;
            let variant = variant.clone();
            if variant.is_nullary() {
                return Ok(());
            }
            mb.emit_load(OpcodeFamily::Reference, slot);
            mb.emit_checkcast(variant.internal_name.clone());
            let cast_slot = mc.alloc_temp(VarType::Object);
            mb.emit_store(OpcodeFamily::Reference, cast_slot);
            for (field, arg_pattern) in variant.fields.iter().zip(args.iter()) {
                mb.emit_load(OpcodeFamily::Reference, cast_slot);
                mb.emit_getfield(variant.internal_name.clone(), field.name.clone(), field.descriptor.clone());
                let field_type = descriptor_to_var_type(&field.descriptor);
                let field_slot = mc.alloc_temp(field_type);
                mb.emit_store(field_type.opcode_family(), field_slot);
                bind_irrefutable(arg_pattern, field_slot, mb, mc, cc, span)?;
            }
            Ok(())
        }
        Pattern::Literal(..) | Pattern::Range { .. } => Err(EmitError::PatternCodegen {
            message: "a destructuring binding pattern must be irrefutable".to_string(),
            span,
        }),
    }
}

