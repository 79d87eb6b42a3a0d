//! C5 — the declaration emitter (spec §4.3): turns one top-level AST
//! declaration into its class file(s), and resolves/lowers every call and
//! method call C6 encounters (spec §9: the class being compiled is always
//! in scope by the time one of its own method bodies needs a callee
//! resolved).

use crate::ast::{
    ActorDecl, Annotation, AnnotationValue, ClassDecl, Declaration, Expr, FunctionDecl, ImplDecl, InterfaceDecl, Literal, Param, SparkDecl,
    StructDecl, SurfaceType,
};
use crate::classfile::writer::{AnnotationElementValue, AnnotationEntry, ClassFile, ACC_ABSTRACT, ACC_INTERFACE, ACC_PUBLIC, ACC_STATIC};
use crate::classfile::ClassFileSet;
use crate::emit::{async_lambda, derive, expr, stmt, ClassContext, EmitError, FunctionSignature, MethodContext};
use crate::pipeline::CodegenConfig;
use crate::registry::Registry;
use crate::resolve::class_resolver::ClassResolver;
use crate::resolve::method_resolver::MethodResolver;
use crate::resolve::ResolutionError;
use crate::span::Span;
use crate::types::{descriptor_to_var_type, surface_descriptor, OpcodeFamily, VarType};
use firefly_runtime_abi::symbols;

pub fn emit_top_level(
    decl: &Declaration,
    module: &str,
    registry: &Registry,
    resolver: &ClassResolver,
    config: &CodegenConfig,
) -> Result<ClassFileSet, EmitError> {
    let package = module.replace('.', "/");
    match decl {
        Declaration::Function(f) => emit_free_function(f, &package, registry, resolver, config),
        Declaration::Class(c) => emit_class(c, top_level_internal_name(&package, &c.name), "java/lang/Object", registry, resolver, config),
        Declaration::Exception(c) => emit_class(c, top_level_internal_name(&package, &c.name), symbols::FLY_EXCEPTION, registry, resolver, config),
        Declaration::Interface(i) | Declaration::Trait(i) => emit_interface(i, top_level_internal_name(&package, &i.name), registry, resolver, config),
        Declaration::Impl(i) => emit_impl(i, &package, registry, resolver, config),
        Declaration::Struct(s) => emit_struct_decl(s, registry, resolver, config),
        Declaration::Spark(s) => emit_spark_decl(s, registry, resolver, config),
        Declaration::DataAdt(d) => emit_adt_decl(d, registry, config),
        Declaration::Actor(a) => emit_actor_decl(a, &package, registry, resolver, config),
        Declaration::TypeAlias(_) | Declaration::Use(_) => Ok(ClassFileSet::new()),
    }
}

fn top_level_internal_name(package: &str, simple: &str) -> String {
    if package.is_empty() {
        simple.to_string()
    } else {
        format!("{package}/{simple}")
    }
}

/// Nested declarations (spec §4.3: "Emit nested classes/interfaces/
/// structs/sparks/data recursively with `Outer$Inner` naming") use the
/// same dollar-joined internal name the C4 prepass already computed for
/// struct/spark/data (`registry::Enclosing::Class`); class/interface
/// nesting isn't registry-tracked, so its dollar name is built here.
fn emit_nested(decl: &Declaration, enclosing_internal: &str, registry: &Registry, resolver: &ClassResolver, config: &CodegenConfig) -> Result<ClassFileSet, EmitError> {
    match decl {
        Declaration::Class(c) => emit_class(c, format!("{enclosing_internal}${}", c.name), "java/lang/Object", registry, resolver, config),
        Declaration::Exception(c) => emit_class(c, format!("{enclosing_internal}${}", c.name), symbols::FLY_EXCEPTION, registry, resolver, config),
        Declaration::Interface(i) | Declaration::Trait(i) => emit_interface(i, format!("{enclosing_internal}${}", i.name), registry, resolver, config),
        Declaration::Struct(s) => emit_struct_decl(s, registry, resolver, config),
        Declaration::Spark(s) => emit_spark_decl(s, registry, resolver, config),
        Declaration::DataAdt(d) => emit_adt_decl(d, registry, config),
        _ => Ok(ClassFileSet::new()),
    }
}

fn pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn function_descriptor(params: &[Param], return_type: &SurfaceType) -> String {
    let params: String = params.iter().map(|p| surface_descriptor(&p.ty)).collect();
    format!("({params}){}", surface_descriptor(return_type))
}

/// `fly(args: String[])` is the JVM entry-point convention (spec §4.3,
/// glossary "Fly method"): a class's own instance method, never a free
/// function. A class that declares one gets a synthesized companion
/// `public static main([Ljava/lang/String;)V`.
fn is_fly_entry_method(f: &FunctionDecl) -> bool {
    !f.is_static
        && f.name == "fly"
        && f.params.len() == 1
        && matches!(&f.params[0].ty, SurfaceType::Array(inner) if matches!(inner.as_ref(), SurfaceType::Named(n) if n == "String"))
}

fn new_class_context<'a>(internal_name: String, super_internal_name: String, registry: &'a Registry, resolver: &'a ClassResolver, config: &'a CodegenConfig) -> ClassContext<'a> {
    ClassContext {
        internal_name,
        super_internal_name,
        field_types: std::collections::HashMap::new(),
        function_signatures: std::collections::HashMap::new(),
        registry,
        resolver,
        config,
        pending_methods: Vec::new(),
    }
}

fn emit_free_function(f: &FunctionDecl, package: &str, registry: &Registry, resolver: &ClassResolver, config: &CodegenConfig) -> Result<ClassFileSet, EmitError> {
    let class_simple = pascal_case(&f.name);
    let internal_name = if package.is_empty() { class_simple } else { format!("{package}/{class_simple}") };

    let method_name = f.name.as_str();
    let descriptor = if f.is_async {
        let params: String = f.params.iter().map(|p| surface_descriptor(&p.ty)).collect();
        format!("({params})L{};", symbols::FUTURE)
    } else {
        function_descriptor(&f.params, &f.return_type)
    };

    let return_var_type = if f.is_async { VarType::Object } else { VarType::from_surface(&f.return_type) };
    let mut class = ClassFile::new(internal_name.clone(), "java/lang/Object".to_string(), config.class_file_major_version);
    let mut cc = new_class_context(internal_name.clone(), "java/lang/Object".to_string(), registry, resolver, config);
    cc.function_signatures.insert(f.name.clone(), FunctionSignature { descriptor: descriptor.clone(), is_static: true, return_var_type });

    emit_function_method(&mut class, &mut cc, f, method_name, &descriptor, true)?;
    async_lambda::flush_pending_methods(&mut class, &mut cc)?;
    add_annotations(&mut class, &f.annotations, resolver);

    let mut out = ClassFileSet::new();
    out.insert(internal_name, class.to_bytes());
    Ok(out)
}

/// Lower one function/method body into a freshly created method on
/// `class`, honoring `is_async` by splitting the body into a
/// `Future`-wrapping outer body (spec §4.6).
fn emit_function_method(class: &mut ClassFile, cc: &mut ClassContext, f: &FunctionDecl, method_name: &str, descriptor: &str, is_static: bool) -> Result<(), EmitError> {
    let Some(body) = &f.body else {
        return Ok(());
    };

    let access = if is_static { ACC_PUBLIC | ACC_STATIC } else { ACC_PUBLIC };
    let mut mb = class.new_method(access, method_name, descriptor);

    let mut slot = 0u16;
    if !is_static {
        slot += 1;
    }
    for param in &f.params {
        slot += VarType::from_surface(&param.ty).slot_size();
    }
    let mut mc = MethodContext::new(slot);

    let mut slot = 0u16;
    if !is_static {
        mc.bind_param("self", slot, VarType::Object, Some(cc.internal_name.replace('/', ".")));
        slot += 1;
    }
    for param in &f.params {
        let var_type = VarType::from_surface(&param.ty);
        mc.bind_param(param.name.clone(), slot, var_type, declared_class_of(&param.ty));
        slot += var_type.slot_size();
    }

    if f.is_async && descriptor.ends_with(&format!("L{};", symbols::FUTURE)) {
        mc.set_return_descriptor(format!("L{};", symbols::FUTURE));
        async_lambda::lower_async_wrapper(body, f.span, &mut mb, &mut mc, cc)?;
        mb.emit_return(Some(OpcodeFamily::Reference));
    } else {
        let return_descriptor = surface_descriptor(&f.return_type);
        mc.set_return_descriptor(return_descriptor.clone());
        stmt::lower_block(body, &mut mb, &mut mc, cc)?;
        if mc.code_reachable {
            emit_default_return(&mut mb, &return_descriptor);
        }
    }
    mb.note_max_locals(mc.max_locals_watermark());
    mb.finish();
    Ok(())
}

fn emit_default_return(mb: &mut crate::classfile::writer::MethodBuilder, descriptor: &str) {
    if descriptor == "V" {
        mb.emit_return(None);
        return;
    }
    let var_type = descriptor_to_var_type(descriptor);
    match var_type {
        VarType::Object | VarType::String | VarType::StringArray => mb.emit_aconst_null(),
        VarType::Int | VarType::Boolean => mb.emit_iconst(0),
        VarType::Long => mb.emit_lconst(0),
        VarType::Double => mb.emit_dconst(0.0),
    }
    mb.emit_return(Some(var_type.opcode_family()));
}

fn declared_class_of(ty: &SurfaceType) -> Option<String> {
    match ty {
        SurfaceType::Named(name) => Some(name.clone()),
        _ => None,
    }
}

/// Turns every declared annotation into a `RuntimeVisibleAnnotations` entry
/// (spec §4.3 "Annotations"). A no-op if `annotations` is empty.
fn add_annotations(class: &mut ClassFile, annotations: &[Annotation], resolver: &ClassResolver) {
    for annotation in annotations {
        class.add_annotation(build_annotation_entry(annotation, resolver));
    }
}

fn build_annotation_entry(annotation: &Annotation, resolver: &ClassResolver) -> AnnotationEntry {
    let internal = resolver
        .resolve_class_name(&annotation.name)
        .map(|fqn| fqn.replace('.', "/"))
        .unwrap_or_else(|| annotation.name.replace('.', "/"));
    let reflected = resolver.resolve_class_name(&annotation.name).and_then(|fqn| resolver.get_class(&fqn));

    let elements = annotation
        .args
        .iter()
        .map(|(key, value)| {
            let encoded = match value {
                AnnotationValue::List(items) => AnnotationElementValue::Array(items.iter().map(literal_to_annotation_value).collect()),
                AnnotationValue::Scalar(lit) if element_expects_array(reflected.as_ref(), key) => {
                    AnnotationElementValue::Array(vec![literal_to_annotation_value(lit)])
                }
                AnnotationValue::Scalar(lit) => literal_to_annotation_value(lit),
            };
            (key.clone(), encoded)
        })
        .collect();

    AnnotationEntry { type_descriptor: format!("L{internal};"), elements }
}

/// spec §9 "Annotation element types": a scalar value destined for an
/// element whose reflected return type is an array gets wrapped in one.
fn element_expects_array(reflected: Option<&crate::resolve::class_resolver::ReflectedClass>, element_name: &str) -> bool {
    reflected
        .and_then(|class| class.methods.iter().find(|m| m.name == element_name))
        .is_some_and(|m| m.return_descriptor.starts_with('['))
}

fn literal_to_annotation_value(lit: &Literal) -> AnnotationElementValue {
    match lit {
        Literal::Int(v) => AnnotationElementValue::Int(*v as i32),
        Literal::Long(v) => AnnotationElementValue::Int(*v as i32),
        Literal::Float(v) | Literal::Double(v) => AnnotationElementValue::Double(*v),
        Literal::Bool(v) => AnnotationElementValue::Boolean(*v),
        Literal::String(s) => AnnotationElementValue::String(s.clone()),
        Literal::None => AnnotationElementValue::String(String::new()),
    }
}

fn emit_class(decl: &ClassDecl, internal_name: String, default_super: &str, registry: &Registry, resolver: &ClassResolver, config: &CodegenConfig) -> Result<ClassFileSet, EmitError> {
    let super_internal_name = decl
        .super_class
        .as_ref()
        .and_then(|s| resolver.resolve_class_name(s))
        .map(|fqn| fqn.replace('.', "/"))
        .unwrap_or_else(|| default_super.to_string());

    let mut class = ClassFile::new(internal_name.clone(), super_internal_name.clone(), config.class_file_major_version);
    for field in &decl.fields {
        class.add_field(ACC_PUBLIC, field.name.clone(), surface_descriptor(&field.ty));
    }

    let mut cc = new_class_context(internal_name.clone(), super_internal_name.clone(), registry, resolver, config);
    for field in &decl.fields {
        cc.field_types.insert(field.name.clone(), surface_descriptor(&field.ty));
    }
    for method in &decl.methods {
        let descriptor = if method.is_async {
            let params: String = method.params.iter().map(|p| surface_descriptor(&p.ty)).collect();
            format!("({params})L{};", symbols::FUTURE)
        } else {
            function_descriptor(&method.params, &method.return_type)
        };
        let return_var_type = if method.is_async { VarType::Object } else { VarType::from_surface(&method.return_type) };
        cc.function_signatures.insert(method.name.clone(), FunctionSignature { descriptor, is_static: method.is_static, return_var_type });
    }

    add_default_ctor(&mut class, &super_internal_name);
    for method in &decl.methods {
        let descriptor = cc.function_signatures.get(&method.name).unwrap().descriptor.clone();
        emit_function_method(&mut class, &mut cc, method, &method.name, &descriptor, method.is_static)?;
    }
    if decl.methods.iter().any(is_fly_entry_method) {
        emit_entry_point_main(&mut class, &internal_name);
    }
    async_lambda::flush_pending_methods(&mut class, &mut cc)?;
    add_annotations(&mut class, &decl.annotations, resolver);

    let mut out = ClassFileSet::new();
    for nested in &decl.nested {
        out.extend(emit_nested(nested, &internal_name, registry, resolver, config)?);
    }
    out.insert(internal_name, class.to_bytes());
    Ok(out)
}

/// Synthesizes `public static main([Ljava/lang/String;)V` for a class that
/// declares a `fly(args: String[])` instance method (spec §4.3, glossary
/// "Fly method"): allocate an instance, invoke `fly`, force termination
/// with `System.exit(0)`.
fn emit_entry_point_main(class: &mut ClassFile, internal_name: &str) {
    let mut mb = class.new_method(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V");
    mb.emit_new(internal_name.to_string());
    mb.emit_dup();
    mb.emit_invokespecial(internal_name.to_string(), "<init>", "()V");
    mb.emit_load(OpcodeFamily::Reference, 0);
    mb.emit_invokevirtual(internal_name.to_string(), "fly", "([Ljava/lang/String;)V");
    mb.emit_iconst(0);
    mb.emit_invokestatic("java/lang/System", "exit", "(I)V");
    mb.emit_return(None);
    mb.note_max_locals(1);
    mb.finish();
}

fn add_default_ctor(class: &mut ClassFile, super_internal_name: &str) {
    let mut mb = class.new_method(ACC_PUBLIC, "<init>", "()V");
    mb.emit_load(OpcodeFamily::Reference, 0);
    mb.emit_invokespecial(super_internal_name.to_string(), "<init>", "()V");
    mb.emit_return(None);
    mb.note_max_locals(1);
    mb.finish();
}

fn emit_interface(decl: &InterfaceDecl, internal_name: String, registry: &Registry, resolver: &ClassResolver, config: &CodegenConfig) -> Result<ClassFileSet, EmitError> {
    let mut class = ClassFile::new(internal_name.clone(), "java/lang/Object".to_string(), config.class_file_major_version);
    class.access_flags |= ACC_INTERFACE | ACC_ABSTRACT;

    let mut cc = new_class_context(internal_name.clone(), "java/lang/Object".to_string(), registry, resolver, config);
    for method in &decl.methods {
        let descriptor = function_descriptor(&method.params, &method.return_type);
        cc.function_signatures.insert(
            method.name.clone(),
            FunctionSignature { descriptor, is_static: false, return_var_type: VarType::from_surface(&method.return_type) },
        );
    }

    for method in &decl.methods {
        let descriptor = cc.function_signatures.get(&method.name).unwrap().descriptor.clone();
        if method.body.is_some() {
            emit_function_method(&mut class, &mut cc, method, &method.name, &descriptor, false)?;
        } else {
            class.new_method(ACC_PUBLIC | ACC_ABSTRACT, method.name.clone(), descriptor);
        }
    }
    async_lambda::flush_pending_methods(&mut class, &mut cc)?;

    let mut out = ClassFileSet::new();
    out.insert(internal_name, class.to_bytes());
    Ok(out)
}

/// `impl Trait for Type` gets a synthetic `Type$TraitImpl` adapter that
/// actually implements the trait interface; a bare `impl Type` (no trait)
/// keeps the static-extension-class shape below, since structs/sparks/ADTs
/// carry no methods of their own and extension methods need no interface
/// to satisfy (spec §4.3).
fn emit_impl(decl: &ImplDecl, package: &str, registry: &Registry, resolver: &ClassResolver, config: &CodegenConfig) -> Result<ClassFileSet, EmitError> {
    match &decl.trait_name {
        Some(trait_name) => emit_trait_impl(decl, trait_name, package, registry, resolver, config),
        None => emit_inherent_impl(decl, package, registry, resolver, config),
    }
}

/// `impl Trait for Type`: a `Type$TraitImpl` class implementing `Trait`,
/// carrying a `target: Type` field set by its constructor, whose methods
/// forward in terms of `target` (spec §4.3) — every `self` reference inside
/// an impl method's body resolves to `this.target`, not to the adapter
/// instance itself.
fn emit_trait_impl(
    decl: &ImplDecl,
    trait_name: &str,
    package: &str,
    registry: &Registry,
    resolver: &ClassResolver,
    config: &CodegenConfig,
) -> Result<ClassFileSet, EmitError> {
    let internal_name = if package.is_empty() {
        format!("{}$TraitImpl", pascal_case(&decl.target))
    } else {
        format!("{package}/{}$TraitImpl", pascal_case(&decl.target))
    };
    let receiver_fqn = resolver.resolve_class_name(&decl.target).unwrap_or_else(|| decl.target.clone());
    let receiver_internal = receiver_fqn.replace('.', "/");
    let receiver_descriptor = format!("L{receiver_internal};");
    let trait_fqn = resolver.resolve_class_name(trait_name).unwrap_or_else(|| trait_name.to_string());
    let trait_internal = trait_fqn.replace('.', "/");

    let mut class = ClassFile::new(internal_name.clone(), "java/lang/Object".to_string(), config.class_file_major_version);
    class.interfaces.push(trait_internal);
    class.add_field(ACC_PUBLIC | crate::classfile::writer::ACC_FINAL, "target", receiver_descriptor.clone());

    let mut ctor = class.new_method(ACC_PUBLIC, "<init>", format!("({receiver_descriptor})V"));
    ctor.emit_load(OpcodeFamily::Reference, 0);
    ctor.emit_invokespecial("java/lang/Object", "<init>", "()V");
    ctor.emit_load(OpcodeFamily::Reference, 0);
    ctor.emit_load(OpcodeFamily::Reference, 1);
    ctor.emit_putfield(internal_name.clone(), "target", receiver_descriptor.clone());
    ctor.emit_return(None);
    ctor.note_max_locals(2);
    ctor.finish();

    let mut cc = new_class_context(internal_name.clone(), "java/lang/Object".to_string(), registry, resolver, config);
    for method in &decl.methods {
        let descriptor = function_descriptor(&method.params, &method.return_type);
        cc.function_signatures.insert(
            method.name.clone(),
            FunctionSignature { descriptor, is_static: false, return_var_type: VarType::from_surface(&method.return_type) },
        );
    }

    for method in &decl.methods {
        let Some(body) = &method.body else { continue };
        let descriptor = cc.function_signatures.get(&method.name).unwrap().descriptor.clone();
        let mut mb = class.new_method(ACC_PUBLIC, method.name.clone(), descriptor.clone());
        let params_end_slot = 1 + method.params.iter().map(|p| VarType::from_surface(&p.ty).slot_size()).sum::<u16>();
        let self_slot = params_end_slot;
        let mut mc = MethodContext::new(params_end_slot + 1);

        mb.emit_load(OpcodeFamily::Reference, 0);
        mb.emit_getfield(internal_name.clone(), "target", receiver_descriptor.clone());
        mb.emit_store(OpcodeFamily::Reference, self_slot);
        mc.bind_param("self", self_slot, VarType::Object, Some(receiver_fqn.clone()));

        let mut slot = 1u16;
        for param in &method.params {
            let var_type = VarType::from_surface(&param.ty);
            mc.bind_param(param.name.clone(), slot, var_type, declared_class_of(&param.ty));
            slot += var_type.slot_size();
        }
        let return_descriptor = surface_descriptor(&method.return_type);
        mc.set_return_descriptor(return_descriptor.clone());
        stmt::lower_block(body, &mut mb, &mut mc, &mut cc)?;
        if mc.code_reachable {
            emit_default_return(&mut mb, &return_descriptor);
        }
        mb.note_max_locals(mc.max_locals_watermark());
        mb.finish();
    }
    async_lambda::flush_pending_methods(&mut class, &mut cc)?;

    let mut out = ClassFileSet::new();
    out.insert(internal_name, class.to_bytes());
    Ok(out)
}

/// `impl Target { fn method(...) }` (no trait) compiles to a
/// static-extension-method class the way Kotlin compiles top-level
/// extension functions: one `public static` method per `impl` function,
/// receiver first (spec's struct/spark/ADT declarations carry no methods
/// of their own — this is the only way to attach behavior to a value type
/// without a second, conflicting class file for the same internal name).
fn emit_inherent_impl(decl: &ImplDecl, package: &str, registry: &Registry, resolver: &ClassResolver, config: &CodegenConfig) -> Result<ClassFileSet, EmitError> {
    let internal_name = if package.is_empty() {
        format!("{}Ext", pascal_case(&decl.target))
    } else {
        format!("{package}/{}Ext", pascal_case(&decl.target))
    };
    let receiver_fqn = resolver.resolve_class_name(&decl.target).unwrap_or_else(|| decl.target.clone());
    let receiver_internal = receiver_fqn.replace('.', "/");

    let mut class = ClassFile::new(internal_name.clone(), "java/lang/Object".to_string(), config.class_file_major_version);
    let mut cc = new_class_context(internal_name.clone(), "java/lang/Object".to_string(), registry, resolver, config);

    for method in &decl.methods {
        let mut params: String = format!("L{receiver_internal};");
        params.push_str(&method.params.iter().map(|p| surface_descriptor(&p.ty)).collect::<String>());
        let descriptor = format!("({params}){}", surface_descriptor(&method.return_type));
        cc.function_signatures.insert(
            method.name.clone(),
            FunctionSignature { descriptor, is_static: true, return_var_type: VarType::from_surface(&method.return_type) },
        );
    }

    for method in &decl.methods {
        let Some(body) = &method.body else { continue };
        let descriptor = cc.function_signatures.get(&method.name).unwrap().descriptor.clone();
        let mut mb = class.new_method(ACC_PUBLIC | ACC_STATIC, method.name.clone(), descriptor.clone());
        let total_slots = 1 + method.params.iter().map(|p| VarType::from_surface(&p.ty).slot_size()).sum::<u16>();
        let mut mc = MethodContext::new(total_slots);
        mc.bind_param("self", 0, VarType::Object, Some(receiver_fqn.clone()));
        let mut slot = 1u16;
        for param in &method.params {
            let var_type = VarType::from_surface(&param.ty);
            mc.bind_param(param.name.clone(), slot, var_type, declared_class_of(&param.ty));
            slot += var_type.slot_size();
        }
        let return_descriptor = surface_descriptor(&method.return_type);
        mc.set_return_descriptor(return_descriptor.clone());
        stmt::lower_block(body, &mut mb, &mut mc, &mut cc)?;
        if mc.code_reachable {
            emit_default_return(&mut mb, &return_descriptor);
        }
        mb.note_max_locals(mc.max_locals_watermark());
        mb.finish();
    }
    async_lambda::flush_pending_methods(&mut class, &mut cc)?;

    let mut out = ClassFileSet::new();
    out.insert(internal_name, class.to_bytes());
    Ok(out)
}

fn emit_struct_decl(decl: &StructDecl, registry: &Registry, resolver: &ClassResolver, config: &CodegenConfig) -> Result<ClassFileSet, EmitError> {
    let info = registry.lookup_struct(&decl.name).expect("struct pre-registered by C4");
    let mut class = ClassFile::new(info.internal_name.clone(), "java/lang/Object".to_string(), config.class_file_major_version);
    derive::emit_struct(&mut class, info);
    add_annotations(&mut class, &decl.annotations, resolver);
    let mut out = ClassFileSet::new();
    out.insert(info.internal_name.clone(), class.to_bytes());
    Ok(out)
}

fn emit_spark_decl(decl: &SparkDecl, registry: &Registry, resolver: &ClassResolver, config: &CodegenConfig) -> Result<ClassFileSet, EmitError> {
    let info = registry.lookup_struct(&decl.name).expect("spark pre-registered by C4");
    let mut class = ClassFile::new(info.internal_name.clone(), "java/lang/Object".to_string(), config.class_file_major_version);
    let mut cc = new_class_context(info.internal_name.clone(), "java/lang/Object".to_string(), registry, resolver, config);
    derive::emit_spark(&mut class, decl, info, &mut cc)?;
    async_lambda::flush_pending_methods(&mut class, &mut cc)?;
    add_annotations(&mut class, &decl.annotations, resolver);
    let mut out = ClassFileSet::new();
    out.insert(info.internal_name.clone(), class.to_bytes());
    Ok(out)
}

fn emit_adt_decl(decl: &crate::ast::DataAdtDecl, registry: &Registry, config: &CodegenConfig) -> Result<ClassFileSet, EmitError> {
    let info = registry.lookup_adt(&decl.name).expect("ADT pre-registered by C4");
    let mut out = ClassFileSet::new();

    let mut base = ClassFile::new(info.base_internal_name.clone(), "java/lang/Object".to_string(), config.class_file_major_version);
    base.access_flags |= ACC_ABSTRACT;
    derive::emit_adt_base(&mut base, info);
    let ctor_access = ACC_PUBLIC;
    let mut base_ctor = base.new_method(ctor_access, "<init>", "()V");
    base_ctor.emit_load(OpcodeFamily::Reference, 0);
    base_ctor.emit_invokespecial("java/lang/Object", "<init>", "()V");
    base_ctor.emit_return(None);
    base_ctor.note_max_locals(1);
    base_ctor.finish();
    out.insert(info.base_internal_name.clone(), base.to_bytes());

    for variant in &info.variants {
        let mut class = ClassFile::new(variant.internal_name.clone(), info.base_internal_name.clone(), config.class_file_major_version);
        derive::emit_adt_variant(&mut class, info, variant);
        if variant.is_nullary() {
            add_singleton_field(&mut class, variant);
        }
        out.insert(variant.internal_name.clone(), class.to_bytes());
    }
    Ok(out)
}

/// A nullary variant is a singleton (spec §3 "sum types"): one `static
/// final` instance, initialized in `<clinit>`, so reference equality in
/// `pattern.rs`'s `Constructor` match arm is correct.
fn add_singleton_field(class: &mut ClassFile, variant: &crate::registry::VariantInfo) {
    class.add_field(ACC_PUBLIC | crate::classfile::writer::ACC_STATIC | crate::classfile::writer::ACC_FINAL, "INSTANCE", format!("L{};", variant.internal_name));
    let mut mb = class.new_method(ACC_STATIC, "<clinit>", "()V");
    mb.emit_new(variant.internal_name.clone());
    mb.emit_dup();
    mb.emit_invokespecial(variant.internal_name.clone(), "<init>", "()V");
    mb.emit_putstatic(variant.internal_name.clone(), "INSTANCE", format!("L{};", variant.internal_name));
    mb.emit_return(None);
    mb.note_max_locals(0);
    mb.finish();
}

/// Actors compile to a subclass of the runtime's `Actor` base class whose
/// `receive(Object)` dispatches through the declared `receive_arms` using
/// the same pattern-match machinery `match` expressions use (spec §4.6).
fn emit_actor_decl(decl: &ActorDecl, package: &str, registry: &Registry, resolver: &ClassResolver, config: &CodegenConfig) -> Result<ClassFileSet, EmitError> {
    let internal_name = if package.is_empty() { decl.name.clone() } else { format!("{package}/{}", decl.name) };
    let mut class = ClassFile::new(internal_name.clone(), symbols::ACTOR.to_string(), config.class_file_major_version);
    let mut cc = new_class_context(internal_name.clone(), symbols::ACTOR.to_string(), registry, resolver, config);

    add_default_ctor(&mut class, symbols::ACTOR);

    let mut mb = class.new_method(ACC_PUBLIC, "receive", "(Ljava/lang/Object;)V");
    let mut mc = MethodContext::new(2);
    mc.bind_param("self", 0, VarType::Object, Some(internal_name.replace('/', ".")));
    mc.bind_param("message", 1, VarType::Object, None);
    mc.set_return_descriptor("V");
    let scrutinee = Expr::Ident("message".to_string(), decl.span);
    crate::emit::pattern::lower_match(&scrutinee, &decl.receive_arms, decl.span, &mut mb, &mut mc, &mut cc)?;
    if mc.code_reachable {
        mb.emit_pop();
        mb.emit_return(None);
    }
    mb.note_max_locals(mc.max_locals_watermark());
    mb.finish();
    async_lambda::flush_pending_methods(&mut class, &mut cc)?;

    let mut out = ClassFileSet::new();
    out.insert(internal_name, class.to_bytes());
    Ok(out)
}

/// `foo(args)`: either a sibling call within the class being compiled (and
/// implicitly, a recursive self-call), a data-ADT variant constructor, or
/// an invocation of a functional value (a parameter/local holding a lambda,
/// `Supplier`/`Function`/`BiFunction`-shaped per spec §4.6).
pub fn lower_call(callee: &Expr, args: &[Expr], span: Span, mb: &mut crate::classfile::writer::MethodBuilder, mc: &mut MethodContext, cc: &mut ClassContext) -> Result<(), EmitError> {
    if let Expr::Ident(name, ident_span) = callee {
        if mc.lookup(name).is_none() {
            if let Some(sig) = cc.function_signatures.get(name).cloned() {
                if !sig.is_static {
                    mb.emit_load(OpcodeFamily::Reference, 0);
                }
                lower_args_raw(args, mb, mc, cc)?;
                if sig.is_static {
                    mb.emit_invokestatic(cc.internal_name.clone(), name.clone(), sig.descriptor.clone());
                } else {
                    mb.emit_invokevirtual(cc.internal_name.clone(), name.clone(), sig.descriptor.clone());
                }
                finish_call(mc, &sig.descriptor, sig.return_var_type);
                return Ok(());
            }

            if let Some((adt, variant)) = cc.registry.lookup_variant(name) {
                let adt = adt.clone();
                let variant = variant.clone();
                if variant.is_nullary() {
                    mb.emit_getstatic(variant.internal_name.clone(), "INSTANCE", format!("L{};", variant.internal_name));
                } else {
                    mb.emit_new(variant.internal_name.clone());
                    mb.emit_dup();
                    for (arg, field) in args.iter().zip(&variant.fields) {
                        expr::lower_expr(arg, mb, mc, cc)?;
                        coerce_to(mb, mc, descriptor_to_var_type(&field.descriptor));
                    }
                    let ctor_descriptor = format!("({})V", variant.fields.iter().map(|f| f.descriptor.clone()).collect::<String>());
                    mb.emit_invokespecial(variant.internal_name.clone(), "<init>", ctor_descriptor);
                }
                mc.last_type = VarType::Object;
                mc.last_declared_class = Some(adt.simple_name.clone());
                mc.last_call_was_void = false;
                return Ok(());
            }

            return Err(EmitError::Resolution(ResolutionError::UnresolvedSymbol { name: name.clone(), span: *ident_span }));
        }
    }

    // A functional value invoked directly: `f(args)` where `f` is a local
    // holding a lambda or higher-order parameter.
    expr::lower_expr(callee, mb, mc, cc)?;
    let (sam_owner, sam_name, sam_descriptor) = functional_interface_for_arity(args.len(), span)?;
    mb.emit_checkcast(sam_owner.to_string());
    for arg in args {
        expr::lower_expr(arg, mb, mc, cc)?;
        expr::box_current(mb, mc);
    }
    mb.emit_invokeinterface(sam_owner.to_string(), sam_name.to_string(), sam_descriptor.to_string());
    mc.last_type = VarType::Object;
    mc.last_declared_class = None;
    mc.last_call_was_void = false;
    Ok(())
}

/// `recv.method(args)`: resolved either as a same-class call (receiver
/// statically known to be `self`/the class being compiled), or through the
/// classpath oracle's reflected method set using C2's overload resolution
/// (spec §4.1, §4.2). A bare class-name receiver with no matching local
/// (`ClassName.method(args)`) is treated as a qualified static call.
pub fn lower_method_call(receiver: &Expr, method: &str, args: &[Expr], span: Span, mb: &mut crate::classfile::writer::MethodBuilder, mc: &mut MethodContext, cc: &mut ClassContext) -> Result<(), EmitError> {
    let static_receiver = match receiver {
        Expr::Ident(name, _) if mc.lookup(name).is_none() => cc.resolver.resolve_class_name(name),
        _ => None,
    };

    if let Some(fqn) = &static_receiver {
        let owner_internal = fqn.replace('.', "/");
        if owner_internal == cc.internal_name {
            if let Some(sig) = cc.function_signatures.get(method).cloned() {
                lower_args_raw(args, mb, mc, cc)?;
                mb.emit_invokestatic(cc.internal_name.clone(), method.to_string(), sig.descriptor.clone());
                finish_call(mc, &sig.descriptor, sig.return_var_type);
                return Ok(());
            }
        }
        let arg_descriptors = lower_args_and_describe(args, mb, mc, cc)?;
        let candidate = resolve_reflected(cc, fqn, method, &arg_descriptors, span)?;
        emit_resolved_invoke(mb, &candidate, false);
        finish_call_from_descriptor(mc, &candidate.descriptor, &candidate.owner_internal_name);
        return Ok(());
    }

    expr::lower_expr(receiver, mb, mc, cc)?;
    let receiver_class = mc.last_declared_class.clone();

    if let Some(declared) = &receiver_class {
        if declared.replace('.', "/") == cc.internal_name {
            if let Some(sig) = cc.function_signatures.get(method).cloned() {
                lower_args_raw(args, mb, mc, cc)?;
                if sig.is_static {
                    mb.emit_invokestatic(cc.internal_name.clone(), method.to_string(), sig.descriptor.clone());
                } else {
                    mb.emit_invokevirtual(cc.internal_name.clone(), method.to_string(), sig.descriptor.clone());
                }
                finish_call(mc, &sig.descriptor, sig.return_var_type);
                return Ok(());
            }
        }
    }

    let Some(declared) = receiver_class else {
        return Err(EmitError::Resolution(ResolutionError::UnresolvedSymbol { name: method.to_string(), span }));
    };

    // A value of a pure data type (struct/spark/ADT variant) has no
    // instance methods of its own; dispatch through its `impl`-generated
    // extension class, receiver first (spec §4.3).
    let simple = declared.rsplit('.').next().unwrap_or(&declared);
    if cc.registry.lookup_struct(simple).is_some() || cc.registry.lookup_adt(simple).is_some() {
        let ext_owner = format!("{}Ext", pascal_case_public(simple));
        // Extension methods take the receiver first; its descriptor isn't
        // reflectable (no oracle entry for a just-generated sibling class
        // within the same compilation unit), so it is reconstructed
        // directly from the call site's own argument descriptors.
        let arg_descriptors = lower_args_and_describe(args, mb, mc, cc)?;
        let mut descriptor_params = String::from("Ljava/lang/Object;");
        descriptor_params.push_str(&arg_descriptors.concat());
        let descriptor = format!("({descriptor_params})Ljava/lang/Object;");
        mb.emit_invokestatic(ext_owner, method.to_string(), descriptor);
        mc.last_type = VarType::Object;
        mc.last_declared_class = None;
        mc.last_call_was_void = false;
        return Ok(());
    }

    let arg_descriptors = lower_args_and_describe(args, mb, mc, cc)?;
    let candidate = resolve_reflected(cc, &declared, method, &arg_descriptors, span)?;
    emit_resolved_invoke(mb, &candidate, true);
    finish_call_from_descriptor(mc, &candidate.descriptor, &candidate.owner_internal_name);
    Ok(())
}

fn pascal_case_public(name: &str) -> String {
    pascal_case(name)
}

fn lower_args_raw(args: &[Expr], mb: &mut crate::classfile::writer::MethodBuilder, mc: &mut MethodContext, cc: &mut ClassContext) -> Result<(), EmitError> {
    for arg in args {
        expr::lower_expr(arg, mb, mc, cc)?;
    }
    Ok(())
}

fn lower_args_and_describe(args: &[Expr], mb: &mut crate::classfile::writer::MethodBuilder, mc: &mut MethodContext, cc: &mut ClassContext) -> Result<Vec<String>, EmitError> {
    let mut descriptors = Vec::with_capacity(args.len());
    for arg in args {
        expr::lower_expr(arg, mb, mc, cc)?;
        descriptors.push(mc.last_type.descriptor().to_string());
    }
    Ok(descriptors)
}

fn resolve_reflected(cc: &ClassContext, fqn: &str, method: &str, arg_descriptors: &[String], span: Span) -> Result<crate::resolve::method_resolver::MethodCandidate, EmitError> {
    let reflected = cc
        .resolver
        .get_class(fqn)
        .ok_or_else(|| EmitError::Resolution(ResolutionError::UnresolvedSymbol { name: fqn.to_string(), span }))?;
    let candidate = MethodResolver::resolve(method, &reflected.methods, arg_descriptors, |a, b| a == b)?;
    Ok(candidate)
}

fn emit_resolved_invoke(mb: &mut crate::classfile::writer::MethodBuilder, candidate: &crate::resolve::method_resolver::MethodCandidate, has_receiver: bool) {
    if candidate.method.is_static {
        mb.emit_invokestatic(candidate.owner_internal_name.clone(), candidate.method.name.clone(), candidate.descriptor.clone());
    } else if has_receiver {
        mb.emit_invokevirtual(candidate.owner_internal_name.clone(), candidate.method.name.clone(), candidate.descriptor.clone());
    } else {
        mb.emit_invokestatic(candidate.owner_internal_name.clone(), candidate.method.name.clone(), candidate.descriptor.clone());
    }
}

fn finish_call(mc: &mut MethodContext, descriptor: &str, return_var_type: VarType) {
    let is_void = descriptor.ends_with(")V");
    mc.last_call_was_void = is_void;
    if !is_void {
        mc.last_type = return_var_type;
    }
    mc.last_declared_class = None;
}

fn finish_call_from_descriptor(mc: &mut MethodContext, descriptor: &str, _owner_internal: &str) {
    let return_descriptor = descriptor.rsplit(')').next().unwrap_or("V");
    mc.last_call_was_void = return_descriptor == "V";
    if !mc.last_call_was_void {
        mc.last_type = descriptor_to_var_type(return_descriptor);
    }
    mc.last_declared_class = None;
}

fn coerce_to(mb: &mut crate::classfile::writer::MethodBuilder, mc: &mut MethodContext, target: VarType) {
    if mc.last_type != target {
        expr::widen_numeric(mb, mc, target);
    }
}

fn functional_interface_for_arity(arity: usize, span: Span) -> Result<(&'static str, &'static str, &'static str), EmitError> {
    match arity {
        0 => Ok(("java/util/function/Supplier", "get", "()Ljava/lang/Object;")),
        1 => Ok(("java/util/function/Function", "apply", "(Ljava/lang/Object;)Ljava/lang/Object;")),
        2 => Ok(("java/util/function/BiFunction", "apply", "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;")),
        _ => Err(EmitError::Unsupported { message: format!("calling a functional value with {arity} arguments is not supported"), span }),
    }
}
