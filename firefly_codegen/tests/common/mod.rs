//! Shared fixture builders for the scenario tests in this directory.
//! Keeps each scenario file focused on the AST shape and assertions that
//! are specific to it rather than on `CompilationUnit` plumbing.

use std::collections::HashMap;

use firefly_codegen::ast::*;
use firefly_codegen::classfile::reader::{self, ParsedClass};
use firefly_codegen::classfile::ClassFileSet;
use firefly_codegen::error::Diagnostic;
use firefly_codegen::pipeline::{compile_unit, CodegenConfig};
use firefly_codegen::resolve::class_resolver::{ClasspathOracle, FixtureOracle, ReflectedClass, ReflectedField};
use firefly_codegen::resolve::method_resolver::ReflectedMethod;
use firefly_codegen::span::Span;
use firefly_codegen::types::PrimitiveKind;

pub fn span() -> Span {
    Span::synthetic()
}

pub fn unit(module: &str, uses: Vec<UseDecl>, declarations: Vec<Declaration>) -> CompilationUnit {
    CompilationUnit { module: module.to_string(), uses, declarations }
}

pub fn use_decl(path: &str, wildcard: bool) -> UseDecl {
    UseDecl { path: path.to_string(), wildcard, span: span() }
}

pub fn derive_annotation(trait_names: Vec<&str>) -> Annotation {
    Annotation {
        name: "derive".to_string(),
        args: vec![("value".to_string(), AnnotationValue::List(trait_names.into_iter().map(|n| Literal::String(n.to_string())).collect()))],
        span: span(),
    }
}

pub fn param(name: &str, ty: SurfaceType) -> Param {
    Param { name: name.to_string(), ty, span: span() }
}

pub fn ty_named(name: &str) -> SurfaceType {
    SurfaceType::Named(name.to_string())
}

pub fn ty_array(element: SurfaceType) -> SurfaceType {
    SurfaceType::Array(Box::new(element))
}

pub fn ty_string() -> SurfaceType {
    SurfaceType::Primitive(PrimitiveKind::String)
}

// `VarType::from_surface`'s `StringArray` category is matched structurally
// against `Array(Primitive(String))`; an element modeled as `Named("String")`
// would fall through to the generic `Object` category instead; see the
// "array of string" unit test in `types.rs`.
pub fn ty_string_array() -> SurfaceType {
    ty_array(ty_string())
}

pub fn ty_int() -> SurfaceType {
    SurfaceType::Primitive(PrimitiveKind::Int)
}

pub fn ty_bool() -> SurfaceType {
    SurfaceType::Primitive(PrimitiveKind::Bool)
}

pub fn ty_void() -> SurfaceType {
    SurfaceType::void()
}

pub fn block(statements: Vec<Stmt>) -> Block {
    Block { statements, span: span() }
}

pub fn expr_stmt(e: Expr) -> Stmt {
    Stmt::Expr(e)
}

pub fn let_stmt(pattern: Pattern, declared_type: Option<SurfaceType>, value: Expr) -> Stmt {
    Stmt::Let { pattern, declared_type, value, span: span() }
}

pub fn return_stmt(value: Option<Expr>) -> Stmt {
    Stmt::Return(value, span())
}

#[allow(clippy::too_many_arguments)]
pub fn fn_decl(
    name: &str,
    is_static: bool,
    is_async: bool,
    params: Vec<Param>,
    return_type: SurfaceType,
    body: Option<Block>,
) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        visibility: Visibility::Public,
        is_static,
        is_async,
        type_params: Vec::new(),
        params,
        return_type,
        body,
        annotations: Vec::new(),
        span: span(),
    }
}

pub fn class_decl(name: &str, methods: Vec<FunctionDecl>, nested: Vec<Declaration>) -> ClassDecl {
    ClassDecl {
        name: name.to_string(),
        visibility: Visibility::Public,
        type_params: Vec::new(),
        super_class: None,
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods,
        nested,
        annotations: Vec::new(),
        span: span(),
    }
}

pub fn struct_decl(name: &str, fields: Vec<(String, SurfaceType)>) -> StructDecl {
    StructDecl { name: name.to_string(), visibility: Visibility::Public, fields, annotations: Vec::new(), span: span() }
}

pub fn data_adt_decl(name: &str, variants: Vec<AdtVariant>) -> DataAdtDecl {
    DataAdtDecl { name: name.to_string(), visibility: Visibility::Public, variants, span: span() }
}

pub fn adt_variant(name: &str, fields: Vec<(String, SurfaceType)>) -> AdtVariant {
    AdtVariant { name: name.to_string(), fields, span: span() }
}

pub fn computed_property(name: &str, return_type: SurfaceType, body: Vec<Stmt>) -> ComputedProperty {
    ComputedProperty { name: name.to_string(), return_type, body: block(body), span: span() }
}

pub fn spark_decl(
    name: &str,
    fields: Vec<(String, SurfaceType)>,
    computed_properties: Vec<ComputedProperty>,
    validate: Option<Block>,
    travelable: bool,
) -> SparkDecl {
    SparkDecl {
        name: name.to_string(),
        visibility: Visibility::Public,
        fields,
        computed_properties,
        validate,
        travelable,
        annotations: Vec::new(),
        span: span(),
    }
}

pub fn lit_string(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.to_string()), span())
}

pub fn lit_int(v: i64) -> Expr {
    Expr::Literal(Literal::Int(v), span())
}

pub fn ident(name: &str) -> Expr {
    Expr::Ident(name.to_string(), span())
}

pub fn self_expr() -> Expr {
    Expr::SelfExpr(span())
}

pub fn field_access(receiver: Expr, field: &str) -> Expr {
    Expr::FieldAccess { receiver: Box::new(receiver), field: field.to_string(), span: span() }
}

pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span: span() }
}

pub fn static_field(class_name: &str, field: &str) -> Expr {
    Expr::StaticFieldAccess { class_name: class_name.to_string(), field: field.to_string(), span: span() }
}

pub fn method_call(receiver: Expr, method: &str, args: Vec<Expr>) -> Expr {
    Expr::MethodCall { receiver: Box::new(receiver), method: method.to_string(), args, span: span() }
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call { callee: Box::new(callee), args, span: span() }
}

pub fn match_expr(scrutinee: Expr, arms: Vec<MatchArm>) -> Expr {
    Expr::Match { scrutinee: Box::new(scrutinee), arms, span: span() }
}

pub fn match_arm(pattern: Pattern, guard: Option<Expr>, body: Expr) -> MatchArm {
    MatchArm { pattern, guard, body, span: span() }
}

pub fn await_expr(operand: Expr) -> Expr {
    Expr::Unary { op: UnOp::Await, operand: Box::new(operand), span: span() }
}

pub fn pat_var(name: &str) -> Pattern {
    Pattern::Variable(name.to_string(), span())
}

pub fn throw_stmt(e: Expr) -> Stmt {
    Stmt::Throw(e, span())
}

pub fn try_stmt(body: Vec<Stmt>, catches: Vec<CatchClause>, finally: Option<Vec<Stmt>>) -> Stmt {
    Stmt::Try { body: block(body), catches, finally: finally.map(block), span: span() }
}

pub fn catch_clause(binding: &str, exception_type: SurfaceType, body: Vec<Stmt>) -> CatchClause {
    CatchClause { binding: binding.to_string(), exception_type, body: block(body), span: span() }
}

pub fn reflected_method(name: &str, is_static: bool, params: Vec<&str>, return_descriptor: &str, owner_internal_name: &str) -> ReflectedMethod {
    ReflectedMethod {
        name: name.to_string(),
        is_static,
        params: params.into_iter().map(String::from).collect(),
        is_varargs: false,
        return_descriptor: return_descriptor.to_string(),
        owner_internal_name: owner_internal_name.to_string(),
    }
}

pub fn reflected_field(name: &str, descriptor: &str, is_static: bool) -> ReflectedField {
    ReflectedField { name: name.to_string(), descriptor: descriptor.to_string(), is_static }
}

pub fn reflected_class(fqn: &str, internal_name: &str, methods: Vec<ReflectedMethod>, fields: Vec<ReflectedField>) -> ReflectedClass {
    ReflectedClass { fqn: fqn.to_string(), internal_name: internal_name.to_string(), methods, fields, nested_classes: Vec::new() }
}

pub fn oracle_with(classes: Vec<ReflectedClass>) -> FixtureOracle {
    let mut map: HashMap<String, ReflectedClass> = HashMap::new();
    for class in classes {
        map.insert(class.fqn.clone(), class);
    }
    FixtureOracle { classes: map }
}

/// Runs the full pipeline with the default `CodegenConfig`; only the C4
/// registry prepass can hard-fail `compile_unit` itself (duplicate
/// struct/spark/ADT registration), so every other failure shows up as a
/// `Diagnostic` in the returned list rather than an `Err`.
pub fn compile(u: &CompilationUnit, oracle: FixtureOracle) -> (ClassFileSet, Vec<Diagnostic>) {
    compile_unit(u, Box::new(oracle) as Box<dyn ClasspathOracle>, &CodegenConfig::default()).expect("registry prepass should not fail for a fixture unit")
}

pub fn parse<'a>(classes: &'a ClassFileSet, internal_name: &str) -> ParsedClass {
    let bytes = classes
        .get(internal_name)
        .unwrap_or_else(|| panic!("no class file emitted for `{internal_name}`; emitted: {:?}", classes.keys().collect::<Vec<_>>()));
    reader::parse(bytes)
}

pub fn is_static_method(access_flags: u16) -> bool {
    access_flags & firefly_codegen::classfile::writer::ACC_STATIC != 0
}
