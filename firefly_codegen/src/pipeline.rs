//! The top-level entry point: wires C1–C8 together over one compilation
//! unit and produces the generated class file set plus any diagnostics
//! (spec §7's propagation policy — one declaration's failure does not
//! abort its siblings).

use thiserror::Error;

use crate::ast::CompilationUnit;
use crate::classfile::ClassFileSet;
use crate::error::diagnostic::Diagnostic;
use crate::registry::{Registry, RegistryError};
use crate::resolve::class_resolver::ClasspathOracle;
use crate::resolve::ClassResolver;

/// Configuration knobs the back end needs beyond what the AST itself
/// carries (spec's ambient engineering surface; see `SPEC_FULL.md`
/// [EXPANSION] 2).
#[derive(Debug, Clone)]
pub struct CodegenConfig {
    /// Class file major version; 52 (Java 8) per spec §6. Overridable only
    /// for testing against other targets.
    pub class_file_major_version: u16,
    /// Whether `LineNumberTable` entries are emitted from each AST node's
    /// `Span`; the one source-debugging aid §1's non-goals allow.
    pub emit_line_numbers: bool,
    /// Internal name of the executor the async lowerer targets (spec §4.6).
    pub executor_symbol: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            class_file_major_version: crate::classfile::writer::DEFAULT_MAJOR_VERSION,
            emit_line_numbers: true,
            executor_symbol: "java/util/concurrent/ForkJoinPool".to_string(),
        }
    }
}

impl CodegenConfig {
    /// Reads `FIREFLYC_CLASS_VERSION`, `FIREFLYC_LINE_NUMBERS`, and
    /// `FIREFLYC_EXECUTOR` overrides on top of the defaults, following the
    /// teacher's `LoaderConfig::from_env()` convention of letting
    /// environment variables override defaults without plumbing a config
    /// file through the API.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("FIREFLYC_CLASS_VERSION") {
            if let Ok(parsed) = v.parse() {
                config.class_file_major_version = parsed;
            }
        }
        if let Ok(v) = std::env::var("FIREFLYC_LINE_NUMBERS") {
            config.emit_line_numbers = v != "0" && v.to_lowercase() != "false";
        }
        if let Ok(v) = std::env::var("FIREFLYC_EXECUTOR") {
            config.executor_symbol = v;
        }
        config
    }
}

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Compile one unit end to end: pre-register struct/spark/ADT metadata
/// (C4), then emit every top-level declaration (C5, recursing into C6–C8
/// as needed). A declaration whose emission fails is recorded as a
/// `Diagnostic` and skipped; emission of its siblings continues (spec §7).
/// Only the C4 prepass can abort the whole unit, since a duplicate
/// registration makes every later lookup unreliable.
pub fn compile_unit(
    unit: &CompilationUnit,
    oracle: Box<dyn ClasspathOracle>,
    config: &CodegenConfig,
) -> Result<(ClassFileSet, Vec<Diagnostic>), CodegenError> {
    let registry = Registry::build(unit)?;
    let resolver = ClassResolver::new(&unit.module, &unit.uses, oracle);

    let mut classes = ClassFileSet::new();
    let mut diagnostics = Vec::new();

    for decl in &unit.declarations {
        match crate::emit::decl::emit_top_level(decl, &unit.module, &registry, &resolver, config) {
            Ok(emitted) => classes.extend(emitted),
            Err(err) => diagnostics.push(Diagnostic::error(
                err.to_string(),
                decl.span(),
                decl.simple_name().to_string(),
            )),
        }
    }

    Ok((classes, diagnostics))
}
