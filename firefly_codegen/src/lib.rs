#![deny(clippy::print_stderr)]

//! Code-generation back end of the Firefly compiler.
//!
//! Consumes a fully parsed, annotated [`ast::CompilationUnit`] and emits one
//! JVM class file per declaration (and per nested declaration, ADT variant,
//! trait-impl adapter, and synthesized helper), targeting class file version
//! 52 (Java 8). The front end (lexer, parser, semantic analysis, type
//! inference, import resolution) is out of scope: by the time a
//! [`ast::CompilationUnit`] reaches this crate, every sub-expression already
//! carries a resolved [`ast::SurfaceType`].

pub mod ast;
pub mod classfile;
pub mod emit;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod resolve;
pub mod span;
pub mod types;

pub use pipeline::{compile_unit, CodegenConfig, CodegenError};
