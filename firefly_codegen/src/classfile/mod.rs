//! The JVM class file writer. Grounded on the pack's `jvlm` classfile
//! module (constant pool interning, virtual-stack-tracked method writer,
//! same/same-extended/full stack map frame encoding), extended with the
//! `invokedynamic`/`LambdaMetafactory` bootstrap support C8 needs and a
//! test-only reader so invariants from spec §8 can be checked against the
//! emitter's own bytes without a JVM.

pub mod constant_pool;
pub mod descriptor;
pub mod opcodes;
pub mod stackmap;
pub mod writer;

#[cfg(any(test, feature = "test-support"))]
pub mod reader;

use std::collections::HashMap;

pub use writer::{AnnotationElementValue, AnnotationEntry, ClassFile, CodeLocation, MethodBuilder};

/// The generated artifact (spec §3): internal class name → class file bytes.
pub type ClassFileSet = HashMap<String, Vec<u8>>;
