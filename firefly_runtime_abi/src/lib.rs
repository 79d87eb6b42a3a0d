//! Typed catalog of the Firefly JVM runtime library's ABI.
//!
//! The runtime library itself (`com/firefly/runtime/...`) is an external
//! collaborator of the code-generation back end: its classes are written
//! once, live on the target classpath, and are never emitted by the
//! compiler. What the back end *does* need is a single, typo-proof source
//! of truth for the internal names, method descriptors, and field
//! descriptors it calls into when lowering `async`, `Future`, actor, range,
//! and reference constructs. That catalog is this crate.
//!
//! Keeping it as its own crate (rather than a module inside
//! `firefly_codegen`) means the emitter and the test suite both consume the
//! same constants, so a typo in a descriptor string fails exactly one way.

pub mod symbols;

pub use symbols::*;
