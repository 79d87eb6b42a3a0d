//! Error taxonomy (spec §7), one `thiserror` enum per fallible stage,
//! composing upward via `#[from]`/`#[source]` into [`crate::pipeline::CodegenError`].

pub mod diagnostic;

pub use diagnostic::{Diagnostic, Severity};
pub use crate::registry::RegistryError;
pub use crate::resolve::{OverloadError, ResolutionError};
pub use crate::emit::EmitError;
