//! C1 (Type Resolver) and C2 (Method Resolver).

pub mod class_resolver;
pub mod method_resolver;

pub use class_resolver::{ClassResolver, ReflectedClass, ReflectedField, ResolutionError};
pub use method_resolver::{
    Conversion, MethodCandidate, MethodResolver, OverloadError, ReflectedMethod,
};
