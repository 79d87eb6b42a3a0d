//! C1 — the Type Resolver.
//!
//! Maps simple names used in source to fully qualified class names and
//! (when loadable) reflected member information. The back end has no JVM
//! of its own to reflect against, so classpath lookups are delegated to a
//! host-supplied [`ClasspathOracle`] — in production this is backed by a
//! real `java.lang.Class` reflection bridge; in tests it is a small
//! in-memory fixture. Positive and negative lookups are cached either way
//! (spec §4.1: "loads via the host's class-loading facility, caching
//! results (positive and negative)").

use std::cell::RefCell;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A class or interface as seen through reflection: just enough shape for
/// C2's overload resolution and C7's field/variant introspection.
///
/// `Serialize`/`Deserialize` let the `fireflyc` CLI load a classpath
/// fixture as JSON (`--classpath`) the same way `ast::CompilationUnit`
/// loads the unit itself, rather than requiring a live reflection bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectedClass {
    pub fqn: String,
    pub internal_name: String,
    pub methods: Vec<crate::resolve::method_resolver::ReflectedMethod>,
    pub fields: Vec<ReflectedField>,
    /// Nested class simple names, for `resolveVariantNestedClass`.
    pub nested_classes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectedField {
    pub name: String,
    pub descriptor: String,
    pub is_static: bool,
}

/// Host-supplied classpath lookup. The back end never loads classes
/// itself; it only asks this oracle whether a fully-qualified name exists
/// and, if so, for its reflected shape.
pub trait ClasspathOracle {
    fn load_class(&self, fqn: &str) -> Option<ReflectedClass>;
}

/// A `ClasspathOracle` backed by an explicit in-memory table, used by
/// tests and by the `fireflyc` CLI when no live classpath bridge is wired
/// up (it can still resolve declarations local to the compilation unit).
#[derive(Default)]
pub struct FixtureOracle {
    pub classes: HashMap<String, ReflectedClass>,
}

impl ClasspathOracle for FixtureOracle {
    fn load_class(&self, fqn: &str) -> Option<ReflectedClass> {
        self.classes.get(fqn).cloned()
    }
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("unresolved symbol `{name}`")]
    UnresolvedSymbol { name: String, span: crate::span::Span },
    #[error("unresolved variant `{name}`")]
    UnresolvedVariant { name: String, span: crate::span::Span },
}

static JDK_SHORT_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("ArrayList", "java.util.ArrayList"),
        ("HashMap", "java.util.HashMap"),
        ("HashSet", "java.util.HashSet"),
        ("LinkedList", "java.util.LinkedList"),
        ("List", "java.util.List"),
        ("Map", "java.util.Map"),
        ("Set", "java.util.Set"),
        ("Iterator", "java.util.Iterator"),
        ("Optional", "java.util.Optional"),
        ("String", "java.lang.String"),
        ("StringBuilder", "java.lang.StringBuilder"),
        ("Object", "java.lang.Object"),
        ("Integer", "java.lang.Integer"),
        ("Long", "java.lang.Long"),
        ("Double", "java.lang.Double"),
        ("Boolean", "java.lang.Boolean"),
        ("Math", "java.lang.Math"),
        ("System", "java.lang.System"),
        ("Thread", "java.lang.Thread"),
        ("Runnable", "java.lang.Runnable"),
        ("Callable", "java.util.concurrent.Callable"),
        ("Future", "java.util.concurrent.Future"),
        ("Exception", "java.lang.Exception"),
        ("Throwable", "java.lang.Throwable"),
        ("RuntimeException", "java.lang.RuntimeException"),
    ]
    .into_iter()
    .collect()
});

/// Built-in Firefly standard-library hints (spec §4.1 item (e)).
static FIREFLY_STD_HINTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("Option", "firefly.std.option.Option"),
        ("Some", "firefly.std.option.Option"),
        ("None", "firefly.std.option.Option"),
        ("Result", "firefly.std.result.Result"),
        ("Ok", "firefly.std.result.Result"),
        ("Err", "firefly.std.result.Result"),
    ]
    .into_iter()
    .collect()
});

pub struct ClassResolver {
    explicit_imports: Vec<String>,
    wildcard_imports: Vec<String>,
    current_module_package: String,
    oracle: Box<dyn ClasspathOracle>,
    cache: RefCell<HashMap<String, Option<ReflectedClass>>>,
}

impl ClassResolver {
    pub fn new(module: &str, uses: &[crate::ast::UseDecl], oracle: Box<dyn ClasspathOracle>) -> Self {
        let mut explicit_imports = Vec::new();
        let mut wildcard_imports = Vec::new();
        for u in uses {
            if u.wildcard {
                wildcard_imports.push(u.path.clone());
            } else {
                explicit_imports.push(u.path.clone());
            }
        }
        Self {
            explicit_imports,
            wildcard_imports,
            current_module_package: module.to_string(),
            oracle,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// spec §4.1: search order (a) explicit imports, (b) current-module
    /// package, (c) wildcard imports, (d) JDK short names, (e) Firefly std
    /// hints, (f) heuristic dotted-as-is fallback.
    pub fn resolve_class_name(&self, simple: &str) -> Option<String> {
        if simple.contains('.') {
            // Already dotted: try it directly first (still subject to the
            // search order below for a bare last-segment match).
            if self.get_class(simple).is_some() {
                return Some(simple.to_string());
            }
        }

        for import in &self.explicit_imports {
            if last_segment(import) == simple {
                return Some(import.clone());
            }
        }

        let module_candidate = format!("{}.{}", self.current_module_package, simple);
        if self.get_class(&module_candidate).is_some() {
            return Some(module_candidate);
        }

        for wildcard in &self.wildcard_imports {
            let candidate = format!("{}.{}", wildcard, simple);
            if self.get_class(&candidate).is_some() {
                return Some(candidate);
            }
        }

        if let Some(fqn) = JDK_SHORT_NAMES.get(simple) {
            return Some((*fqn).to_string());
        }

        if let Some(fqn) = FIREFLY_STD_HINTS.get(simple) {
            return Some((*fqn).to_string());
        }

        if simple.contains('.') {
            return Some(simple.to_string());
        }

        None
    }

    /// Loads (and caches, positively or negatively) the reflected shape of
    /// a fully qualified class name.
    pub fn get_class(&self, fqn: &str) -> Option<ReflectedClass> {
        if let Some(cached) = self.cache.borrow().get(fqn) {
            return cached.clone();
        }
        let loaded = self.oracle.load_class(fqn);
        self.cache.borrow_mut().insert(fqn.to_string(), loaded.clone());
        loaded
    }

    /// spec §4.1: try each explicit import as an enclosing class and probe
    /// for a nested `Enclosing$simple`.
    pub fn resolve_variant_nested_class(&self, simple: &str) -> Option<String> {
        for import in &self.explicit_imports {
            let internal_enclosing = import.replace('.', "/");
            let candidate = format!("{}${}", internal_enclosing, simple);
            if self.get_class(&candidate.replace('/', ".").replace('$', ".")).is_some() {
                return Some(candidate);
            }
        }
        None
    }

    pub fn module_package(&self) -> &str {
        &self.current_module_package
    }
}

fn last_segment(dotted: &str) -> &str {
    dotted.rsplit('.').next().unwrap_or(dotted)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::span::Span;

    fn use_decl(path: &str, wildcard: bool) -> crate::ast::UseDecl {
        crate::ast::UseDecl {
            path: path.to_string(),
            wildcard,
            span: Span::synthetic(),
        }
    }

    #[test]
    fn explicit_import_wins_over_jdk_shortname() {
        let uses = vec![use_decl("com.example.List", false)];
        let resolver = ClassResolver::new("app", &uses, Box::new(FixtureOracle::default()));
        assert_eq!(resolver.resolve_class_name("List"), Some("com.example.List".to_string()));
    }

    #[test]
    fn falls_back_to_jdk_shortname() {
        let resolver = ClassResolver::new("app", &[], Box::new(FixtureOracle::default()));
        assert_eq!(resolver.resolve_class_name("ArrayList"), Some("java.util.ArrayList".to_string()));
    }

    #[test]
    fn falls_back_to_firefly_std_hint() {
        let resolver = ClassResolver::new("app", &[], Box::new(FixtureOracle::default()));
        assert_eq!(resolver.resolve_class_name("Option"), Some("firefly.std.option.Option".to_string()));
    }

    #[test]
    fn unknown_bare_name_is_unresolved() {
        let resolver = ClassResolver::new("app", &[], Box::new(FixtureOracle::default()));
        assert_eq!(resolver.resolve_class_name("Frobnicator"), None);
    }
}
