//! C5–C8: the declaration, expression/statement, pattern-match, and
//! async/lambda lowerers, plus the shared per-method emission context (spec
//! §3 "Current-method context", §9 "Ownership of the emission context").

pub mod async_lambda;
pub mod debug;
pub mod decl;
pub mod derive;
pub mod expr;
pub mod pattern;
pub mod stmt;

use std::collections::HashMap;

use thiserror::Error;

use crate::classfile::writer::BranchTarget;
use crate::span::Span;
use crate::types::VarType;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    Resolution(#[from] crate::resolve::ResolutionError),
    #[error(transparent)]
    Overload(#[from] crate::resolve::OverloadError),
    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),
    #[error("pattern codegen failed at {span:?}: {message}")]
    PatternCodegen { message: String, span: Span },
    #[error("type mismatch at {span:?}: {message}")]
    TypeMismatch { message: String, span: Span },
    #[error("`break`/`continue` used outside a loop at {span:?}")]
    LoopControlOutsideLoop { span: Span },
    #[error("internal verifier failure in {class}::{method}: {message}")]
    VerifierInternal { class: String, method: String, message: String },
    #[error("unsupported construct at {span:?}: {message}")]
    Unsupported { message: String, span: Span },
}

/// A declared local variable: its slot, value category, and (for instance
/// dispatch on Firefly-declared classes) the Firefly class it was declared
/// with, so a later `recv.m(...)` call can resolve without re-inferring
/// the receiver's type from scratch.
#[derive(Debug, Clone)]
pub struct LocalVar {
    pub slot: u16,
    pub var_type: VarType,
    pub declared_class: Option<String>,
}

/// Pending forward branches for one loop nesting level, patched once the
/// loop's continue-target (the condition re-check) and break-target (the
/// loop exit) locations are known.
#[derive(Default)]
pub struct LoopLabels {
    pub break_targets: Vec<BranchTarget>,
    pub continue_targets: Vec<BranchTarget>,
}

/// The current-method context (spec §3): local slots, reachability, and
/// the loop-label stack. Established at method entry, mutated during
/// lowering, and saved/restored around nested emission (lambda bodies,
/// async helpers, computed properties) per spec §9.
pub struct MethodContext {
    locals: HashMap<String, LocalVar>,
    next_slot: u16,
    loop_stack: Vec<LoopLabels>,
    /// Flipped false after `return`/`throw`/`break`/`continue`; straight-line
    /// emission is suppressed until the next label (spec §4.4 "Reachability").
    pub code_reachable: bool,
    /// The value category last pushed onto the (virtual) operand stack,
    /// threaded through expression lowering so callers know what sits on
    /// top without modeling the stack themselves.
    pub last_type: VarType,
    /// When the last-produced value is known to be an instance of a
    /// specific Firefly-declared class (not just `Object`), its dotted
    /// name, for instance-method overload resolution.
    pub last_declared_class: Option<String>,
    /// Set by `decl::lower_call`/`lower_method_call` whenever the callee's
    /// descriptor returns `V`: such a call pushes nothing, so an enclosing
    /// expression-statement must not try to pop a value that was never
    /// produced.
    pub last_call_was_void: bool,
    /// The enclosing method's declared return descriptor, set once at
    /// method entry by `decl.rs`; `stmt::lower_return` coerces a `return`
    /// expression's value to this before emitting the return opcode.
    pub return_descriptor: Option<String>,
}

impl MethodContext {
    pub fn new(starting_slot: u16) -> Self {
        Self {
            locals: HashMap::new(),
            next_slot: starting_slot,
            loop_stack: Vec::new(),
            code_reachable: true,
            last_type: VarType::Object,
            last_declared_class: None,
            last_call_was_void: false,
            return_descriptor: None,
        }
    }

    /// Record the enclosing method's declared return descriptor, used to
    /// coerce `return` expressions (spec §4.3).
    pub fn set_return_descriptor(&mut self, descriptor: impl Into<String>) {
        self.return_descriptor = Some(descriptor.into());
    }

    /// Bind a parameter at a known slot without advancing the allocator
    /// past where the caller has already placed it (used for `self` and
    /// formal parameters, which occupy fixed leading slots).
    pub fn bind_param(&mut self, name: impl Into<String>, slot: u16, var_type: VarType, declared_class: Option<String>) {
        self.locals.insert(name.into(), LocalVar { slot, var_type, declared_class });
    }

    /// Allocate the next free slot(s) for a new local and bind `name` to it.
    pub fn declare_local(&mut self, name: impl Into<String>, var_type: VarType, declared_class: Option<String>) -> u16 {
        let slot = self.next_slot;
        self.next_slot += var_type.slot_size();
        self.locals.insert(name.into(), LocalVar { slot, var_type, declared_class });
        slot
    }

    /// Allocate an anonymous temporary slot (spill slots used by string
    /// concatenation, arm-result boxing, capture lists, etc).
    pub fn alloc_temp(&mut self, var_type: VarType) -> u16 {
        let slot = self.next_slot;
        self.next_slot += var_type.slot_size();
        slot
    }

    pub fn lookup(&self, name: &str) -> Option<&LocalVar> {
        self.locals.get(name)
    }

    pub fn max_locals_watermark(&self) -> u16 {
        self.next_slot
    }

    pub fn push_loop(&mut self) {
        self.loop_stack.push(LoopLabels::default());
    }

    pub fn pop_loop(&mut self) -> LoopLabels {
        self.loop_stack.pop().expect("pop_loop without matching push_loop")
    }

    pub fn current_loop_mut(&mut self) -> Option<&mut LoopLabels> {
        self.loop_stack.last_mut()
    }

    pub fn in_loop(&self) -> bool {
        !self.loop_stack.is_empty()
    }
}

/// Per-class emission state shared by every method body lowered for one
/// declaration: field descriptors (for `GETFIELD`/`PUTFIELD`) and every
/// method's pre-registered descriptor (so self-calls and mutual recursion
/// resolve regardless of declaration order, spec §9).
pub struct ClassContext<'a> {
    pub internal_name: String,
    pub super_internal_name: String,
    pub field_types: HashMap<String, String>,
    pub function_signatures: HashMap<String, FunctionSignature>,
    pub registry: &'a crate::registry::Registry,
    pub resolver: &'a crate::resolve::ClassResolver,
    pub config: &'a crate::pipeline::CodegenConfig,
    /// Synthetic static helper methods (lambda bodies, async-function
    /// helpers) discovered while lowering a method body. A `MethodBuilder`
    /// holds the class file's only mutable borrow, so these cannot be
    /// compiled in place; `decl.rs` drains this queue with
    /// `async_lambda::flush_pending_methods` once the enclosing method's
    /// builder has been dropped (spec §4.6).
    pub pending_methods: Vec<PendingSyntheticMethod>,
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub descriptor: String,
    pub is_static: bool,
    pub return_var_type: VarType,
}

/// A captured local, recorded in declaration order so the synthetic
/// method's parameter list and its call site's captured-argument list
/// agree on order without a second lookup.
#[derive(Debug, Clone)]
pub struct CapturedLocal {
    pub name: String,
    pub var_type: VarType,
    pub slot: u16,
}

#[derive(Debug, Clone)]
pub enum SyntheticMethodKind {
    /// A lambda body compiled to `static Object lambda$N(captures..., params...)`.
    Lambda {
        captures: Vec<CapturedLocal>,
        params: Vec<String>,
        body: crate::ast::Expr,
    },
    /// The body of an `async fn`/`async` method, split out so the
    /// outer declared method can wrap its result in a `Future` (spec §4.6).
    AsyncBody {
        captures: Vec<CapturedLocal>,
        params: Vec<(String, VarType)>,
        body: crate::ast::Block,
        return_var_type: VarType,
    },
}

#[derive(Debug, Clone)]
pub struct PendingSyntheticMethod {
    pub name: String,
    pub descriptor: String,
    pub kind: SyntheticMethodKind,
}
