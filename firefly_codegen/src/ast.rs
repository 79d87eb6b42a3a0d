//! The read-only input tree this crate consumes (spec §3).
//!
//! Everything here is produced by the (out-of-scope) parser and semantic
//! analyzer; the back end never mutates it. `serde` derives let the
//! `fireflyc` CLI and the test suite load a compilation unit from JSON
//! without a front end.

use serde::{Deserialize, Serialize};

use crate::span::Span;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationUnit {
    /// Dotted module name, e.g. `"app.models"`.
    pub module: String,
    pub uses: Vec<UseDecl>,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UseDecl {
    /// Dotted path. `wildcard` means the final segment was `*`.
    pub path: String,
    pub wildcard: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<(String, AnnotationValue)>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnnotationValue {
    Scalar(Literal),
    List(Vec<Literal>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub bounds: Vec<SurfaceType>,
}

/// Firefly surface type, post type-inference (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SurfaceType {
    Primitive(crate::types::PrimitiveKind),
    /// A resolved or about-to-be-resolved simple/dotted name.
    Named(String),
    Generic(Box<SurfaceType>, Vec<SurfaceType>),
    Optional(Box<SurfaceType>),
    Array(Box<SurfaceType>),
    Function(Vec<SurfaceType>, Box<SurfaceType>),
    Tuple(Vec<SurfaceType>),
    TypeParam(String, Vec<SurfaceType>),
}

impl SurfaceType {
    pub fn void() -> Self {
        SurfaceType::Primitive(crate::types::PrimitiveKind::Void)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, SurfaceType::Primitive(crate::types::PrimitiveKind::Void))
    }
}

/// One top-level (or nested) declaration. Tagged union per spec §3/§9:
/// implementers are told to use a closed sum type rather than an open
/// hierarchy, so this is a plain enum dispatched on by `emit::decl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Declaration {
    Function(FunctionDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Trait(InterfaceDecl),
    Impl(ImplDecl),
    Struct(StructDecl),
    Spark(SparkDecl),
    DataAdt(DataAdtDecl),
    Exception(ClassDecl),
    Actor(ActorDecl),
    TypeAlias(TypeAliasDecl),
    Use(UseDecl),
}

impl Declaration {
    pub fn simple_name(&self) -> &str {
        match self {
            Declaration::Function(d) => &d.name,
            Declaration::Class(d) => &d.name,
            Declaration::Interface(d) => &d.name,
            Declaration::Trait(d) => &d.name,
            Declaration::Impl(d) => &d.target,
            Declaration::Struct(d) => &d.name,
            Declaration::Spark(d) => &d.name,
            Declaration::DataAdt(d) => &d.name,
            Declaration::Exception(d) => &d.name,
            Declaration::Actor(d) => &d.name,
            Declaration::TypeAlias(d) => &d.name,
            Declaration::Use(_) => "",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Declaration::Function(d) => d.span,
            Declaration::Class(d) => d.span,
            Declaration::Interface(d) => d.span,
            Declaration::Trait(d) => d.span,
            Declaration::Impl(d) => d.span,
            Declaration::Struct(d) => d.span,
            Declaration::Spark(d) => d.span,
            Declaration::DataAdt(d) => d.span,
            Declaration::Exception(d) => d.span,
            Declaration::Actor(d) => d.span,
            Declaration::TypeAlias(d) => d.span,
            Declaration::Use(d) => d.span,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_async: bool,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: SurfaceType,
    pub body: Option<Block>,
    pub annotations: Vec<Annotation>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: SurfaceType,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub visibility: Visibility,
    pub type_params: Vec<TypeParam>,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<FunctionDecl>,
    pub nested: Vec<Declaration>,
    pub annotations: Vec<Annotation>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: SurfaceType,
    pub visibility: Visibility,
    pub mutable: bool,
    pub initializer: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    pub visibility: Visibility,
    pub super_interfaces: Vec<String>,
    pub methods: Vec<FunctionDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplDecl {
    /// The trait being implemented, or `None` for an inherent `impl Type`.
    pub trait_name: Option<String>,
    pub target: String,
    pub methods: Vec<FunctionDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub visibility: Visibility,
    pub fields: Vec<(String, SurfaceType)>,
    pub annotations: Vec<Annotation>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedProperty {
    pub name: String,
    pub return_type: SurfaceType,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparkDecl {
    pub name: String,
    pub visibility: Visibility,
    pub fields: Vec<(String, SurfaceType)>,
    pub computed_properties: Vec<ComputedProperty>,
    pub validate: Option<Block>,
    pub travelable: bool,
    pub annotations: Vec<Annotation>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataAdtDecl {
    pub name: String,
    pub visibility: Visibility,
    pub variants: Vec<AdtVariant>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdtVariant {
    pub name: String,
    /// Empty for a nullary variant (emitted as a singleton field).
    pub fields: Vec<(String, SurfaceType)>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorDecl {
    pub name: String,
    pub visibility: Visibility,
    pub state_type: SurfaceType,
    pub message_type: SurfaceType,
    pub receive_arms: Vec<MatchArm>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeAliasDecl {
    pub name: String,
    pub target: SurfaceType,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Let {
        pattern: Pattern,
        declared_type: Option<SurfaceType>,
        value: Expr,
        span: Span,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
        span: Span,
    },
    For {
        pattern: Pattern,
        iterable: Expr,
        body: Block,
        span: Span,
    },
    While {
        cond: Expr,
        body: Block,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Return(Option<Expr>, Span),
    Throw(Expr, Span),
    Try {
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
        span: Span,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    pub binding: String,
    pub exception_type: SurfaceType,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Long(i64),
    Float(f64),
    Double(f64),
    Bool(bool),
    String(String),
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    RangeExclusive,
    RangeInclusive,
    Coalesce,
    Elvis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
    Ref,
    RefMut,
    ForceUnwrap,
    Await,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal, Span),
    Ident(String, Span),
    SelfExpr(Span),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        span: Span,
    },
    /// Safe navigation: `recv?.method(args)` / `recv?.field`.
    SafeNav {
        receiver: Box<Expr>,
        access: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        span: Span,
    },
    FieldAccess {
        receiver: Box<Expr>,
        field: String,
        span: Span,
    },
    StaticFieldAccess {
        class_name: String,
        field: String,
        span: Span,
    },
    Index {
        receiver: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Tuple(Vec<Expr>, Span),
    TupleIndex {
        receiver: Box<Expr>,
        index: usize,
        span: Span,
    },
    StructLiteral {
        name: String,
        fields: Vec<(String, Expr)>,
        span: Span,
    },
    ArrayLiteral(Vec<Expr>, Span),
    MapLiteral(Vec<(Expr, Expr)>, Span),
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
        span: Span,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
        span: Span,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
        span: Span,
    },
    Block(Block, Span),
    Timeout {
        millis: Box<Expr>,
        body: Block,
        span: Span,
    },
    Concurrent {
        bindings: Vec<(String, Expr)>,
        span: Span,
    },
    Race {
        futures: Vec<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, s)
            | Expr::Ident(_, s)
            | Expr::SelfExpr(s)
            | Expr::Binary { span: s, .. }
            | Expr::Unary { span: s, .. }
            | Expr::SafeNav { span: s, .. }
            | Expr::Call { span: s, .. }
            | Expr::MethodCall { span: s, .. }
            | Expr::FieldAccess { span: s, .. }
            | Expr::StaticFieldAccess { span: s, .. }
            | Expr::Index { span: s, .. }
            | Expr::Tuple(_, s)
            | Expr::TupleIndex { span: s, .. }
            | Expr::StructLiteral { span: s, .. }
            | Expr::ArrayLiteral(_, s)
            | Expr::MapLiteral(_, s)
            | Expr::If { span: s, .. }
            | Expr::Match { span: s, .. }
            | Expr::Lambda { span: s, .. }
            | Expr::Block(_, s)
            | Expr::Timeout { span: s, .. }
            | Expr::Concurrent { span: s, .. }
            | Expr::Race { span: s, .. } => *s,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Pattern {
    Wildcard(Span),
    Variable(String, Span),
    TypedVariable(String, SurfaceType, Span),
    Literal(Literal, Span),
    Range {
        start: Literal,
        end: Literal,
        inclusive: bool,
        span: Span,
    },
    Tuple(Vec<Pattern>, Span),
    Struct {
        name: String,
        fields: Vec<(String, Pattern)>,
        span: Span,
    },
    /// Tuple-struct / ADT-variant constructor pattern, e.g. `Some(x)`.
    Constructor {
        name: String,
        args: Vec<Pattern>,
        span: Span,
    },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Wildcard(s)
            | Pattern::Variable(_, s)
            | Pattern::TypedVariable(_, _, s)
            | Pattern::Literal(_, s)
            | Pattern::Range { span: s, .. }
            | Pattern::Tuple(_, s)
            | Pattern::Struct { span: s, .. }
            | Pattern::Constructor { span: s, .. } => *s,
        }
    }
}
