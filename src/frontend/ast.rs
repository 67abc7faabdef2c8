//! Abstract syntax tree for Gibberish
//!
//! The tree is produced by the parser and then decorated in place: name
//! analysis fills in the `sym` handles on identifier and dot-access nodes,
//! and type checking caches the operand type on write statements so code
//! generation can pick the right syscall. No other mutation happens after
//! parsing.
#![allow(dead_code)]

use crate::sema::SymbolId;
use crate::types::Type;
use crate::utils::Span;

/// A complete program: a list of global declarations.
#[derive(Debug)]
pub struct Program {
    pub decls: Vec<Decl>,
}

/// Top-level declarations
#[derive(Debug)]
pub enum Decl {
    Var(VarDecl),
    Fn(FnDecl),
    Struct(StructDecl),
}

/// Variable declaration: `type id;`
#[derive(Debug)]
pub struct VarDecl {
    pub ty: TyNode,
    pub id: Ident,
}

/// Function declaration: `type id(formals) { body }`
#[derive(Debug)]
pub struct FnDecl {
    pub ret_ty: TyNode,
    pub id: Ident,
    pub formals: Vec<FormalDecl>,
    pub body: Block,
}

/// Formal parameter: `type id`
#[derive(Debug)]
pub struct FormalDecl {
    pub ty: TyNode,
    pub id: Ident,
}

/// Struct definition: `struct id { fields };`
#[derive(Debug)]
pub struct StructDecl {
    pub id: Ident,
    pub fields: Vec<VarDecl>,
}

/// A braced body: local declarations first, then statements.
#[derive(Debug)]
pub struct Block {
    pub decls: Vec<VarDecl>,
    pub stmts: Vec<Stmt>,
}

/// Syntactic type annotations
#[derive(Debug)]
pub enum TyNode {
    Int(Span),
    Bool(Span),
    Void(Span),
    Struct(Span, Ident),
}

impl TyNode {
    pub fn is_void(&self) -> bool {
        matches!(self, TyNode::Void(_))
    }

    pub fn span(&self) -> Span {
        match self {
            TyNode::Int(s) | TyNode::Bool(s) | TyNode::Void(s) | TyNode::Struct(s, _) => *s,
        }
    }
}

/// Statements
#[derive(Debug)]
pub enum Stmt {
    /// `lhs = rhs;`
    Assign(AssignExp),
    /// `e++;`
    PostInc(Exp),
    /// `e--;`
    PostDec(Exp),
    /// `cin >> e;`
    Read(Exp),
    /// `cout << e;`
    Write(WriteStmt),
    If(IfStmt),
    IfElse(IfElseStmt),
    While(WhileStmt),
    Repeat(RepeatStmt),
    /// `f(args);`
    Call(CallExp),
    /// `return e?;`
    Return(Option<Exp>),
}

/// `cout << e;` with the checked operand type cached for code generation.
#[derive(Debug)]
pub struct WriteStmt {
    pub exp: Exp,
    pub ty: Option<Type>,
}

#[derive(Debug)]
pub struct IfStmt {
    pub cond: Exp,
    pub body: Block,
}

#[derive(Debug)]
pub struct IfElseStmt {
    pub cond: Exp,
    pub then_body: Block,
    pub else_body: Block,
}

#[derive(Debug)]
pub struct WhileStmt {
    pub cond: Exp,
    pub body: Block,
}

#[derive(Debug)]
pub struct RepeatStmt {
    pub count: Exp,
    pub body: Block,
}

/// Expressions
#[derive(Debug)]
pub enum Exp {
    IntLit(Span, i32),
    StrLit(Span, String),
    True(Span),
    False(Span),
    Ident(Ident),
    Dot(Box<DotAccess>),
    Assign(Box<AssignExp>),
    Call(Box<CallExp>),
    Unary(UnaryOp, Box<Exp>),
    Binary(BinOp, Box<Exp>, Box<Exp>),
}

impl Exp {
    /// The position diagnostics about this expression attach to. Binary and
    /// assignment expressions report at the left operand, dot-access at the
    /// field name, calls at the callee.
    pub fn span(&self) -> Span {
        match self {
            Exp::IntLit(s, _) | Exp::StrLit(s, _) | Exp::True(s) | Exp::False(s) => *s,
            Exp::Ident(id) => id.span,
            Exp::Dot(d) => d.field.span,
            Exp::Assign(a) => a.lhs.span(),
            Exp::Call(c) => c.callee.span,
            Exp::Unary(_, e) => e.span(),
            Exp::Binary(_, lhs, _) => lhs.span(),
        }
    }
}

/// An identifier use or declaration site. `sym` is filled by name analysis
/// for every identifier that resolves; it indexes the symbol arena.
#[derive(Debug)]
pub struct Ident {
    pub name: String,
    pub span: Span,
    pub sym: Option<SymbolId>,
}

impl Ident {
    pub fn new(name: String, span: Span) -> Self {
        Self {
            name,
            span,
            sym: None,
        }
    }
}

/// `loc.field`. After a successful resolution whose field is itself a
/// struct instance, `sym` exports the field's struct definition so a
/// chained access one level up can continue the lookup.
#[derive(Debug)]
pub struct DotAccess {
    pub loc: Exp,
    pub field: Ident,
    pub sym: Option<SymbolId>,
}

/// `lhs = rhs` as an expression
#[derive(Debug)]
pub struct AssignExp {
    pub lhs: Exp,
    pub rhs: Exp,
}

/// `callee(args)`
#[derive(Debug)]
pub struct CallExp {
    pub callee: Ident,
    pub args: Vec<Exp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-e`
    Neg,
    /// `!e`
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Plus,
    Minus,
    Times,
    Divide,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Plus | BinOp::Minus | BinOp::Times | BinOp::Divide)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne)
    }

    pub fn is_relational(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge)
    }
}
