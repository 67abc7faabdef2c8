//! Semantic analysis: symbols, scopes, name analysis, and type checking

pub mod names;
pub mod symbol;
pub mod table;
pub mod typecheck;

pub use names::NameAnalyzer;
pub use symbol::{Storage, Symbol, SymbolId, SymbolKind, Symbols};
pub use table::SymTable;
pub use typecheck::TypeChecker;

use crate::frontend::ast::TyNode;
use crate::types::Type;

/// Lower a syntactic type annotation to its semantic type. Struct types
/// carry whatever declaration link name analysis gave the annotation's
/// identifier; function return annotations are never linked and fall back
/// to comparison by name.
pub fn lower_ty(ty: &TyNode) -> Type {
    match ty {
        TyNode::Int(_) => Type::Int,
        TyNode::Bool(_) => Type::Bool,
        TyNode::Void(_) => Type::Void,
        TyNode::Struct(_, id) => Type::Struct {
            name: id.name.clone(),
            decl: id.sym,
        },
    }
}
