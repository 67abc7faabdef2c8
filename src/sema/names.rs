//! Name analysis
//!
//! A single recursive descent over the AST that builds the symbol arena,
//! links every resolvable identifier to its symbol, and assigns stack-frame
//! offsets. User problems land in the diagnostics sink and the walk keeps
//! going; `Err` is reserved for compiler bugs.
//!
//! Frame layout: formals are allocated downward from offset 0 in 4-byte
//! slots, then 8 bytes are reserved for the saved return address and frame
//! pointer, then locals continue downward. Struct instances are declared
//! but never given frame space; struct values do not exist at runtime.

use crate::frontend::ast::*;
use crate::sema::symbol::{Storage, Symbol, SymbolId, SymbolKind, Symbols, GLOBAL_OFFSET};
use crate::sema::table::SymTable;
use crate::sema::lower_ty;
use crate::types::Type;
use crate::utils::{Diagnostics, Result, Span};

/// The name-analysis pass
pub struct NameAnalyzer {
    symbols: Symbols,
    table: SymTable,
    diags: Diagnostics,
    no_main: bool,
}

impl NameAnalyzer {
    pub fn new() -> Self {
        Self {
            symbols: Symbols::new(),
            table: SymTable::new(),
            diags: Diagnostics::new(),
            no_main: true,
        }
    }

    /// Run the pass over a whole program.
    pub fn analyze(&mut self, program: &mut Program) -> Result<()> {
        for decl in &mut program.decls {
            match decl {
                Decl::Var(v) => self.na_var_decl_in(v, None)?,
                Decl::Fn(f) => self.na_fn_decl(f)?,
                Decl::Struct(s) => self.na_struct_decl(s)?,
            }
        }
        if self.no_main {
            self.diags.report(Span::dummy(), "No main function");
        }
        Ok(())
    }

    /// Hand the populated arena and diagnostics to the next pass.
    pub fn finish(self) -> (Symbols, Diagnostics) {
        (self.symbols, self.diags)
    }

    // ==================== Declarations ====================

    /// Process a variable declaration. `field_table` is the target scope
    /// when the declaration is a struct field; struct type names and the
    /// offset cursor always come from the main table.
    fn na_var_decl_in(
        &mut self,
        decl: &mut VarDecl,
        field_table: Option<&mut SymTable>,
    ) -> Result<()> {
        let mut bad = false;
        let mut struct_decl: Option<SymbolId> = None;
        let mut struct_name = String::new();

        match &mut decl.ty {
            TyNode::Void(_) => {
                self.diags
                    .report(decl.id.span, "Non-function declared void");
                bad = true;
            }
            TyNode::Struct(_, type_id) => {
                let found = self.table.lookup_global(&type_id.name);
                match found {
                    Some(sid)
                        if matches!(
                            self.symbols.get(sid).kind,
                            SymbolKind::StructDef { .. }
                        ) =>
                    {
                        type_id.sym = Some(sid);
                        struct_decl = Some(sid);
                        struct_name = type_id.name.clone();
                    }
                    _ => {
                        self.diags
                            .report(type_id.span, "Invalid name of struct type");
                        bad = true;
                    }
                }
            }
            _ => {}
        }

        let target = field_table;
        let duplicate = match &target {
            Some(t) => t.lookup_local(&decl.id.name).is_some(),
            None => self.table.lookup_local(&decl.id.name).is_some(),
        };
        if duplicate {
            self.diags
                .report(decl.id.span, "Multiply declared identifier");
            bad = true;
        }

        if !bad {
            let storage = if self.table.is_global_scope() {
                Storage::Global
            } else {
                Storage::Local
            };
            let symbol = if let Some(ds) = struct_decl {
                // struct instances are never allocated frame space
                Symbol {
                    name: decl.id.name.clone(),
                    ty: Type::Struct {
                        name: struct_name,
                        decl: Some(ds),
                    },
                    kind: SymbolKind::Var {
                        storage,
                        offset: GLOBAL_OFFSET,
                    },
                }
            } else {
                let offset = if self.table.is_global_scope() {
                    GLOBAL_OFFSET
                } else {
                    let offset = self.table.offset();
                    self.table.set_offset(offset - 4);
                    offset
                };
                Symbol {
                    name: decl.id.name.clone(),
                    ty: lower_ty(&decl.ty),
                    kind: SymbolKind::Var { storage, offset },
                }
            };

            let id = self.symbols.alloc(symbol);
            match target {
                Some(t) => t.add_decl(&decl.id.name, id)?,
                None => self.table.add_decl(&decl.id.name, id)?,
            }
            decl.id.sym = Some(id);
        }

        Ok(())
    }

    /// Process a function declaration. A duplicate name is reported and not
    /// registered, but the formals and body are still analyzed in a fresh
    /// scope so their own problems surface.
    fn na_fn_decl(&mut self, decl: &mut FnDecl) -> Result<()> {
        let name = decl.id.name.clone();
        let mut fn_id: Option<SymbolId> = None;

        if self.table.lookup_local(&name).is_some() {
            self.diags
                .report(decl.id.span, "Multiply declared identifier");
        } else {
            if name == "main" {
                self.no_main = false;
            }
            let symbol = Symbol {
                name: name.clone(),
                ty: Type::Fn {
                    params: Vec::new(),
                    ret: Box::new(lower_ty(&decl.ret_ty)),
                },
                kind: SymbolKind::Fn {
                    param_types: Vec::new(),
                    num_params: decl.formals.len(),
                    param_size: 0,
                    local_size: 0,
                },
            };
            let id = self.symbols.alloc(symbol);
            self.table.add_decl(&name, id)?;
            decl.id.sym = Some(id);
            fn_id = Some(id);
        }

        self.table.set_global_scope(false);
        self.table.set_offset(0);
        self.table.add_scope();

        let mut param_types = Vec::new();
        for formal in &mut decl.formals {
            if let Some(sid) = self.na_formal_decl(formal)? {
                param_types.push(self.symbols.get(sid).ty.clone());
            }
        }
        if let Some(id) = fn_id {
            let param_size = -self.table.offset();
            let symbol = self.symbols.get_mut(id);
            if let Type::Fn { params, .. } = &mut symbol.ty {
                *params = param_types.clone();
            }
            if let SymbolKind::Fn {
                param_types: types,
                param_size: size,
                ..
            } = &mut symbol.kind
            {
                *types = param_types;
                *size = param_size;
            }
        }

        // reserve the saved-RA and saved-FP slots
        self.table.set_offset(self.table.offset() - 8);
        let locals_start = self.table.offset();

        for var in &mut decl.body.decls {
            self.na_var_decl_in(var, None)?;
        }
        for stmt in &mut decl.body.stmts {
            self.na_stmt(stmt)?;
        }

        if let Some(id) = fn_id {
            let local_size = -(self.table.offset() - locals_start);
            if let SymbolKind::Fn { local_size: size, .. } = &mut self.symbols.get_mut(id).kind
            {
                *size = local_size;
            }
        }

        self.table.set_global_scope(true);
        self.table.remove_scope()?;
        Ok(())
    }

    fn na_formal_decl(&mut self, decl: &mut FormalDecl) -> Result<Option<SymbolId>> {
        let mut bad = false;

        if decl.ty.is_void() {
            self.diags
                .report(decl.id.span, "Non-function declared void");
            bad = true;
        }
        if self.table.lookup_local(&decl.id.name).is_some() {
            self.diags
                .report(decl.id.span, "Multiply declared identifier");
            bad = true;
        }
        if bad {
            return Ok(None);
        }

        let offset = self.table.offset();
        self.table.set_offset(offset - 4);
        let symbol = Symbol {
            name: decl.id.name.clone(),
            ty: lower_ty(&decl.ty),
            kind: SymbolKind::Var {
                storage: Storage::Formal,
                offset,
            },
        };
        let id = self.symbols.alloc(symbol);
        self.table.add_decl(&decl.id.name, id)?;
        decl.id.sym = Some(id);
        Ok(Some(id))
    }

    /// Process a struct definition: fields are declared into a fresh table
    /// whose single scope becomes the definition's field scope. A duplicate
    /// definition name skips the body entirely.
    fn na_struct_decl(&mut self, decl: &mut StructDecl) -> Result<()> {
        if self.table.lookup_local(&decl.id.name).is_some() {
            self.diags
                .report(decl.id.span, "Multiply declared identifier");
            return Ok(());
        }

        let mut field_table = SymTable::new();
        for field in &mut decl.fields {
            self.na_var_decl_in(field, Some(&mut field_table))?;
        }
        let fields = field_table.remove_scope()?;

        let symbol = Symbol {
            name: decl.id.name.clone(),
            ty: Type::StructDef,
            kind: SymbolKind::StructDef { fields },
        };
        let id = self.symbols.alloc(symbol);
        self.table.add_decl(&decl.id.name, id)?;
        decl.id.sym = Some(id);
        Ok(())
    }

    // ==================== Statements ====================

    fn na_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        match stmt {
            Stmt::Assign(assign) => {
                self.na_exp(&mut assign.lhs)?;
                self.na_exp(&mut assign.rhs)?;
            }
            Stmt::PostInc(exp) | Stmt::PostDec(exp) | Stmt::Read(exp) => {
                self.na_exp(exp)?;
            }
            Stmt::Write(write) => {
                self.na_exp(&mut write.exp)?;
            }
            Stmt::If(s) => {
                self.na_exp(&mut s.cond)?;
                self.na_block(&mut s.body)?;
            }
            Stmt::IfElse(s) => {
                self.na_exp(&mut s.cond)?;
                self.na_block(&mut s.then_body)?;
                self.na_block(&mut s.else_body)?;
            }
            Stmt::While(s) => {
                self.na_exp(&mut s.cond)?;
                self.na_block(&mut s.body)?;
            }
            Stmt::Repeat(s) => {
                self.na_exp(&mut s.count)?;
                self.na_block(&mut s.body)?;
            }
            Stmt::Call(call) => {
                self.na_call(call)?;
            }
            Stmt::Return(exp) => {
                if let Some(exp) = exp {
                    self.na_exp(exp)?;
                }
            }
        }
        Ok(())
    }

    /// Process a nested body in its own scope.
    fn na_block(&mut self, block: &mut Block) -> Result<()> {
        self.table.add_scope();
        for var in &mut block.decls {
            self.na_var_decl_in(var, None)?;
        }
        for stmt in &mut block.stmts {
            self.na_stmt(stmt)?;
        }
        self.table.remove_scope()?;
        Ok(())
    }

    // ==================== Expressions ====================

    fn na_exp(&mut self, exp: &mut Exp) -> Result<()> {
        match exp {
            Exp::IntLit(..) | Exp::StrLit(..) | Exp::True(_) | Exp::False(_) => {}
            Exp::Ident(id) => self.na_ident(id),
            Exp::Dot(dot) => {
                self.na_dot_access(dot)?;
            }
            Exp::Assign(assign) => {
                self.na_exp(&mut assign.lhs)?;
                self.na_exp(&mut assign.rhs)?;
            }
            Exp::Call(call) => self.na_call(call)?,
            Exp::Unary(_, operand) => self.na_exp(operand)?,
            Exp::Binary(_, lhs, rhs) => {
                self.na_exp(lhs)?;
                self.na_exp(rhs)?;
            }
        }
        Ok(())
    }

    fn na_ident(&mut self, id: &mut Ident) {
        match self.table.lookup_global(&id.name) {
            Some(sid) => id.sym = Some(sid),
            None => self.diags.report(id.span, "Undeclared identifier"),
        }
    }

    fn na_call(&mut self, call: &mut CallExp) -> Result<()> {
        self.na_ident(&mut call.callee);
        for arg in &mut call.args {
            self.na_exp(arg)?;
        }
        Ok(())
    }

    /// Resolve one dot-access. Returns whether the access is bad, so an
    /// enclosing dot-access can stop without piling on cascaded errors.
    fn na_dot_access(&mut self, dot: &mut DotAccess) -> Result<bool> {
        let mut bad = false;
        let mut owner: Option<SymbolId> = None;

        match &mut dot.loc {
            Exp::Ident(id) => {
                self.na_ident(id);
                match id.sym {
                    // undeclared; already reported
                    None => bad = true,
                    Some(sid) => match &self.symbols.get(sid).ty {
                        Type::Struct {
                            decl: Some(ds), ..
                        } => owner = Some(*ds),
                        _ => {
                            self.diags
                                .report(id.span, "Dot-access of non-struct type");
                            bad = true;
                        }
                    },
                }
            }
            Exp::Dot(inner) => {
                if self.na_dot_access(inner)? {
                    bad = true;
                } else {
                    match inner.sym {
                        None => {
                            self.diags
                                .report(inner.field.span, "Dot-access of non-struct type");
                            bad = true;
                        }
                        Some(sid) => {
                            if matches!(
                                self.symbols.get(sid).kind,
                                SymbolKind::StructDef { .. }
                            ) {
                                owner = Some(sid);
                            } else {
                                return Err(crate::utils::Error::UnexpectedSymbol {
                                    name: self.symbols.get(sid).name.clone(),
                                });
                            }
                        }
                    }
                }
            }
            other => {
                self.diags
                    .report(other.span(), "Dot-access of non-struct type");
                bad = true;
            }
        }

        if !bad {
            let owner = owner.ok_or(crate::utils::Error::UnboundIdent {
                name: dot.field.name.clone(),
            })?;
            let field_id = match &self.symbols.get(owner).kind {
                SymbolKind::StructDef { fields } => fields.get(&dot.field.name).copied(),
                _ => None,
            };
            match field_id {
                None => {
                    self.diags
                        .report(dot.field.span, "Invalid struct field name");
                    bad = true;
                }
                Some(fid) => {
                    dot.field.sym = Some(fid);
                    // export the field's own struct definition for chains
                    if let Type::Struct {
                        decl: Some(ds), ..
                    } = &self.symbols.get(fid).ty
                    {
                        dot.sym = Some(*ds);
                    }
                }
            }
        }

        Ok(bad)
    }
}

impl Default for NameAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
