//! Type checking
//!
//! A post-order walk that computes a type for every expression and verifies
//! statement-level rules. Name links are read, never written; the only AST
//! mutation is the cached operand type on write statements, which code
//! generation uses to pick a syscall.
//!
//! `Type::Error` is injected at every failed check and silences all further
//! checks over the same expression, so one mistake produces one diagnostic.

use crate::frontend::ast::*;
use crate::sema::lower_ty;
use crate::sema::symbol::{SymbolKind, Symbols};
use crate::types::Type;
use crate::utils::Diagnostics;

/// The type-checking pass
pub struct TypeChecker<'a> {
    symbols: &'a Symbols,
    diags: &'a mut Diagnostics,
}

impl<'a> TypeChecker<'a> {
    pub fn new(symbols: &'a Symbols, diags: &'a mut Diagnostics) -> Self {
        Self { symbols, diags }
    }

    /// Check a whole program.
    pub fn check(&mut self, program: &mut Program) {
        for decl in &mut program.decls {
            if let Decl::Fn(f) = decl {
                let ret = lower_ty(&f.ret_ty);
                self.check_block(&mut f.body, &ret);
            }
        }
    }

    fn check_block(&mut self, block: &mut Block, ret: &Type) {
        for stmt in &mut block.stmts {
            self.check_stmt(stmt, ret);
        }
    }

    // ==================== Statements ====================

    fn check_stmt(&mut self, stmt: &mut Stmt, ret: &Type) {
        match stmt {
            Stmt::Assign(assign) => {
                self.check_assign(assign);
            }
            Stmt::PostInc(exp) | Stmt::PostDec(exp) => {
                let ty = self.check_exp(exp);
                if !ty.is_error() && !ty.is_int() {
                    self.diags.report(
                        exp.span(),
                        "Arithmetic operator applied to non-numeric operand",
                    );
                }
            }
            Stmt::Read(exp) => {
                let ty = self.check_exp(exp);
                if ty.is_fn() {
                    self.diags
                        .report(exp.span(), "Attempt to read a function");
                }
                if ty.is_struct_def() {
                    self.diags
                        .report(exp.span(), "Attempt to read a struct name");
                }
                if ty.is_struct() {
                    self.diags
                        .report(exp.span(), "Attempt to read a struct variable");
                }
            }
            Stmt::Write(write) => {
                let ty = self.check_exp(&write.exp);
                if ty.is_fn() {
                    self.diags
                        .report(write.exp.span(), "Attempt to write a function");
                }
                if ty.is_struct_def() {
                    self.diags
                        .report(write.exp.span(), "Attempt to write a struct name");
                }
                if ty.is_struct() {
                    self.diags
                        .report(write.exp.span(), "Attempt to write a struct variable");
                }
                if ty.is_void() {
                    self.diags
                        .report(write.exp.span(), "Attempt to write void");
                }
                write.ty = Some(ty);
            }
            Stmt::If(s) => {
                let ty = self.check_exp(&s.cond);
                if !ty.is_error() && !ty.is_bool() {
                    self.diags.report(
                        s.cond.span(),
                        "Non-bool expression used as an if condition",
                    );
                }
                self.check_block(&mut s.body, ret);
            }
            Stmt::IfElse(s) => {
                let ty = self.check_exp(&s.cond);
                if !ty.is_error() && !ty.is_bool() {
                    self.diags.report(
                        s.cond.span(),
                        "Non-bool expression used as an if condition",
                    );
                }
                self.check_block(&mut s.then_body, ret);
                self.check_block(&mut s.else_body, ret);
            }
            Stmt::While(s) => {
                let ty = self.check_exp(&s.cond);
                if !ty.is_error() && !ty.is_bool() {
                    self.diags.report(
                        s.cond.span(),
                        "Non-bool expression used as a while condition",
                    );
                }
                self.check_block(&mut s.body, ret);
            }
            Stmt::Repeat(s) => {
                let ty = self.check_exp(&s.count);
                if !ty.is_error() && !ty.is_int() {
                    self.diags.report(
                        s.count.span(),
                        "Non-integer expression used as a repeat clause",
                    );
                }
                self.check_block(&mut s.body, ret);
            }
            Stmt::Call(call) => {
                self.check_call(call);
            }
            Stmt::Return(Some(exp)) => {
                let ty = self.check_exp(exp);
                if ret.is_void() {
                    self.diags
                        .report(exp.span(), "Return with a value in a void function");
                } else if !ret.is_error() && !ty.is_error() && ret != &ty {
                    self.diags.report(exp.span(), "Bad return value");
                }
            }
            Stmt::Return(None) => {
                if !ret.is_void() {
                    self.diags
                        .report(crate::utils::Span::dummy(), "Missing return value");
                }
            }
        }
    }

    // ==================== Expressions ====================

    fn check_exp(&mut self, exp: &Exp) -> Type {
        match exp {
            Exp::IntLit(..) => Type::Int,
            Exp::StrLit(..) => Type::Str,
            Exp::True(_) | Exp::False(_) => Type::Bool,
            Exp::Ident(id) => self.ident_ty(id),
            // resolved during name analysis; the field carries the type
            Exp::Dot(dot) => self.ident_ty(&dot.field),
            Exp::Assign(assign) => self.check_assign(assign),
            Exp::Call(call) => self.check_call(call),
            Exp::Unary(UnaryOp::Neg, operand) => {
                let ty = self.check_exp(operand);
                if ty.is_error() {
                    Type::Error
                } else if !ty.is_int() {
                    self.diags.report(
                        operand.span(),
                        "Arithmetic operator applied to non-numeric operand",
                    );
                    Type::Error
                } else {
                    Type::Int
                }
            }
            Exp::Unary(UnaryOp::Not, operand) => {
                let ty = self.check_exp(operand);
                if ty.is_error() {
                    Type::Error
                } else if !ty.is_bool() {
                    self.diags.report(
                        operand.span(),
                        "Logical operator applied to non-bool operand",
                    );
                    Type::Error
                } else {
                    Type::Bool
                }
            }
            Exp::Binary(op, lhs, rhs) => self.check_binary(*op, lhs, rhs),
        }
    }

    /// Type of an identifier use. An unlinked identifier was already
    /// reported during name analysis and quietly types as `Error`.
    fn ident_ty(&self, id: &Ident) -> Type {
        match id.sym {
            Some(sid) => self.symbols.get(sid).ty.clone(),
            None => Type::Error,
        }
    }

    fn check_binary(&mut self, op: BinOp, lhs: &Exp, rhs: &Exp) -> Type {
        let t1 = self.check_exp(lhs);
        let t2 = self.check_exp(rhs);

        if op.is_arithmetic() {
            let mut ret = Type::Int;
            if !t1.is_error() && !t1.is_int() {
                self.diags.report(
                    lhs.span(),
                    "Arithmetic operator applied to non-numeric operand",
                );
                ret = Type::Error;
            }
            if !t2.is_error() && !t2.is_int() {
                self.diags.report(
                    rhs.span(),
                    "Arithmetic operator applied to non-numeric operand",
                );
                ret = Type::Error;
            }
            if t1.is_error() || t2.is_error() {
                ret = Type::Error;
            }
            ret
        } else if op.is_logical() {
            let mut ret = Type::Bool;
            if !t1.is_error() && !t1.is_bool() {
                self.diags.report(
                    lhs.span(),
                    "Logical operator applied to non-bool operand",
                );
                ret = Type::Error;
            }
            if !t2.is_error() && !t2.is_bool() {
                self.diags.report(
                    rhs.span(),
                    "Logical operator applied to non-bool operand",
                );
                ret = Type::Error;
            }
            if t1.is_error() || t2.is_error() {
                ret = Type::Error;
            }
            ret
        } else if op.is_relational() {
            let mut ret = Type::Bool;
            if !t1.is_error() && !t1.is_int() {
                self.diags.report(
                    lhs.span(),
                    "Relational operator applied to non-numeric operand",
                );
                ret = Type::Error;
            }
            if !t2.is_error() && !t2.is_int() {
                self.diags.report(
                    rhs.span(),
                    "Relational operator applied to non-numeric operand",
                );
                ret = Type::Error;
            }
            if t1.is_error() || t2.is_error() {
                ret = Type::Error;
            }
            ret
        } else {
            // equality; whole-expression errors attach to the left operand
            let span = lhs.span();
            let mut ret = Type::Bool;
            if t1.is_void() && t2.is_void() {
                self.diags
                    .report(span, "Equality operator applied to void functions");
                ret = Type::Error;
            }
            if t1.is_fn() && t2.is_fn() {
                self.diags
                    .report(span, "Equality operator applied to functions");
                ret = Type::Error;
            }
            if t1.is_struct_def() && t2.is_struct_def() {
                self.diags
                    .report(span, "Equality operator applied to struct names");
                ret = Type::Error;
            }
            if t1.is_struct() && t2.is_struct() {
                self.diags
                    .report(span, "Equality operator applied to struct variables");
                ret = Type::Error;
            }
            if t1 != t2 && !t1.is_error() && !t2.is_error() {
                self.diags.report(span, "Type mismatch");
                ret = Type::Error;
            }
            if t1.is_error() || t2.is_error() {
                ret = Type::Error;
            }
            ret
        }
    }

    fn check_assign(&mut self, assign: &AssignExp) -> Type {
        let t1 = self.check_exp(&assign.lhs);
        let t2 = self.check_exp(&assign.rhs);
        let span = assign.lhs.span();
        let mut ret = t1.clone();

        if t1.is_fn() && t2.is_fn() {
            self.diags.report(span, "Function assignment");
            ret = Type::Error;
        }
        if t1.is_struct_def() && t2.is_struct_def() {
            self.diags.report(span, "Struct name assignment");
            ret = Type::Error;
        }
        if t1.is_struct() && t2.is_struct() {
            self.diags.report(span, "Struct variable assignment");
            ret = Type::Error;
        }
        if t1 != t2 && !t1.is_error() && !t2.is_error() {
            self.diags.report(span, "Type mismatch");
            ret = Type::Error;
        }
        if t1.is_error() || t2.is_error() {
            ret = Type::Error;
        }
        ret
    }

    fn check_call(&mut self, call: &CallExp) -> Type {
        let symbols = self.symbols;
        let callee_ty = self.ident_ty(&call.callee);
        if callee_ty.is_error() {
            // the callee was undeclared; stay quiet
            return Type::Error;
        }
        if !callee_ty.is_fn() {
            self.diags
                .report(call.callee.span, "Attempt to call a non-function");
            return Type::Error;
        }

        let Some(sid) = call.callee.sym else {
            return Type::Error;
        };
        let ret = match &symbols.get(sid).ty {
            Type::Fn { ret, .. } => (**ret).clone(),
            _ => Type::Error,
        };
        let SymbolKind::Fn {
            param_types,
            num_params,
            ..
        } = &symbols.get(sid).kind
        else {
            return Type::Error;
        };

        if call.args.len() != *num_params {
            self.diags.report(
                call.callee.span,
                "Function call with wrong number of args",
            );
            return ret;
        }

        for (arg, formal) in call.args.iter().zip(param_types.iter()) {
            let actual = self.check_exp(arg);
            if !actual.is_error() && formal != &actual {
                self.diags.report(
                    arg.span(),
                    "Type of actual does not match type of formal",
                );
            }
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;
    use crate::sema::names::NameAnalyzer;

    /// Run name analysis and type checking, returning all diagnostics.
    fn check(source: &str) -> Diagnostics {
        let lexer = Lexer::new(source);
        let mut parser = Parser::new(lexer);
        let mut program = parser.parse_program().expect("source should parse");
        let mut analyzer = NameAnalyzer::new();
        analyzer
            .analyze(&mut program)
            .expect("no internal errors expected");
        let (symbols, mut diags) = analyzer.finish();
        TypeChecker::new(&symbols, &mut diags).check(&mut program);
        diags
    }

    fn messages(diags: &Diagnostics) -> Vec<(u32, u32, String)> {
        diags
            .iter()
            .map(|d| (d.span.line, d.span.col, d.message.clone()))
            .collect()
    }

    #[test]
    fn test_clean_program_has_no_diagnostics() {
        let diags = check(
            "int g; \
             int add(int a, int b) { return a + b; } \
             void main() { int x; x = add(g, 2); cout << x; }",
        );
        assert!(diags.is_empty(), "unexpected: {:?}", messages(&diags));
    }

    #[test]
    fn test_assign_type_mismatch_reported_at_lhs() {
        let diags = check("void main() { int x; x = true; }");
        assert_eq!(
            messages(&diags),
            vec![(1, 22, "Type mismatch".to_string())]
        );
    }

    #[test]
    fn test_missing_return_value_at_origin() {
        let diags = check("int f() { return; } void main() {}");
        assert_eq!(
            messages(&diags),
            vec![(0, 0, "Missing return value".to_string())]
        );
    }

    #[test]
    fn test_return_with_value_in_void_function() {
        let diags = check("void main() { return 3; }");
        assert_eq!(
            messages(&diags),
            vec![(1, 22, "Return with a value in a void function".to_string())]
        );
    }

    #[test]
    fn test_bad_return_value() {
        let diags = check("int f() { return true; } void main() {}");
        assert_eq!(
            messages(&diags),
            vec![(1, 18, "Bad return value".to_string())]
        );
    }

    #[test]
    fn test_write_of_a_function() {
        let diags = check("void g() {} void main() { cout << g; }");
        assert_eq!(
            messages(&diags),
            vec![(1, 35, "Attempt to write a function".to_string())]
        );
    }

    #[test]
    fn test_write_of_void_call() {
        let diags = check("void g() {} void main() { cout << g(); }");
        assert_eq!(
            messages(&diags),
            vec![(1, 35, "Attempt to write void".to_string())]
        );
    }

    #[test]
    fn test_read_of_struct_variable() {
        let diags =
            check("struct P { int x; }; struct P p; void main() { cin >> p; }");
        assert_eq!(
            messages(&diags),
            vec![(1, 55, "Attempt to read a struct variable".to_string())]
        );
    }

    #[test]
    fn test_non_bool_if_condition() {
        let diags = check("int main() { if (1) { } }");
        assert_eq!(
            messages(&diags),
            vec![(
                1,
                18,
                "Non-bool expression used as an if condition".to_string()
            )]
        );
    }

    #[test]
    fn test_non_bool_while_condition() {
        let diags = check("void main() { while (1) { } }");
        assert_eq!(
            messages(&diags),
            vec![(
                1,
                22,
                "Non-bool expression used as a while condition".to_string()
            )]
        );
    }

    #[test]
    fn test_non_integer_repeat_clause() {
        let diags = check("void main() { repeat (true) { } }");
        assert_eq!(
            messages(&diags),
            vec![(
                1,
                23,
                "Non-integer expression used as a repeat clause".to_string()
            )]
        );
    }

    #[test]
    fn test_arithmetic_operand_errors_per_side() {
        let diags = check("void main() { int x; x = true + false; }");
        let msgs: Vec<_> = messages(&diags);
        assert_eq!(
            msgs,
            vec![
                (
                    1,
                    26,
                    "Arithmetic operator applied to non-numeric operand".to_string()
                ),
                (
                    1,
                    33,
                    "Arithmetic operator applied to non-numeric operand".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_logical_operand_error() {
        let diags = check("void main() { bool b; b = 1 && true; }");
        assert_eq!(
            messages(&diags),
            vec![(
                1,
                27,
                "Logical operator applied to non-bool operand".to_string()
            )]
        );
    }

    #[test]
    fn test_relational_operand_error() {
        let diags = check("void main() { bool b; b = b < 2; }");
        assert_eq!(
            messages(&diags),
            vec![(
                1,
                27,
                "Relational operator applied to non-numeric operand".to_string()
            )]
        );
    }

    #[test]
    fn test_equality_of_void_calls() {
        let diags = check("void g() {} void main() { bool b; b = g() == g(); }");
        assert_eq!(
            messages(&diags),
            vec![(
                1,
                39,
                "Equality operator applied to void functions".to_string()
            )]
        );
    }

    #[test]
    fn test_struct_variable_assignment() {
        let diags = check(
            "struct P { int x; }; struct P a; struct P b; void main() { a = b; }",
        );
        assert_eq!(
            messages(&diags),
            vec![(1, 60, "Struct variable assignment".to_string())]
        );
    }

    #[test]
    fn test_call_of_non_function() {
        let diags = check("int x; void main() { x(); }");
        assert_eq!(
            messages(&diags),
            vec![(1, 22, "Attempt to call a non-function".to_string())]
        );
    }

    #[test]
    fn test_wrong_number_of_args() {
        let diags = check("int f(int a) { return a; } void main() { f(); }");
        assert_eq!(
            messages(&diags),
            vec![(
                1,
                42,
                "Function call with wrong number of args".to_string()
            )]
        );
    }

    #[test]
    fn test_actual_formal_mismatch() {
        let diags = check("int f(int a) { return a; } void main() { f(true); }");
        assert_eq!(
            messages(&diags),
            vec![(
                1,
                44,
                "Type of actual does not match type of formal".to_string()
            )]
        );
    }

    #[test]
    fn test_post_inc_of_non_int() {
        let diags = check("void main() { bool b; b++; }");
        assert_eq!(
            messages(&diags),
            vec![(
                1,
                23,
                "Arithmetic operator applied to non-numeric operand".to_string()
            )]
        );
    }

    #[test]
    fn test_error_type_suppresses_cascades() {
        // `y` is undeclared; the addition and assignment stay quiet
        let diags = check("void main() { int x; x = y + 1; }");
        assert_eq!(
            messages(&diags),
            vec![(1, 26, "Undeclared identifier".to_string())]
        );
    }
}
