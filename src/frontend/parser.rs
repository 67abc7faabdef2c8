//! Parser for Gibberish
//!
//! Recursive descent over the token stream. Declarations come before
//! statements inside every block, which is the shape the semantic passes
//! expect.

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result};

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Create a new parser from a lexer
    pub fn new(mut lexer: Lexer) -> Self {
        Self {
            tokens: lexer.tokenize(),
            pos: 0,
        }
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("tokens should not be empty"))
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn kind_at(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(Error::UnexpectedToken {
                expected: format!("{:?}", expected),
                got: format!("{:?}", self.current_kind()),
                span: self.current().span,
            })
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn starts_decl(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Int | TokenKind::Bool | TokenKind::Void | TokenKind::Struct
        )
    }

    // ==================== Declarations ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut decls = Vec::new();

        while !self.is_at_end() {
            decls.push(self.parse_decl()?);
        }

        Ok(Program { decls })
    }

    fn parse_decl(&mut self) -> Result<Decl> {
        // `struct Name {` opens a definition; `struct Name x` is a variable
        if self.check(&TokenKind::Struct)
            && matches!(self.kind_at(2), Some(TokenKind::LBrace))
        {
            return Ok(Decl::Struct(self.parse_struct_decl()?));
        }

        let ty = self.parse_type()?;
        let id = self.parse_ident()?;

        match self.current_kind() {
            TokenKind::Semicolon => {
                self.advance();
                Ok(Decl::Var(VarDecl { ty, id }))
            }
            TokenKind::LParen => Ok(Decl::Fn(self.parse_fn_rest(ty, id)?)),
            _ => Err(Error::UnexpectedToken {
                expected: "`;` or `(`".to_string(),
                got: format!("{:?}", self.current_kind()),
                span: self.current().span,
            }),
        }
    }

    fn parse_struct_decl(&mut self) -> Result<StructDecl> {
        self.expect(TokenKind::Struct)?;
        let id = self.parse_ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            fields.push(self.parse_var_decl()?);
        }

        self.expect(TokenKind::RBrace)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(StructDecl { id, fields })
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let ty = self.parse_type()?;
        let id = self.parse_ident()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(VarDecl { ty, id })
    }

    fn parse_fn_rest(&mut self, ret_ty: TyNode, id: Ident) -> Result<FnDecl> {
        self.expect(TokenKind::LParen)?;

        let mut formals = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            let ty = self.parse_type()?;
            let formal_id = self.parse_ident()?;
            formals.push(FormalDecl { ty, id: formal_id });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let body = self.parse_block()?;
        Ok(FnDecl {
            ret_ty,
            id,
            formals,
            body,
        })
    }

    fn parse_type(&mut self) -> Result<TyNode> {
        let token = self.current().clone();
        let ty = match token.kind {
            TokenKind::Int => {
                self.advance();
                TyNode::Int(token.span)
            }
            TokenKind::Bool => {
                self.advance();
                TyNode::Bool(token.span)
            }
            TokenKind::Void => {
                self.advance();
                TyNode::Void(token.span)
            }
            TokenKind::Struct => {
                self.advance();
                let id = self.parse_ident()?;
                TyNode::Struct(token.span, id)
            }
            _ => return Err(Error::ExpectedType { span: token.span }),
        };
        Ok(ty)
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.current().clone();
        match &token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Ident::new(name.clone(), token.span))
            }
            _ => Err(Error::ExpectedIdent { span: token.span }),
        }
    }

    // ==================== Blocks and Statements ====================

    fn parse_block(&mut self) -> Result<Block> {
        self.expect(TokenKind::LBrace)?;

        let mut decls = Vec::new();
        while self.starts_decl() {
            decls.push(self.parse_var_decl()?);
        }

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_stmt()?);
        }

        self.expect(TokenKind::RBrace)?;
        Ok(Block { decls, stmts })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.current_kind() {
            TokenKind::If => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_exp()?;
                self.expect(TokenKind::RParen)?;
                let body = self.parse_block()?;
                if self.consume(&TokenKind::Else) {
                    let else_body = self.parse_block()?;
                    Ok(Stmt::IfElse(IfElseStmt {
                        cond,
                        then_body: body,
                        else_body,
                    }))
                } else {
                    Ok(Stmt::If(IfStmt { cond, body }))
                }
            }
            TokenKind::While => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_exp()?;
                self.expect(TokenKind::RParen)?;
                let body = self.parse_block()?;
                Ok(Stmt::While(WhileStmt { cond, body }))
            }
            TokenKind::Repeat => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let count = self.parse_exp()?;
                self.expect(TokenKind::RParen)?;
                let body = self.parse_block()?;
                Ok(Stmt::Repeat(RepeatStmt { count, body }))
            }
            TokenKind::Return => {
                self.advance();
                let exp = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_exp()?)
                };
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Return(exp))
            }
            TokenKind::Cin => {
                self.advance();
                self.expect(TokenKind::Read)?;
                let loc = self.parse_loc()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Read(loc))
            }
            TokenKind::Cout => {
                self.advance();
                self.expect(TokenKind::Write)?;
                let exp = self.parse_exp()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Write(WriteStmt { exp, ty: None }))
            }
            TokenKind::Ident(_) => {
                let loc = self.parse_loc()?;
                match self.current_kind() {
                    TokenKind::Assign => {
                        self.advance();
                        let rhs = self.parse_exp()?;
                        self.expect(TokenKind::Semicolon)?;
                        Ok(Stmt::Assign(AssignExp { lhs: loc, rhs }))
                    }
                    TokenKind::PlusPlus => {
                        self.advance();
                        self.expect(TokenKind::Semicolon)?;
                        Ok(Stmt::PostInc(loc))
                    }
                    TokenKind::MinusMinus => {
                        self.advance();
                        self.expect(TokenKind::Semicolon)?;
                        Ok(Stmt::PostDec(loc))
                    }
                    TokenKind::LParen => match loc {
                        Exp::Ident(id) => {
                            let call = self.parse_call_rest(id)?;
                            self.expect(TokenKind::Semicolon)?;
                            Ok(Stmt::Call(call))
                        }
                        other => Err(Error::ExpectedStmt { span: other.span() }),
                    },
                    _ => Err(Error::UnexpectedToken {
                        expected: "`=`, `++`, `--`, or `(`".to_string(),
                        got: format!("{:?}", self.current_kind()),
                        span: self.current().span,
                    }),
                }
            }
            _ => Err(Error::ExpectedStmt {
                span: self.current().span,
            }),
        }
    }

    /// Parse an identifier optionally followed by a dot-access chain.
    fn parse_loc(&mut self) -> Result<Exp> {
        let id = self.parse_ident()?;
        self.parse_loc_rest(id)
    }

    fn parse_loc_rest(&mut self, id: Ident) -> Result<Exp> {
        let mut exp = Exp::Ident(id);
        while self.consume(&TokenKind::Dot) {
            let field = self.parse_ident()?;
            exp = Exp::Dot(Box::new(DotAccess {
                loc: exp,
                field,
                sym: None,
            }));
        }
        Ok(exp)
    }

    fn parse_call_rest(&mut self, callee: Ident) -> Result<CallExp> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            args.push(self.parse_exp()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(CallExp { callee, args })
    }

    // ==================== Expressions ====================

    pub fn parse_exp(&mut self) -> Result<Exp> {
        self.parse_assign_exp()
    }

    /// Assignment is right-associative and binds loosest; the left side
    /// must be a plain location (identifier or dot-access chain).
    fn parse_assign_exp(&mut self) -> Result<Exp> {
        let lhs = self.parse_or_exp()?;
        if self.check(&TokenKind::Assign) {
            if !matches!(lhs, Exp::Ident(_) | Exp::Dot(_)) {
                return Err(Error::UnexpectedToken {
                    expected: "assignable location".to_string(),
                    got: "`=`".to_string(),
                    span: self.current().span,
                });
            }
            self.advance();
            let rhs = self.parse_assign_exp()?;
            return Ok(Exp::Assign(Box::new(AssignExp { lhs, rhs })));
        }
        Ok(lhs)
    }

    fn parse_or_exp(&mut self) -> Result<Exp> {
        let mut lhs = self.parse_and_exp()?;
        while self.consume(&TokenKind::OrOr) {
            let rhs = self.parse_and_exp()?;
            lhs = Exp::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and_exp(&mut self) -> Result<Exp> {
        let mut lhs = self.parse_equality_exp()?;
        while self.consume(&TokenKind::AndAnd) {
            let rhs = self.parse_equality_exp()?;
            lhs = Exp::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality_exp(&mut self) -> Result<Exp> {
        let mut lhs = self.parse_relational_exp()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational_exp()?;
            lhs = Exp::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational_exp(&mut self) -> Result<Exp> {
        let mut lhs = self.parse_additive_exp()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive_exp()?;
            lhs = Exp::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive_exp(&mut self) -> Result<Exp> {
        let mut lhs = self.parse_multiplicative_exp()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::Plus => BinOp::Plus,
                TokenKind::Minus => BinOp::Minus,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative_exp()?;
            lhs = Exp::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative_exp(&mut self) -> Result<Exp> {
        let mut lhs = self.parse_unary_exp()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::Star => BinOp::Times,
                TokenKind::Slash => BinOp::Divide,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary_exp()?;
            lhs = Exp::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary_exp(&mut self) -> Result<Exp> {
        match self.current_kind() {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary_exp()?;
                Ok(Exp::Unary(UnaryOp::Neg, Box::new(operand)))
            }
            TokenKind::Not => {
                self.advance();
                let operand = self.parse_unary_exp()?;
                Ok(Exp::Unary(UnaryOp::Not, Box::new(operand)))
            }
            _ => self.parse_term(),
        }
    }

    fn parse_term(&mut self) -> Result<Exp> {
        let token = self.current().clone();
        match &token.kind {
            TokenKind::IntLit(value) => {
                self.advance();
                Ok(Exp::IntLit(token.span, *value))
            }
            TokenKind::StrLit(value) => {
                self.advance();
                Ok(Exp::StrLit(token.span, value.clone()))
            }
            TokenKind::True => {
                self.advance();
                Ok(Exp::True(token.span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Exp::False(token.span))
            }
            TokenKind::LParen => {
                self.advance();
                let exp = self.parse_exp()?;
                self.expect(TokenKind::RParen)?;
                Ok(exp)
            }
            TokenKind::Ident(_) => {
                let id = self.parse_ident()?;
                if self.check(&TokenKind::LParen) {
                    let call = self.parse_call_rest(id)?;
                    Ok(Exp::Call(Box::new(call)))
                } else {
                    self.parse_loc_rest(id)
                }
            }
            _ => Err(Error::ExpectedExpr { span: token.span }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Program> {
        let lexer = Lexer::new(source);
        let mut parser = Parser::new(lexer);
        parser.parse_program()
    }

    #[test]
    fn test_empty_main() {
        let program = parse("void main() {}").expect("should parse");
        assert_eq!(program.decls.len(), 1);
        assert!(matches!(program.decls[0], Decl::Fn(_)));
    }

    #[test]
    fn test_globals_struct_and_function() {
        let source = "
            int g;
            struct Point {
                int x;
                int y;
            };
            struct Point p;
            void main() {
                int a;
                a = g + 1;
            }
        ";
        let program = parse(source).expect("should parse");
        assert_eq!(program.decls.len(), 4);
        assert!(matches!(program.decls[0], Decl::Var(_)));
        assert!(matches!(program.decls[1], Decl::Struct(_)));
        assert!(matches!(program.decls[2], Decl::Var(_)));
        assert!(matches!(program.decls[3], Decl::Fn(_)));
    }

    #[test]
    fn test_decls_precede_stmts_in_block() {
        let program = parse("void main() { int x; bool b; x = 1; b = true; }")
            .expect("should parse");
        let Decl::Fn(f) = &program.decls[0] else {
            panic!("expected a function");
        };
        assert_eq!(f.body.decls.len(), 2);
        assert_eq!(f.body.stmts.len(), 2);
    }

    #[test]
    fn test_precedence_or_and() {
        // a || b && c parses as a || (b && c)
        let program = parse("void main() { bool a; a = a || a && a; }").expect("should parse");
        let Decl::Fn(f) = &program.decls[0] else {
            panic!("expected a function");
        };
        let Stmt::Assign(assign) = &f.body.stmts[0] else {
            panic!("expected an assignment");
        };
        let Exp::Binary(BinOp::Or, _, rhs) = &assign.rhs else {
            panic!("expected `||` at the top");
        };
        assert!(matches!(**rhs, Exp::Binary(BinOp::And, _, _)));
    }

    #[test]
    fn test_dot_access_chain() {
        let program = parse("void main() { a.b.c = 1; }").expect("should parse");
        let Decl::Fn(f) = &program.decls[0] else {
            panic!("expected a function");
        };
        let Stmt::Assign(assign) = &f.body.stmts[0] else {
            panic!("expected an assignment");
        };
        let Exp::Dot(outer) = &assign.lhs else {
            panic!("expected a dot-access");
        };
        assert_eq!(outer.field.name, "c");
        assert!(matches!(outer.loc, Exp::Dot(_)));
    }

    #[test]
    fn test_if_else_and_while() {
        let source = "
            void main() {
                if (true) {
                    cout << 1;
                } else {
                    cout << 2;
                }
                while (false) {
                    cout << 3;
                }
                repeat (4) {
                    cout << 5;
                }
            }
        ";
        let program = parse(source).expect("should parse");
        let Decl::Fn(f) = &program.decls[0] else {
            panic!("expected a function");
        };
        assert!(matches!(f.body.stmts[0], Stmt::IfElse(_)));
        assert!(matches!(f.body.stmts[1], Stmt::While(_)));
        assert!(matches!(f.body.stmts[2], Stmt::Repeat(_)));
    }

    #[test]
    fn test_call_statement_and_expression() {
        let program =
            parse("int f(int x) { return x; } void main() { int y; f(1); y = f(2); }")
                .expect("should parse");
        let Decl::Fn(main) = &program.decls[1] else {
            panic!("expected a function");
        };
        assert!(matches!(main.body.stmts[0], Stmt::Call(_)));
    }

    #[test]
    fn test_missing_semicolon_is_an_error() {
        assert!(parse("void main() { int x }").is_err());
    }

    #[test]
    fn test_return_forms() {
        let program = parse("int f() { return 1; } void g() { return; }").expect("should parse");
        let Decl::Fn(f) = &program.decls[0] else {
            panic!("expected a function");
        };
        assert!(matches!(f.body.stmts[0], Stmt::Return(Some(_))));
        let Decl::Fn(g) = &program.decls[1] else {
            panic!("expected a function");
        };
        assert!(matches!(g.body.stmts[0], Stmt::Return(None)));
    }
}
