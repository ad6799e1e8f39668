//! Recursive-descent parser with single-token lookahead and panic-mode
//! recovery (§4.1). Turns the token stream into top-level statements.
//!
//! The grammar below is spec.md §4.1's, implemented one function per
//! production, precedence fixed by call order (`expression` is the
//! loosest-binding entry point, `primary` the tightest):
//!
//! ```text
//! program     = declaration*
//! declaration = varDecl | funDecl | classDecl | statement
//! statement   = block | ifStmt | whileStmt | forStmt
//!             | breakStmt | continueStmt | returnStmt | assignOrExprStmt
//! expr        = logic_or ... equality ... term ... unary ... call ... primary
//! ```

use std::rc::Rc;

use crate::ast::{Expr, FunctionDef, NodeId, Stmt};
use crate::error::ErrorSink;
use crate::token::{Token, TokenKind};
use crate::value::Value;

const MAX_PARAMS: usize = 255;

/// Marks that a production failed; the actual diagnostic was already sent
/// to the sink at the point of failure. Callers either propagate it with
/// `?` or catch it in `declaration()` to drive synchronization.
struct ParseError;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    sink: &'a mut ErrorSink,
    next_id: NodeId,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, sink: &'a mut ErrorSink) -> Self {
        Parser {
            tokens,
            current: 0,
            sink,
            next_id: 0,
        }
    }

    /// `program = declaration*`. Always attempts to produce a full
    /// program; parse errors are accumulated in the sink, not returned.
    pub fn parse_program(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt);
            }
        }
        stmts
    }

    fn next_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ---- declarations -----------------------------------------------

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_kind(&[TokenKind::Var]) {
            self.var_decl()
        } else if self.match_kind(&[TokenKind::Fun]) {
            self.function_decl()
        } else if self.match_kind(&[TokenKind::Class]) {
            self.class_decl()
        } else {
            self.statement()
        };
        match result {
            Ok(stmt) => Some(stmt),
            Err(ParseError) => {
                self.synchronize();
                None
            }
        }
    }

    fn var_decl(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenKind::Identifier, "expected variable name")?;
        let init = if self.match_kind(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "expected ';' after variable declaration")?;
        Ok(Stmt::VarDecl(name, init))
    }

    fn function_decl(&mut self) -> Result<Stmt, ParseError> {
        let def = self.function_def()?;
        Ok(Stmt::FunctionDecl(Rc::new(def)))
    }

    fn function_def(&mut self) -> Result<FunctionDef, ParseError> {
        let name = self.consume(TokenKind::Identifier, "expected a name")?;
        self.consume(TokenKind::LeftParen, "expected '(' after name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_PARAMS {
                    let tok = self.peek_clone();
                    self.sink
                        .static_error(Some(&tok), "can't have more than 255 parameters");
                }
                params.push(self.consume(TokenKind::Identifier, "expected parameter name")?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "expected ')' after parameters")?;
        let body = self.block_stmts()?;
        Ok(FunctionDef {
            name,
            params,
            body,
        })
    }

    fn class_decl(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenKind::Identifier, "expected class name")?;
        let superclass = if self.match_kind(&[TokenKind::Colon]) {
            let super_name = self.consume(TokenKind::Identifier, "expected superclass name")?;
            if super_name.lexeme == name.lexeme {
                self.sink
                    .static_error(Some(&super_name), "a class cannot inherit from itself");
            }
            Some(Expr::Identifier(self.next_id(), super_name))
        } else {
            None
        };
        self.consume(TokenKind::LeftBrace, "expected '{' before class body")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            let def = self.function_def()?;
            methods.push(Rc::new(def));
        }
        self.consume(TokenKind::RightBrace, "expected '}' after class body")?;
        Ok(Stmt::ClassDecl(name, superclass, methods))
    }

    // ---- statements ---------------------------------------------------

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.check(TokenKind::LeftBrace) {
            return self.block();
        }
        if self.match_kind(&[TokenKind::If]) {
            return self.if_statement();
        }
        if self.match_kind(&[TokenKind::While]) {
            return self.while_statement();
        }
        if self.match_kind(&[TokenKind::For]) {
            return self.for_statement();
        }
        if self.match_kind(&[TokenKind::Break]) {
            let tok = self.previous_clone();
            self.consume(TokenKind::Semicolon, "expected ';' after 'break'")?;
            return Ok(Stmt::Break(tok));
        }
        if self.match_kind(&[TokenKind::Continue]) {
            let tok = self.previous_clone();
            self.consume(TokenKind::Semicolon, "expected ';' after 'continue'")?;
            return Ok(Stmt::Continue(tok));
        }
        if self.match_kind(&[TokenKind::Return]) {
            return self.return_statement();
        }
        self.assign_or_expr_stmt()
    }

    fn block(&mut self) -> Result<Stmt, ParseError> {
        let stmts = self.block_stmts()?;
        Ok(Stmt::Block(stmts, None))
    }

    fn block_stmts(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.consume(TokenKind::LeftBrace, "expected '{'")?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt);
            }
        }
        self.consume(TokenKind::RightBrace, "expected '}' after block")?;
        Ok(stmts)
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        let mut conditions = vec![self.expression()?];
        let mut branches = vec![self.block()?];
        while self.match_kind(&[TokenKind::Elif]) {
            conditions.push(self.expression()?);
            branches.push(self.block()?);
        }
        let else_branch = if self.match_kind(&[TokenKind::Else]) {
            Some(Box::new(self.block()?))
        } else {
            None
        };
        Ok(Stmt::If(conditions, branches, else_branch))
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        let condition = self.expression()?;
        let body = self.block()?;
        Ok(Stmt::While(condition, Box::new(body)))
    }

    /// Desugars into an (optional) initializer followed by a `While` whose
    /// body is a `Block` carrying the increment as out-of-band metadata
    /// (§4.1, §4.3) — see `interpreter::execute_block`.
    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        let initializer = if self.match_kind(&[TokenKind::Semicolon]) {
            None
        } else if self.check(TokenKind::Var) {
            self.advance();
            Some(self.var_decl()?)
        } else {
            Some(self.assign_or_expr_stmt()?)
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "expected ';' after loop condition")?;

        let increment = if !self.check(TokenKind::LeftBrace) {
            Some(self.assignment_statement_body()?)
        } else {
            None
        };

        let body_stmts = self.block_stmts()?;
        let cond = condition.unwrap_or(Expr::Literal(Value::Bool(true)));
        let while_body = Stmt::Block(body_stmts, increment.map(Box::new));
        let while_stmt = Stmt::While(cond, Box::new(while_body));

        Ok(match initializer {
            Some(init) => Stmt::Block(vec![init, while_stmt], None),
            None => while_stmt,
        })
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.previous_clone();
        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "expected ';' after return value")?;
        Ok(Stmt::Return(keyword, value))
    }

    /// `assignOrExprStmt = expr ("=" expr)? ";"`. The left side of an
    /// assignment is validated to be an `Identifier` or `GetField`;
    /// anything else is a static error (§4.1).
    fn assign_or_expr_stmt(&mut self) -> Result<Stmt, ParseError> {
        let stmt = self.assignment_statement_body()?;
        self.consume(TokenKind::Semicolon, "expected ';' after statement")?;
        Ok(stmt)
    }

    fn assignment_statement_body(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.expression()?;
        if self.match_kind(&[TokenKind::Equal]) {
            let equals = self.previous_clone();
            let value = self.expression()?;
            return match expr {
                Expr::Identifier(id, tok) => Ok(Stmt::Assign(Expr::Identifier(id, tok), value)),
                Expr::GetField(object, field) => Ok(Stmt::SetField(*object, field, value)),
                _ => {
                    self.sink.static_error(Some(&equals), "invalid assignment target");
                    Err(ParseError)
                }
            };
        }
        Ok(Stmt::ExprStmt(expr))
    }

    // ---- expressions ----------------------------------------------------

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.logic_or()
    }

    fn logic_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.logic_and()?;
        while self.match_kind(&[TokenKind::Or]) {
            let op = self.previous_clone();
            let right = self.logic_and()?;
            expr = Expr::Binary(Box::new(expr), op, Box::new(right));
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;
        while self.match_kind(&[TokenKind::And]) {
            let op = self.previous_clone();
            let right = self.equality()?;
            expr = Expr::Binary(Box::new(expr), op, Box::new(right));
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.comparison()?;
        while self.match_kind(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let op = self.previous_clone();
            let right = self.comparison()?;
            expr = Expr::Binary(Box::new(expr), op, Box::new(right));
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.term()?;
        while self.match_kind(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let op = self.previous_clone();
            let right = self.term()?;
            expr = Expr::Binary(Box::new(expr), op, Box::new(right));
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.factor()?;
        while self.match_kind(&[TokenKind::Minus, TokenKind::Plus]) {
            let op = self.previous_clone();
            let right = self.factor()?;
            expr = Expr::Binary(Box::new(expr), op, Box::new(right));
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;
        while self.match_kind(&[TokenKind::Slash, TokenKind::Star, TokenKind::Percent]) {
            let op = self.previous_clone();
            let right = self.unary()?;
            expr = Expr::Binary(Box::new(expr), op, Box::new(right));
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_kind(&[TokenKind::Bang, TokenKind::Minus]) {
            let op = self.previous_clone();
            let operand = self.unary()?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.match_kind(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_kind(&[TokenKind::Dot]) {
                let name = self.consume(TokenKind::Identifier, "expected property name after '.'")?;
                expr = Expr::GetField(Box::new(expr), name);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if args.len() >= MAX_PARAMS {
                    let tok = self.peek_clone();
                    self.sink
                        .static_error(Some(&tok), "can't have more than 255 arguments");
                }
                args.push(self.expression()?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "expected ')' after arguments")?;
        Ok(Expr::Call(Box::new(callee), paren, args))
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        if self.match_kind(&[TokenKind::False]) {
            return Ok(Expr::Literal(Value::Bool(false)));
        }
        if self.match_kind(&[TokenKind::True]) {
            return Ok(Expr::Literal(Value::Bool(true)));
        }
        if self.match_kind(&[TokenKind::Nil]) {
            return Ok(Expr::Literal(Value::Nil));
        }
        if self.match_kind(&[TokenKind::Number, TokenKind::Str]) {
            return Ok(Expr::Literal(self.previous().literal.clone()));
        }
        if self.match_kind(&[TokenKind::This]) {
            let tok = self.previous_clone();
            return Ok(Expr::This(self.next_id(), tok));
        }
        if self.match_kind(&[TokenKind::Super]) {
            let keyword = self.previous_clone();
            self.consume(TokenKind::Dot, "expected '.' after 'super'")?;
            let method = self.consume(TokenKind::Identifier, "expected superclass method name")?;
            return Ok(Expr::Super(self.next_id(), keyword, method));
        }
        if self.match_kind(&[TokenKind::Identifier]) {
            let tok = self.previous_clone();
            return Ok(Expr::Identifier(self.next_id(), tok));
        }
        if self.match_kind(&[TokenKind::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "expected ')' after expression")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }
        let tok = self.peek_clone();
        self.sink.static_error(Some(&tok), "expected expression");
        Err(ParseError)
    }

    // ---- token stream plumbing -----------------------------------------

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eos
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_clone(&self) -> Token {
        self.peek().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn previous_clone(&self) -> Token {
        self.previous().clone()
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous_clone()
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn match_kind(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.iter().any(|k| self.check(*k)) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let tok = self.peek_clone();
            self.sink.static_error(Some(&tok), message);
            Err(ParseError)
        }
    }

    /// Discard tokens until a synchronizing boundary: a consumed semicolon,
    /// or the start of a new declaration/statement (§4.1, "Panic-mode
    /// recovery").
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Fun
                | TokenKind::Return
                | TokenKind::Var
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Class
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::LeftBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorSink;
    use crate::scanner;

    fn parse(source: &str) -> (Vec<Stmt>, ErrorSink) {
        let mut sink = ErrorSink::new();
        let tokens = scanner::scan(source, &mut sink);
        let stmts = Parser::new(tokens, &mut sink).parse_program();
        (stmts, sink)
    }

    #[test]
    fn parses_var_decl_and_expr_stmt() {
        let (stmts, sink) = parse("var x = 1 + 2; print(x);");
        assert!(!sink.had_static_error());
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0], Stmt::VarDecl(_, Some(_))));
    }

    #[test]
    fn binary_operators_are_left_associative() {
        let (stmts, sink) = parse("1 - 2 - 3;");
        assert!(!sink.had_static_error());
        match &stmts[0] {
            Stmt::ExprStmt(Expr::Binary(left, _, _)) => {
                assert!(matches!(**left, Expr::Binary(_, _, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_assignment_target_is_static_error() {
        let (_, sink) = parse("1 + 2 = 3;");
        assert!(sink.had_static_error());
    }

    #[test]
    fn if_elif_else_chain() {
        let (stmts, sink) = parse("if (true) { 1; } elif (false) { 2; } else { 3; }");
        assert!(!sink.had_static_error());
        match &stmts[0] {
            Stmt::If(conds, branches, else_branch) => {
                assert_eq!(conds.len(), 2);
                assert_eq!(branches.len(), 2);
                assert!(else_branch.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn for_loop_desugars_to_block_with_while() {
        let (stmts, sink) = parse("for (var i = 0; i < 5; i = i + 1) { print(i); }");
        assert!(!sink.had_static_error());
        match &stmts[0] {
            Stmt::Block(inner, None) => {
                assert_eq!(inner.len(), 2);
                match &inner[1] {
                    Stmt::While(_, body) => match &**body {
                        Stmt::Block(_, Some(_)) => {}
                        other => panic!("expected increment-carrying block, got {other:?}"),
                    },
                    other => panic!("expected while, got {other:?}"),
                }
            }
            other => panic!("expected desugared block, got {other:?}"),
        }
    }

    #[test]
    fn class_with_superclass() {
        let (stmts, sink) = parse("class B : A { init() { } }");
        assert!(!sink.had_static_error());
        assert!(matches!(stmts[0], Stmt::ClassDecl(_, Some(_), _)));
    }

    #[test]
    fn class_extending_itself_is_static_error() {
        let (_, sink) = parse("class A : A { }");
        assert!(sink.had_static_error());
    }

    #[test]
    fn panic_mode_recovers_at_next_statement() {
        let (stmts, sink) = parse("var = ; print(1);");
        assert!(sink.had_static_error());
        assert!(stmts.iter().any(|s| matches!(s, Stmt::ExprStmt(_))));
    }

    #[test]
    fn super_call_parses_method_name() {
        let (stmts, sink) = parse("class B : A { speak() { super.speak(); } }");
        assert!(!sink.had_static_error());
        match &stmts[0] {
            Stmt::ClassDecl(_, _, methods) => {
                assert_eq!(methods.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
