//! Static pre-pass (§4.2): walks the AST maintaining a stack of scopes and
//! records, for every resolved-identifier use, the number of scopes between
//! the use and its binding. Also diagnoses misuse of `this`, `super`,
//! `return`, `break`, `continue`, and duplicate declarations.
//!
//! The scope stack's bottom entry is the global scope, seeded with native
//! names (§4.2) and — because the driver reuses one `Resolver` across an
//! entire REPL session — accumulating every top-level `var`/`fun`/`class`
//! name declared on prior lines too. This is what makes "identifiers the
//! resolver did not resolve" (§4.4) a true rarity rather than the common
//! case: a correctly threaded resolver resolves every global with a
//! concrete depth, the same way it resolves a local.
//!
//! The diagnostic sink is taken as a parameter to [`Resolver::resolve_program`]
//! rather than stored on the struct: a `Resolver` outlives any one sink
//! borrow (it's reused across an entire REPL session), so it cannot hold an
//! exclusive reference to one for its own lifetime.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Expr, FunctionDef, NodeId, Stmt};
use crate::error::ErrorSink;
use crate::token::Token;

#[derive(Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// The depth side table produced by a resolve pass: maps a resolvable
/// node's [`NodeId`] to the number of enclosing scopes to its binding.
pub type Depths = HashMap<NodeId, usize>;

pub struct Resolver {
    scopes: Vec<HashMap<Rc<str>, bool>>,
    depths: Depths,
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
}

impl Resolver {
    pub fn new(native_names: &[&str]) -> Self {
        let mut global = HashMap::new();
        for name in native_names {
            global.insert(Rc::from(*name), true);
        }
        Resolver {
            scopes: vec![global],
            depths: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
        }
    }

    /// Resolve one top-level program (a whole script, or one REPL line) and
    /// return that program's depth table. Declarations at the outermost
    /// level are written into the (persistent) global scope.
    pub fn resolve_program(&mut self, stmts: &[Stmt], sink: &mut ErrorSink) -> Depths {
        self.resolve_stmts(stmts, sink);
        std::mem::take(&mut self.depths)
    }

    fn resolve_stmts(&mut self, stmts: &[Stmt], sink: &mut ErrorSink) {
        for stmt in stmts {
            self.resolve_stmt(stmt, sink);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt, sink: &mut ErrorSink) {
        match stmt {
            Stmt::ExprStmt(e) => self.resolve_expr(e, sink),
            Stmt::VarDecl(name, init) => {
                self.declare(name, sink);
                if let Some(init) = init {
                    self.resolve_expr(init, sink);
                }
                self.define(name);
            }
            Stmt::Assign(target, value) => {
                self.resolve_expr(value, sink);
                self.resolve_expr(target, sink);
            }
            Stmt::SetField(object, _field, value) => {
                self.resolve_expr(value, sink);
                self.resolve_expr(object, sink);
            }
            Stmt::Block(stmts, increment) => {
                self.begin_scope();
                self.resolve_stmts(stmts, sink);
                if let Some(inc) = increment {
                    self.resolve_stmt(inc, sink);
                }
                self.end_scope();
            }
            Stmt::If(conditions, branches, else_branch) => {
                for cond in conditions {
                    self.resolve_expr(cond, sink);
                }
                for branch in branches {
                    self.resolve_stmt(branch, sink);
                }
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch, sink);
                }
            }
            Stmt::While(cond, body) => {
                self.resolve_expr(cond, sink);
                self.loop_depth += 1;
                self.resolve_stmt(body, sink);
                self.loop_depth -= 1;
            }
            Stmt::Break(tok) => {
                if self.loop_depth == 0 {
                    sink.static_error(Some(tok), "'break' used outside of a loop");
                }
            }
            Stmt::Continue(tok) => {
                if self.loop_depth == 0 {
                    sink.static_error(Some(tok), "'continue' used outside of a loop");
                }
            }
            Stmt::Return(tok, value) => {
                if self.current_function == FunctionType::None {
                    sink.static_error(Some(tok), "'return' used outside of a function");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        sink.static_error(Some(tok), "can't return a value from an initializer");
                    }
                    self.resolve_expr(value, sink);
                }
            }
            Stmt::FunctionDecl(def) => {
                self.declare(&def.name, sink);
                self.define(&def.name);
                self.resolve_function(def, FunctionType::Function, sink);
            }
            Stmt::ClassDecl(name, superclass, methods) => {
                self.resolve_class(name, superclass.as_ref(), methods, sink);
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDef>],
        sink: &mut ErrorSink,
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;
        self.declare(name, sink);
        self.define(name);

        if let Some(superclass_expr) = superclass {
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass_expr, sink);
            self.begin_scope();
            self.scopes
                .last_mut()
                .expect("scope stack is never empty")
                .insert(Rc::from("super"), true);
        }

        self.begin_scope();
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(Rc::from("this"), true);

        for method in methods {
            let func_type = if method.name.lexeme.as_ref() == name.lexeme.as_ref() {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, func_type, sink);
        }

        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    /// Enters a scope, defines every parameter, then resolves the body
    /// directly in that same scope — there is no separate block scope for
    /// the function body, matching how the evaluator calls it (§4.3,
    /// `callable::LoxFunction::call`): one environment holds params and
    /// locals together.
    fn resolve_function(&mut self, def: &FunctionDef, func_type: FunctionType, sink: &mut ErrorSink) {
        let enclosing_function = self.current_function;
        self.current_function = func_type;
        self.begin_scope();
        for param in &def.params {
            self.declare(param, sink);
            self.define(param);
        }
        self.resolve_stmts(&def.body, sink);
        self.end_scope();
        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr, sink: &mut ErrorSink) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Grouping(inner) => self.resolve_expr(inner, sink),
            Expr::Unary(_, operand) => self.resolve_expr(operand, sink),
            Expr::Binary(left, _, right) => {
                self.resolve_expr(left, sink);
                self.resolve_expr(right, sink);
            }
            Expr::Identifier(id, tok) => {
                if let Some(current) = self.scopes.last() {
                    if current.get(tok.lexeme.as_ref()) == Some(&false) {
                        sink.static_error(
                            Some(tok),
                            &format!(
                                "can't read local variable '{}' in its own initializer",
                                tok.lexeme
                            ),
                        );
                    }
                }
                self.resolve_local(*id, &tok.lexeme);
            }
            Expr::This(id, tok) => {
                if self.current_class == ClassType::None {
                    sink.static_error(Some(tok), "can't use 'this' outside of a class");
                } else {
                    self.resolve_local(*id, "this");
                }
            }
            Expr::Super(id, tok, _method) => match self.current_class {
                ClassType::None => sink.static_error(Some(tok), "can't use 'super' outside of a class"),
                ClassType::Class => {
                    sink.static_error(Some(tok), "can't use 'super' in a class with no superclass")
                }
                ClassType::Subclass => self.resolve_local(*id, "super"),
            },
            Expr::Call(callee, _paren, args) => {
                self.resolve_expr(callee, sink);
                for arg in args {
                    self.resolve_expr(arg, sink);
                }
            }
            Expr::GetField(object, _field) => self.resolve_expr(object, sink),
        }
    }

    fn resolve_local(&mut self, id: NodeId, name: &str) {
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(name) {
                self.depths.insert(id, self.scopes.len() - 1 - i);
                return;
            }
        }
        // Not found in any scope: treated as a dynamic global lookup at
        // runtime (§4.4) rather than an error here — the interpreter falls
        // back to `Environment::get_global` when no depth is recorded.
    }

    fn declare(&mut self, tok: &Token, sink: &mut ErrorSink) {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        if scope.contains_key(tok.lexeme.as_ref()) {
            sink.static_error(
                Some(tok),
                &format!("variable '{}' already declared in this scope", tok.lexeme),
            );
        }
        scope.insert(tok.lexeme.clone(), false);
    }

    fn define(&mut self, tok: &Token) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(tok.lexeme.clone(), true);
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorSink;
    use crate::parser::Parser;
    use crate::scanner;

    fn resolve(source: &str) -> (Depths, bool) {
        let mut sink = ErrorSink::new();
        let tokens = scanner::scan(source, &mut sink);
        let stmts = Parser::new(tokens, &mut sink).parse_program();
        let depths = Resolver::new(&["clock", "print"]).resolve_program(&stmts, &mut sink);
        (depths, sink.had_static_error())
    }

    #[test]
    fn self_referencing_initializer_is_rejected() {
        let (_, had_error) = resolve("var a = \"outer\"; { var a = a; }");
        assert!(had_error);
    }

    #[test]
    fn duplicate_declaration_in_same_scope_is_rejected() {
        let (_, had_error) = resolve("{ var a = 1; var a = 2; }");
        assert!(had_error);
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let (_, had_error) = resolve("break;");
        assert!(had_error);
    }

    #[test]
    fn return_outside_function_is_rejected() {
        let (_, had_error) = resolve("return 1;");
        assert!(had_error);
    }

    #[test]
    fn this_outside_class_is_rejected() {
        let (_, had_error) = resolve("print(this);");
        assert!(had_error);
    }

    #[test]
    fn super_without_superclass_is_rejected() {
        let (_, had_error) = resolve("class A { m() { super.m(); } }");
        assert!(had_error);
    }

    #[test]
    fn closure_resolves_to_enclosing_function_scope() {
        let (depths, had_error) =
            resolve("fun outer() { var x = 1; fun inner() { return x; } return inner; }");
        assert!(!had_error);
        assert!(!depths.is_empty());
    }

    #[test]
    fn return_value_from_initializer_is_rejected() {
        let (_, had_error) = resolve("class A { A() { return 1; } }");
        assert!(had_error);
    }
}
