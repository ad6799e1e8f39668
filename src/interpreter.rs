//! The tree-walking evaluator (§4.3, §5): executes a resolved AST directly,
//! without compiling it to bytecode first. Grounded in
//! `examples/original_source/clox/ast_interpreter`'s `Interpreter` class,
//! reshaped around this crate's `Result`-based control flow instead of
//! C++ exceptions.

use std::rc::Rc;

use crate::ast::{Expr, FunctionDef, Stmt};
use crate::callable::{install_natives, Callable, Instance, LoxClass, LoxFunction};
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::output::{InputSource, PrintSink, StdIn, StdOut};
use crate::resolver::Depths;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// What cuts short the normal fall-through execution of a statement
/// sequence. `Error` is an ordinary [`RuntimeError`] that has nowhere
/// closer to be reported than the top of the call stack; the other three
/// are `break`/`continue`/`return`, which the resolver already guarantees
/// can only appear where something up the call stack is prepared to catch
/// them.
#[derive(Debug)]
pub enum Signal {
    Return(Value),
    Break(Token),
    Continue(Token),
    Error(RuntimeError),
}

impl From<RuntimeError> for Signal {
    fn from(e: RuntimeError) -> Self {
        Signal::Error(e)
    }
}

/// Owns the global scope and the ambient I/O the natives in `callable`
/// read and write through (§6). One `Interpreter` is reused across an
/// entire REPL session, the same way the driver reuses one `Resolver`
/// (see `crate::resolver`): declarations from earlier lines stay visible
/// to later ones because they all share `globals`.
pub struct Interpreter {
    pub globals: Environment,
    depths: Rc<Depths>,
    output: Box<dyn PrintSink>,
    input: Box<dyn InputSource>,
}

impl Interpreter {
    pub fn new(output: Box<dyn PrintSink>, input: Box<dyn InputSource>) -> Self {
        let globals = Environment::global();
        install_natives(&globals);
        Interpreter {
            globals,
            depths: Rc::new(Depths::new()),
            output,
            input,
        }
    }

    /// Convenience constructor for the `lox` binary: real stdout and stdin.
    pub fn with_std_io() -> Self {
        Interpreter::new(Box::new(StdOut), Box::new(StdIn::default()))
    }

    pub fn output(&self) -> &dyn PrintSink {
        self.output.as_ref()
    }

    pub fn read_token(&self) -> Option<String> {
        self.input.read_token()
    }

    pub fn read_line(&self) -> Option<String> {
        self.input.read_line()
    }

    /// Install `new_depths` as the table identifier lookups resolve
    /// against, returning whatever table was active before. `callable`
    /// uses this to switch to a function's own table for the duration of
    /// a call and switch back on return (see `LoxFunction::call`).
    pub fn swap_depths(&mut self, new_depths: Rc<Depths>) -> Rc<Depths> {
        std::mem::replace(&mut self.depths, new_depths)
    }

    /// Run one resolved top-level program (a whole file, or one REPL
    /// line) against the persistent global scope. Returns the value of a
    /// lone top-level expression statement, for the REPL to echo (§6); any
    /// other program shape runs for effect and yields `None`.
    pub fn interpret_program(
        &mut self,
        stmts: &[Stmt],
        depths: Depths,
    ) -> Result<Option<Value>, RuntimeError> {
        self.depths = Rc::new(depths);
        if let [Stmt::ExprStmt(expr)] = stmts {
            let env = self.globals.clone();
            return self.eval_expr(expr, &env).map(Some);
        }
        let env = self.globals.clone();
        match self.execute_block(stmts, env) {
            Ok(()) => Ok(None),
            Err(Signal::Error(e)) => Err(e),
            // The resolver rejects `return`/`break`/`continue` outside a
            // function or loop (§4.2), so a top-level program can never
            // actually unwind with one of these.
            Err(Signal::Return(_)) | Err(Signal::Break(_)) | Err(Signal::Continue(_)) => {
                unreachable!("resolver rejects control signals at top level")
            }
        }
    }

    /// Execute `stmts` in `env`, stopping at the first `Signal`. Shared by
    /// top-level program execution and `LoxFunction::call` (§4.3): a
    /// function body is one environment holding params and locals
    /// together, not a nested block scope.
    pub fn execute_block(&mut self, stmts: &[Stmt], env: Environment) -> Result<(), Signal> {
        for stmt in stmts {
            self.execute_stmt(stmt, &env)?;
        }
        Ok(())
    }

    fn execute_stmt(&mut self, stmt: &Stmt, env: &Environment) -> Result<(), Signal> {
        match stmt {
            Stmt::ExprStmt(expr) => {
                self.eval_expr(expr, env)?;
                Ok(())
            }
            Stmt::VarDecl(name, init) => {
                let value = match init {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::Nil,
                };
                env.declare(name.lexeme.clone(), value);
                Ok(())
            }
            Stmt::Assign(target, value) => self.execute_assign(target, value, env),
            Stmt::SetField(object, field, value) => self.execute_set_field(object, field, value, env),
            Stmt::Block(stmts, increment) => self.execute_block_stmt(stmts, increment.as_deref(), env),
            Stmt::If(conditions, branches, else_branch) => {
                for (cond, branch) in conditions.iter().zip(branches) {
                    if self.eval_expr(cond, env)?.is_truthy() {
                        return self.execute_stmt(branch, env);
                    }
                }
                match else_branch {
                    Some(branch) => self.execute_stmt(branch, env),
                    None => Ok(()),
                }
            }
            Stmt::While(cond, body) => self.execute_while(cond, body, env),
            Stmt::Break(tok) => Err(Signal::Break(tok.clone())),
            Stmt::Continue(tok) => Err(Signal::Continue(tok.clone())),
            Stmt::Return(_tok, value) => {
                let value = match value {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::Nil,
                };
                Err(Signal::Return(value))
            }
            Stmt::FunctionDecl(def) => {
                let function = LoxFunction::new(def.clone(), env.clone(), false, self.depths.clone());
                env.declare(
                    def.name.lexeme.clone(),
                    Value::Callable(Callable::Function(function)),
                );
                Ok(())
            }
            Stmt::ClassDecl(name, superclass, methods) => {
                self.execute_class_decl(name, superclass.as_ref(), methods, env)
            }
        }
    }

    fn execute_assign(&mut self, target: &Expr, value: &Expr, env: &Environment) -> Result<(), Signal> {
        let val = self.eval_expr(value, env)?;
        let (id, tok) = match target {
            Expr::Identifier(id, tok) => (*id, tok),
            _ => unreachable!("the parser only produces identifier assignment targets"),
        };
        match self.depths.get(&id) {
            Some(&depth) => env.assign_at(depth, &tok.lexeme, val, tok)?,
            None => env.assign_global(&tok.lexeme, val, tok)?,
        }
        Ok(())
    }

    fn execute_set_field(
        &mut self,
        object: &Expr,
        field: &Token,
        value: &Expr,
        env: &Environment,
    ) -> Result<(), Signal> {
        let object = self.eval_expr(object, env)?;
        let value = self.eval_expr(value, env)?;
        match object {
            Value::Instance(instance) => {
                instance.set_field(field.lexeme.clone(), value);
                Ok(())
            }
            other => Err(RuntimeError::at(
                field,
                format!("cannot set a field on a {}", other.type_name()),
            )
            .into()),
        }
    }

    /// A lexical block (§4.1, §4.3). `increment` is `Some` only for the
    /// block synthesized from a desugared `for` loop: when its statements
    /// unwind with `continue`, the increment still has to run before the
    /// enclosing `while` re-checks its condition, so it's run here rather
    /// than left for `Stmt::While` to notice. Any `continue` that isn't
    /// caught by an increment-carrying block (a plain `while` body, or a
    /// nested block with none of its own) passes straight through to
    /// whichever loop is listening for it.
    fn execute_block_stmt(
        &mut self,
        stmts: &[Stmt],
        increment: Option<&Stmt>,
        env: &Environment,
    ) -> Result<(), Signal> {
        let inner = Environment::child_of(env);
        let result = self.execute_block(stmts, inner.clone());
        match (result, increment) {
            (Err(Signal::Continue(_)), Some(inc)) => self.execute_stmt(inc, &inner),
            (result, _) => result,
        }
    }

    fn execute_while(&mut self, cond: &Expr, body: &Stmt, env: &Environment) -> Result<(), Signal> {
        while self.eval_expr(cond, env)?.is_truthy() {
            match self.execute_stmt(body, env) {
                Ok(()) => {}
                Err(Signal::Break(_)) => break,
                Err(Signal::Continue(_)) => {}
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    fn execute_class_decl(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDef>],
        env: &Environment,
    ) -> Result<(), Signal> {
        let superclass_class = match superclass {
            Some(expr) => match self.eval_expr(expr, env)? {
                Value::Callable(Callable::Class(c)) => Some(c),
                _ => return Err(RuntimeError::at(name, "superclass must be a class").into()),
            },
            None => None,
        };

        env.declare(name.lexeme.clone(), Value::Nil);

        // Methods close over `super_env`: the declaring scope, or a scope
        // one level in with `super` bound, if there's a superclass. There
        // is deliberately no `this` scope created here — `LoxFunction::bind`
        // synthesizes it lazily at call time, landing at the same chain
        // position the resolver assumed when it resolved the method bodies
        // (see DESIGN.md).
        let super_env = match &superclass_class {
            Some(sc) => {
                let scope = Environment::child_of(env);
                scope.declare("super", Value::Callable(Callable::Class(sc.clone())));
                scope
            }
            None => env.clone(),
        };

        let mut method_table = std::collections::HashMap::new();
        for method in methods {
            let is_initializer = method.name.lexeme.as_ref() == name.lexeme.as_ref();
            let function = LoxFunction::new(method.clone(), super_env.clone(), is_initializer, self.depths.clone());
            method_table.insert(method.name.lexeme.clone(), function);
        }

        let class = LoxClass::new(name.lexeme.clone(), superclass_class, method_table);
        env.declare(name.lexeme.clone(), Value::Callable(Callable::Class(Rc::new(class))));
        Ok(())
    }

    fn eval_expr(&mut self, expr: &Expr, env: &Environment) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Grouping(inner) => self.eval_expr(inner, env),
            Expr::Unary(op, operand) => self.eval_unary(op, operand, env),
            Expr::Binary(left, op, right) => self.eval_binary(left, op, right, env),
            Expr::Identifier(id, tok) => self.lookup(*id, &tok.lexeme, tok, env),
            Expr::This(id, tok) => self.lookup(*id, "this", tok, env),
            Expr::Super(id, tok, method) => self.eval_super(*id, tok, method, env),
            Expr::Call(callee, paren, args) => self.eval_call(callee, paren, args, env),
            Expr::GetField(object, field) => self.eval_get_field(object, field, env),
        }
    }

    fn lookup(&self, id: u32, name: &str, tok: &Token, env: &Environment) -> Result<Value, RuntimeError> {
        let found = match self.depths.get(&id) {
            Some(&depth) => env.get_at(depth, name),
            None => env.get_global(name),
        };
        found.ok_or_else(|| RuntimeError::at(tok, format!("undefined variable '{name}'")))
    }

    fn eval_unary(&mut self, op: &Token, operand: &Expr, env: &Environment) -> Result<Value, RuntimeError> {
        let value = self.eval_expr(operand, env)?;
        match op.kind {
            TokenKind::Minus => match value {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(RuntimeError::at(
                    op,
                    format!("cannot negate a {}", other.type_name()),
                )),
            },
            TokenKind::Bang => Ok(Value::Bool(!value.is_truthy())),
            other => unreachable!("{other:?} is not a unary operator"),
        }
    }

    fn eval_binary(
        &mut self,
        left: &Expr,
        op: &Token,
        right: &Expr,
        env: &Environment,
    ) -> Result<Value, RuntimeError> {
        // `and`/`or` short-circuit: the right operand is never evaluated
        // once the left one already decides the result (§4.3).
        match op.kind {
            // Both always yield a `bool`, not whichever operand decided the
            // result (§9 open question, fixed in SPEC_FULL.md §6).
            TokenKind::And => {
                let l = self.eval_expr(left, env)?;
                if !l.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.eval_expr(right, env)?.is_truthy()));
            }
            TokenKind::Or => {
                let l = self.eval_expr(left, env)?;
                if l.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.eval_expr(right, env)?.is_truthy()));
            }
            _ => {}
        }

        let l = self.eval_expr(left, env)?;
        let r = self.eval_expr(right, env)?;
        match op.kind {
            TokenKind::Plus => match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(_), Value::Str(_))
                | (Value::Number(_), Value::Str(_))
                | (Value::Str(_), Value::Number(_)) => Ok(Value::from(format!("{l}{r}"))),
                _ => Err(RuntimeError::at(
                    op,
                    format!("cannot add {} and {}", l.type_name(), r.type_name()),
                )),
            },
            TokenKind::Minus => Ok(Value::Number(num(&l, op)? - num(&r, op)?)),
            TokenKind::Star => Ok(Value::Number(num(&l, op)? * num(&r, op)?)),
            TokenKind::Slash => {
                let divisor = num(&r, op)?;
                if divisor == 0.0 {
                    return Err(RuntimeError::at(op, "division by zero"));
                }
                Ok(Value::Number(num(&l, op)? / divisor))
            }
            TokenKind::Percent => {
                let a = integral(&l, op)?;
                let b = integral(&r, op)?;
                if b == 0 {
                    return Err(RuntimeError::at(op, "modulo by zero"));
                }
                Ok(Value::Number((a % b) as f64))
            }
            TokenKind::Greater => compare(&l, &r, op, |o| o == std::cmp::Ordering::Greater),
            TokenKind::GreaterEqual => compare(&l, &r, op, |o| o != std::cmp::Ordering::Less),
            TokenKind::Less => compare(&l, &r, op, |o| o == std::cmp::Ordering::Less),
            TokenKind::LessEqual => compare(&l, &r, op, |o| o != std::cmp::Ordering::Greater),
            TokenKind::EqualEqual => Ok(Value::Bool(l.lox_eq(&r))),
            TokenKind::BangEqual => Ok(Value::Bool(!l.lox_eq(&r))),
            other => unreachable!("{other:?} is not a binary operator"),
        }
    }

    fn eval_super(
        &mut self,
        id: u32,
        tok: &Token,
        method: &Token,
        env: &Environment,
    ) -> Result<Value, RuntimeError> {
        let depth = *self
            .depths
            .get(&id)
            .expect("resolver always assigns 'super' a depth inside a subclass method");
        let superclass = match env.get_at(depth, "super") {
            Some(Value::Callable(Callable::Class(c))) => c,
            _ => unreachable!("'super' always resolves to a class"),
        };
        let instance = match env.get_at(depth - 1, "this") {
            Some(Value::Instance(i)) => i,
            _ => unreachable!("'this' sits one scope inside 'super'"),
        };
        let found = superclass
            .find_method(&method.lexeme)
            .ok_or_else(|| RuntimeError::at(method, format!("undefined property '{}'", method.lexeme)))?;
        let bound = found.bind(instance);
        Ok(Value::Callable(Callable::Function(bound)))
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        paren: &Token,
        args: &[Expr],
        env: &Environment,
    ) -> Result<Value, RuntimeError> {
        let callee_value = self.eval_expr(callee, env)?;
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval_expr(arg, env)?);
        }
        let callable = match callee_value {
            Value::Callable(c) => c,
            other => {
                return Err(RuntimeError::at(
                    paren,
                    format!("{} is not callable", other.type_name()),
                ))
            }
        };
        if !callable.arity().accepts(arg_values.len()) {
            return Err(RuntimeError::at(
                paren,
                format!(
                    "{} expected {} argument(s) but got {}",
                    callable.name(),
                    describe_arity(callable.arity()),
                    arg_values.len()
                ),
            ));
        }
        callable.call(self, arg_values, paren)
    }

    fn eval_get_field(&mut self, object: &Expr, field: &Token, env: &Environment) -> Result<Value, RuntimeError> {
        match self.eval_expr(object, env)? {
            Value::Instance(instance) => instance.get_field(field),
            other => Err(RuntimeError::at(
                field,
                format!("only instances have fields, found {}", other.type_name()),
            )),
        }
    }
}

fn describe_arity(arity: crate::callable::Arity) -> String {
    match arity {
        crate::callable::Arity::Fixed(n) => n.to_string(),
        crate::callable::Arity::Unlimited => "any number of".to_string(),
    }
}

fn num(value: &Value, op: &Token) -> Result<f64, RuntimeError> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(RuntimeError::at(
            op,
            format!("expected a number, found {}", other.type_name()),
        )),
    }
}

/// `%` requires both operands to already be integer-valued numbers (§4.3);
/// it is not defined for fractional operands.
fn integral(value: &Value, op: &Token) -> Result<i64, RuntimeError> {
    let n = num(value, op)?;
    if n.fract() != 0.0 {
        return Err(RuntimeError::at(op, "'%' requires integer-valued operands"));
    }
    Ok(n as i64)
}

fn compare(
    l: &Value,
    r: &Value,
    op: &Token,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value, RuntimeError> {
    let ordering = match (l, r) {
        (Value::Number(a), Value::Number(b)) => {
            a.partial_cmp(b).ok_or_else(|| RuntimeError::at(op, "cannot compare NaN"))?
        }
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => {
            return Err(RuntimeError::at(
                op,
                format!("cannot compare {} and {}", l.type_name(), r.type_name()),
            ))
        }
    };
    Ok(Value::Bool(accept(ordering)))
}
