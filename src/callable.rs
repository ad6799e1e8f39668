//! Callables and instances (§3, §4.3). Grounded in
//! `examples/original_source/clox/ast_interpreter/callable.hpp` and
//! `class.hpp`, reshaped into the canonical tree-walking-Lox `bind()`
//! pattern described in spec.md §5 rather than the original's in-place
//! mutation of a shared class environment (see DESIGN.md).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDef;
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::resolver::Depths;
use crate::token::Token;
use crate::value::Value;

/// Either a fixed parameter count, or "unlimited" (the native `print`,
/// which spec.md §4.3 calls out as exempt from arity checking).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Arity {
    Fixed(usize),
    Unlimited,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => *n == count,
            Arity::Unlimited => true,
        }
    }
}

/// The polymorphic callable value (§3): user function, bound method, class
/// (acting as its own constructor), or native function. All four are
/// reference-shared, per the ownership invariant in §3.
#[derive(Clone)]
pub enum Callable {
    Function(Rc<LoxFunction>),
    Native(Rc<NativeFunction>),
    Class(Rc<LoxClass>),
}

impl Callable {
    pub fn arity(&self) -> Arity {
        match self {
            Callable::Function(f) => Arity::Fixed(f.declaration.params.len()),
            Callable::Native(n) => n.arity,
            Callable::Class(c) => c
                .find_method(&c.name)
                .map(|m| Arity::Fixed(m.declaration.params.len()))
                .unwrap_or(Arity::Fixed(0)),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Callable::Function(f) => &f.declaration.name.lexeme,
            Callable::Native(n) => n.name,
            Callable::Class(c) => &c.name,
        }
    }

    /// Reference identity, used by `Value::lox_eq` (§3: same-kind structural
    /// equality for callables means "the same callable").
    pub fn is_same(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            (Callable::Class(a), Callable::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn call(
        &self,
        interp: &mut Interpreter,
        args: Vec<Value>,
        call_site: &Token,
    ) -> Result<Value, RuntimeError> {
        match self {
            Callable::Function(f) => f.call(interp, args),
            Callable::Native(n) => (n.func)(interp, args, call_site),
            Callable::Class(c) => c.construct(interp, args, call_site),
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(func) => write!(f, "<function {}>", func.declaration.name.lexeme),
            Callable::Native(n) => write!(f, "<native-fn {}>", n.name),
            Callable::Class(c) => write!(f, "<Class {}>", c.name),
        }
    }
}

/// A user-defined function or method. `closure` is the environment active
/// at declaration: for a plain function, the enclosing scope; for a
/// method, the class's environment (see [`LoxFunction::bind`] for how
/// `this` gets layered in without mutating that shared environment).
///
/// `depths` is the side table the resolver produced for the *program* this
/// function was declared in, not for the program currently executing. A
/// REPL reuses one resolver across lines, but each line's parser restarts
/// `NodeId` numbering from zero, so a function declared on one line must
/// keep resolving its own body's identifiers against its own table even
/// while a later, unrelated line is what the interpreter is currently
/// interpreting (see `Interpreter::depths`, which this swaps in for the
/// duration of the call).
pub struct LoxFunction {
    pub declaration: Rc<FunctionDef>,
    pub closure: Environment,
    pub is_initializer: bool,
    pub depths: Rc<Depths>,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDef>,
        closure: Environment,
        is_initializer: bool,
        depths: Rc<Depths>,
    ) -> Rc<Self> {
        Rc::new(LoxFunction {
            declaration,
            closure,
            is_initializer,
            depths,
        })
    }

    /// Produce a fresh callable whose `this` is bound to `instance`. A new
    /// environment layer is inserted between the method's closure and the
    /// call-time parameter scope on *every* binding, so two bound methods
    /// of the same class with different receivers never see each other's
    /// `this` (§5: "binding `this` on one bound method does not clobber it
    /// on another").
    pub fn bind(self: &Rc<Self>, instance: Rc<Instance>) -> Rc<LoxFunction> {
        let env = Environment::child_of(&self.closure);
        env.declare("this", Value::Instance(instance));
        Rc::new(LoxFunction {
            declaration: self.declaration.clone(),
            closure: env,
            is_initializer: self.is_initializer,
            depths: self.depths.clone(),
        })
    }

    pub fn call(&self, interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let env = Environment::child_of(&self.closure);
        for (param, arg) in self.declaration.params.iter().zip(args) {
            env.declare(param.lexeme.clone(), arg);
        }
        let outer_depths = interp.swap_depths(self.depths.clone());
        let result = interp.execute_block(&self.declaration.body, env);
        interp.swap_depths(outer_depths);
        // An initializer, however it finishes, always yields the instance
        // it ran on rather than its own body's value (§5: calling `init()`
        // directly returns `this`, matching what the implicit call inside
        // `LoxClass::construct` expects).
        if self.is_initializer {
            let this = self.closure.get_at(0, "this").expect("initializer closure binds 'this'");
            return match result {
                Ok(()) | Err(crate::interpreter::Signal::Return(_)) => Ok(this),
                Err(crate::interpreter::Signal::Error(e)) => Err(e),
                Err(crate::interpreter::Signal::Break(tok)) | Err(crate::interpreter::Signal::Continue(tok)) => {
                    Err(RuntimeError::at(&tok, "control signal escaped function body"))
                }
            };
        }
        match result {
            Ok(()) => Ok(Value::Nil),
            Err(crate::interpreter::Signal::Return(value)) => Ok(value),
            Err(crate::interpreter::Signal::Error(e)) => Err(e),
            Err(crate::interpreter::Signal::Break(tok)) | Err(crate::interpreter::Signal::Continue(tok)) => {
                Err(RuntimeError::at(&tok, "control signal escaped function body"))
            }
        }
    }
}

/// A native (built-in) function: `clock`, `print`, `read`, `readline`,
/// `bool`, `str`, `num`, `int` (§6; the `int` cast is an addition carried
/// over from `native_function.hpp`, see SPEC_FULL.md §4).
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: Arity,
    #[allow(clippy::type_complexity)]
    pub func: Box<dyn Fn(&mut Interpreter, Vec<Value>, &Token) -> Result<Value, RuntimeError>>,
}

/// A class: name, its methods, and an optional superclass (§3, §4.3).
pub struct LoxClass {
    pub name: Rc<str>,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<Rc<str>, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: Rc<str>,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<Rc<str>, Rc<LoxFunction>>,
    ) -> Self {
        LoxClass {
            name,
            superclass,
            methods,
        }
    }

    /// Method lookup with superclass traversal (§8: "returns the method
    /// defined on the nearest `Cᵢ` that defines `m`, or fails ... if none
    /// do" — the "fails" half lives in the caller, which turns `None` into
    /// a runtime error).
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(m) = self.methods.get(name) {
            return Some(m.clone());
        }
        self.superclass.as_ref().and_then(|sc| sc.find_method(name))
    }

    fn construct(
        self: &Rc<Self>,
        interp: &mut Interpreter,
        args: Vec<Value>,
        call_site: &Token,
    ) -> Result<Value, RuntimeError> {
        let instance = Rc::new(Instance::new(self.clone()));
        if let Some(initializer) = self.find_method(&self.name) {
            let bound = initializer.bind(instance.clone());
            bound.call(interp, args)?;
        } else if !args.is_empty() {
            return Err(RuntimeError::at(
                call_site,
                format!("expected 0 arguments but got {}", args.len()),
            ));
        }
        Ok(Value::Instance(instance))
    }
}

impl fmt::Display for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Class {}>", self.name)
    }
}

/// A class instance: a mutable field map plus a shared reference to its
/// class. Fields shadow methods of the same name (§8, scenario 6).
pub struct Instance {
    pub class: Rc<LoxClass>,
    fields: RefCell<HashMap<Rc<str>, Value>>,
}

impl Instance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Instance {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn set_field(&self, name: impl Into<Rc<str>>, value: Value) {
        self.fields.borrow_mut().insert(name.into(), value);
    }

    /// `GetField` on an instance (§4.3): fields shadow methods; the
    /// initializer cannot be looked up by name from an instance.
    pub fn get_field(self: &Rc<Self>, token: &Token) -> Result<Value, RuntimeError> {
        let name = &token.lexeme;
        if let Some(v) = self.fields.borrow().get(name.as_ref()) {
            return Ok(v.clone());
        }
        if name.as_ref() == self.class.name.as_ref() {
            return Err(RuntimeError::at(
                token,
                "constructor cannot be called on a class instance",
            ));
        }
        if let Some(method) = self.class.find_method(name) {
            let bound = method.bind(self.clone());
            return Ok(Value::Callable(Callable::Function(bound)));
        }
        Err(RuntimeError::at(
            token,
            format!("undefined property '{name}'"),
        ))
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Instance {}>", self.class.name)
    }
}

/// Installs the built-in globals from §6 into a fresh global environment.
pub fn install_natives(env: &Environment) {
    let natives: Vec<(&'static str, Arity, Box<dyn Fn(&mut Interpreter, Vec<Value>, &Token) -> Result<Value, RuntimeError>>)> = vec![
        (
            "clock",
            Arity::Fixed(0),
            Box::new(|_interp, _args, _site| {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default();
                Ok(Value::Number(now.as_secs_f64()))
            }),
        ),
        (
            "print",
            Arity::Unlimited,
            Box::new(|interp, args, _site| {
                let rendered: Vec<String> = args.iter().map(|v| v.to_string()).collect();
                interp.output().write_line(&rendered.join(" "));
                Ok(Value::Nil)
            }),
        ),
        (
            "read",
            Arity::Fixed(0),
            Box::new(|interp, _args, site| {
                interp
                    .read_token()
                    .map(Value::from)
                    .ok_or_else(|| RuntimeError::at(site, "read: end of input"))
            }),
        ),
        (
            "readline",
            Arity::Fixed(0),
            Box::new(|interp, _args, site| {
                interp
                    .read_line()
                    .map(Value::from)
                    .ok_or_else(|| RuntimeError::at(site, "readline: end of input"))
            }),
        ),
        (
            "bool",
            Arity::Fixed(1),
            Box::new(|_interp, args, _site| Ok(Value::Bool(args[0].is_truthy()))),
        ),
        (
            "str",
            Arity::Fixed(1),
            Box::new(|_interp, args, _site| Ok(Value::from(args[0].to_string()))),
        ),
        (
            "num",
            Arity::Fixed(1),
            Box::new(|_interp, args, site| Ok(Value::Number(coerce_to_number(&args[0], site)?))),
        ),
        (
            "int",
            Arity::Fixed(1),
            Box::new(|_interp, args, site| {
                Ok(Value::Number(coerce_to_number(&args[0], site)?.trunc()))
            }),
        ),
    ];

    for (name, arity, func) in natives {
        env.declare(
            name,
            Value::Callable(Callable::Native(Rc::new(NativeFunction { name, arity, func }))),
        );
    }
}

fn coerce_to_number(value: &Value, site: &Token) -> Result<f64, RuntimeError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RuntimeError::at(site, format!("cannot convert '{s}' to a number"))),
        Value::Nil => Ok(0.0),
        other => Err(RuntimeError::at(
            site,
            format!("cannot convert {} to a number", other.type_name()),
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::token::TokenKind;

    fn make_class(name: &str, superclass: Option<Rc<LoxClass>>, method_names: &[&str]) -> Rc<LoxClass> {
        let mut methods = HashMap::new();
        for m in method_names {
            let def = Rc::new(FunctionDef {
                name: Token::new(TokenKind::Identifier, *m, Value::Nil, 1),
                params: vec![],
                body: vec![],
            });
            let function = LoxFunction::new(def, Environment::global(), false, Rc::new(Depths::new()));
            methods.insert(Rc::from(*m), function);
        }
        Rc::new(LoxClass::new(Rc::from(name), superclass, methods))
    }

    #[test]
    fn find_method_walks_up_the_superclass_chain() {
        let base = make_class("Base", None, &["greet"]);
        let mid = make_class("Mid", Some(base.clone()), &[]);
        let leaf = make_class("Leaf", Some(mid), &[]);
        assert!(leaf.find_method("greet").is_some());
        assert!(leaf.find_method("missing").is_none());
    }

    #[test]
    fn nearest_override_wins_over_an_ancestor_definition() {
        let base = make_class("Base", None, &["greet"]);
        let leaf = make_class("Leaf", Some(base.clone()), &["greet"]);
        let found = leaf.find_method("greet").unwrap();
        assert!(!Rc::ptr_eq(&found, base.methods.get("greet").unwrap()));
    }

    #[test]
    fn binding_two_instances_does_not_share_this() {
        let class = make_class("Box", None, &["value"]);
        let method = class.methods.get("value").unwrap();
        let a = Rc::new(Instance::new(class.clone()));
        let b = Rc::new(Instance::new(class.clone()));
        let bound_a = method.bind(a.clone());
        let bound_b = method.bind(b.clone());
        assert!(matches!(bound_a.closure.get_at(0, "this"), Some(Value::Instance(i)) if Rc::ptr_eq(&i, &a)));
        assert!(matches!(bound_b.closure.get_at(0, "this"), Some(Value::Instance(i)) if Rc::ptr_eq(&i, &b)));
    }

    #[test]
    fn instance_field_shadows_a_method_of_the_same_name() {
        let class = make_class("Box", None, &["value"]);
        let instance = Rc::new(Instance::new(class));
        instance.set_field("value", Value::Number(42.0));
        let tok = Token::new(TokenKind::Identifier, "value", Value::Nil, 1);
        let got = instance.get_field(&tok).unwrap();
        assert!(matches!(got, Value::Number(n) if n == 42.0));
    }

    #[test]
    fn looking_up_the_initializer_by_name_on_an_instance_is_rejected() {
        let class = make_class("Point", None, &["Point"]);
        let instance = Rc::new(Instance::new(class));
        let tok = Token::new(TokenKind::Identifier, "Point", Value::Nil, 1);
        assert!(instance.get_field(&tok).is_err());
    }
}
