//! A tree-walking interpreter for [Lox][lox].
//!
//! Unlike [part III][bytecode] of [Crafting Interpreters][book], this crate
//! never compiles to bytecode: `driver` composes a scanner, a recursive-
//! descent parser, a static resolver, and an evaluator that walks the
//! parsed tree directly against a chain of environments.
//!
//! [book]: https://craftinginterpreters.com/
//! [bytecode]: https://craftinginterpreters.com/a-bytecode-virtual-machine.html
//! [lox]: https://craftinginterpreters.com/the-lox-language.html

pub mod ast;
pub mod callable;
pub mod driver;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod output;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

/// The type returned by the scan/parse/resolve/evaluate pipeline. This is
/// the standard [std::result::Result], but the error is always
/// [error::InterpretationError].
///
/// ```
/// fn interpret() -> rlox_tree::Result<()> {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, error::InterpretationError>;

/// Re-exports common items.
///
/// Many callers only need a handful of names to scan, parse, resolve, and
/// run a program; this module gathers them so a caller one level up (the
/// `lox` binary, integration tests) doesn't need to name every module.
pub mod prelude {
    pub use crate::driver::{run_file, run_repl, run_source};
    pub use crate::error::InterpretationError;
    pub use crate::interpreter::Interpreter;
    pub use crate::output::{CollectOutput, FixedInput, InputSource, NoOutput, PrintSink, StdIn, StdOut};
    pub use crate::value::Value;
}
