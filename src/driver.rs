//! Composes the scan/parse/resolve/evaluate pipeline into the two modes
//! described in §6: one-shot batch execution of a file, and a REPL that
//! reuses one global environment and one resolver across lines.
//!
//! Grounded in the teacher's own binary (`eddieantonio-rlox/src/main.rs`,
//! not copied into this workspace) for the argv/exit-code shape, and in
//! `clox`'s `main.cpp`/`Lox::run_prompt`/`Lox::run_file` split for the
//! batch-vs-interactive structure this crate's spec.md §6 distills.

use std::io::{self, Write};

use crate::error::{ErrorSink, InterpretationError};
use crate::interpreter::Interpreter;
use crate::output::{InputSource, PrintSink};
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner;

const NATIVE_NAMES: &[&str] = &["clock", "print", "read", "readline", "bool", "str", "num", "int"];
const REPL_PROMPT: &str = "==> ";

/// Runs a whole source string once, in a fresh global environment. Used by
/// batch mode and by every test that only needs one program's worth of
/// state.
pub fn run_source(
    source: &str,
    output: Box<dyn PrintSink>,
    input: Box<dyn InputSource>,
) -> crate::Result<()> {
    let mut sink = ErrorSink::new();
    let tokens = scanner::scan(source, &mut sink);
    let stmts = Parser::new(tokens, &mut sink).parse_program();
    let depths = Resolver::new(NATIVE_NAMES).resolve_program(&stmts, &mut sink);

    if sink.had_static_error() {
        return Err(InterpretationError::StaticError);
    }

    let mut interp = Interpreter::new(output, input);
    match interp.interpret_program(&stmts, depths) {
        Ok(_) => Ok(()),
        Err(err) => {
            sink.runtime_error(&err);
            Err(InterpretationError::RuntimeError)
        }
    }
}

/// Batch mode (§6): read `path`, run it once, return the process exit code.
pub fn run_file(path: &str) -> i32 {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("can't read file '{path}': {e}");
            return 1;
        }
    };
    match run_source(&source, Box::new(crate::output::StdOut), Box::new(crate::output::StdIn::default())) {
        Ok(()) => 0,
        Err(InterpretationError::StaticError) => 65,
        Err(InterpretationError::RuntimeError) => 70,
    }
}

/// Interactive mode (§6): one persistent global environment and one
/// persistent resolver (so later lines see earlier top-level declarations),
/// prompt `==> `, reading until end-of-input. Each line's static/runtime
/// error flags are independent of the last.
pub fn run_repl() -> i32 {
    let mut sink = ErrorSink::new();
    let mut resolver = Resolver::new(NATIVE_NAMES);
    let mut interp = Interpreter::new(Box::new(crate::output::StdOut), Box::new(crate::output::StdIn::default()));

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{REPL_PROMPT}");
        if io::stdout().flush().is_err() {
            break;
        }
        line.clear();
        let bytes_read = match stdin.read_line(&mut line) {
            Ok(n) => n,
            Err(_) => break,
        };
        if bytes_read == 0 {
            break;
        }

        sink.reset();
        let tokens = scanner::scan(&line, &mut sink);
        let stmts = Parser::new(tokens, &mut sink).parse_program();
        let depths = resolver.resolve_program(&stmts, &mut sink);

        if sink.had_static_error() {
            continue;
        }
        match interp.interpret_program(&stmts, depths) {
            Ok(Some(value)) => println!("{value}"),
            Ok(None) => {}
            Err(err) => sink.runtime_error(&err),
        }
    }
    0
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::output::{CollectOutput, FixedInput};

    #[test]
    fn run_source_reports_static_error_without_evaluating() {
        let result = run_source("var a = a;", Box::new(CollectOutput::new()), Box::new(FixedInput::new(Vec::<String>::new())));
        assert!(matches!(result, Err(InterpretationError::StaticError)));
    }

    #[test]
    fn run_source_reports_runtime_error() {
        let result = run_source("1 / 0;", Box::new(CollectOutput::new()), Box::new(FixedInput::new(Vec::<String>::new())));
        assert!(matches!(result, Err(InterpretationError::RuntimeError)));
    }

    #[test]
    fn run_source_runs_print_through_the_output_sink() {
        let output = std::rc::Rc::new(CollectOutput::new());
        // `run_source` takes ownership of the sink, so route through a
        // type that still lets the test see what was written.
        struct Sniffer(std::rc::Rc<CollectOutput>);
        impl PrintSink for Sniffer {
            fn write_line(&self, line: &str) {
                self.0.write_line(line);
            }
        }
        let result = run_source(
            "print(\"hi\");",
            Box::new(Sniffer(output.clone())),
            Box::new(FixedInput::new(Vec::<String>::new())),
        );
        assert!(result.is_ok());
        assert_eq!(output.contents(), "hi\n");
    }
}
