use std::process::ExitCode;

use rlox_tree::prelude::*;

/// Entry shell (§6): zero arguments runs the REPL, one argument runs a
/// file, two or more is a usage error. Left thin on purpose — everything
/// past argv parsing belongs to `driver`.
fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = match args.as_slice() {
        [] => run_repl(),
        [path] => run_file(path),
        _ => {
            eprintln!("Usage: lox [script]");
            1
        }
    };
    ExitCode::from(code as u8)
}
