//! End-to-end tests that run complete programs through the public driver
//! API and assert on the captured output transcript, the way
//! `monty`'s `tests/repl.rs` exercises its own public API directly rather
//! than through a golden-file harness.

use std::rc::Rc;

use pretty_assertions::assert_eq;
use rlox_tree::driver::run_source;
use rlox_tree::error::InterpretationError;
use rlox_tree::output::{CollectOutput, FixedInput};

/// Runs `source` to completion against a fresh global environment and
/// returns its stdout transcript alongside the pipeline result.
fn run(source: &str) -> (String, rlox_tree::Result<()>) {
    let output = Rc::new(CollectOutput::new());

    struct Sniffer(Rc<CollectOutput>);
    impl rlox_tree::output::PrintSink for Sniffer {
        fn write_line(&self, line: &str) {
            self.0.write_line(line);
        }
    }

    let result = run_source(
        source,
        Box::new(Sniffer(output.clone())),
        Box::new(FixedInput::new(Vec::<String>::new())),
    );
    (output.contents(), result)
}

#[test]
fn closures_over_counters() {
    let source = r#"
        fun makeCounter() {
          var i = 0;
          fun count() { i = i + 1; return i; }
          return count;
        }
        var c = makeCounter();
        print(c());
        print(c());
        print(c());
    "#;
    let (output, result) = run(source);
    assert!(result.is_ok());
    assert_eq!(output, "1\n2\n3\n");
}

#[test]
fn resolver_catches_self_initializer() {
    let source = r#"
        var a = "outer";
        { var a = a; }
    "#;
    let (output, result) = run(source);
    assert!(matches!(result, Err(InterpretationError::StaticError)));
    assert!(output.is_empty());
}

#[test]
fn inheritance_and_super() {
    let source = r#"
        class A { speak() { print("A"); } }
        class B : A { speak() { super.speak(); print("B"); } }
        B().speak();
    "#;
    let (output, result) = run(source);
    assert!(result.is_ok());
    assert_eq!(output, "A\nB\n");
}

#[test]
fn for_loop_with_continue_and_break() {
    let source = r#"
        for (var i = 0; i < 5; i = i + 1) {
          if (i == 1) { continue; }
          if (i == 3) { break; }
          print(i);
        }
    "#;
    let (output, result) = run(source);
    assert!(result.is_ok());
    assert_eq!(output, "0\n2\n");
}

#[test]
fn runtime_type_error_on_string_minus_number() {
    let source = r#"print("x" - 1);"#;
    let (output, result) = run(source);
    assert!(matches!(result, Err(InterpretationError::RuntimeError)));
    assert!(output.is_empty());
}

#[test]
fn instance_field_shadows_method() {
    let source = r#"
        class P { m() { return 1; } }
        var p = P();
        p.m = 42;
        print(p.m);
    "#;
    let (output, result) = run(source);
    assert!(result.is_ok());
    assert_eq!(output, "42\n");
}

#[test]
fn elif_chain_picks_the_first_truthy_branch() {
    let source = r#"
        var n = 2;
        if (n == 1) { print("one"); } elif (n == 2) { print("two"); } else { print("other"); }
    "#;
    let (output, result) = run(source);
    assert!(result.is_ok());
    assert_eq!(output, "two\n");
}

#[test]
fn modulo_operator_on_integer_valued_operands() {
    let source = r#"print(7 % 3);"#;
    let (output, result) = run(source);
    assert!(result.is_ok());
    assert_eq!(output, "1\n");
}

#[test]
fn modulo_on_fractional_operand_is_a_runtime_error() {
    let source = r#"print(7.5 % 2);"#;
    let (_, result) = run(source);
    assert!(matches!(result, Err(InterpretationError::RuntimeError)));
}

#[test]
fn number_and_string_coercions() {
    let source = r#"
        print(str(12));
        print(num("3.5") + 1);
        print(bool(""));
        print(int(4.9));
    "#;
    let (output, result) = run(source);
    assert!(result.is_ok());
    assert_eq!(output, "12\n4.50\nfalse\n4\n");
}

#[test]
fn duplicate_declaration_in_one_scope_is_rejected() {
    let source = "{ var a = 1; var a = 2; }";
    let (_, result) = run(source);
    assert!(matches!(result, Err(InterpretationError::StaticError)));
}

#[test]
fn class_extending_itself_is_rejected() {
    let source = "class A : A { }";
    let (_, result) = run(source);
    assert!(matches!(result, Err(InterpretationError::StaticError)));
}

#[test]
fn break_outside_a_loop_is_rejected() {
    let source = "break;";
    let (_, result) = run(source);
    assert!(matches!(result, Err(InterpretationError::StaticError)));
}

#[test]
fn multi_level_inheritance_resolves_to_nearest_definition() {
    let source = r#"
        class A { greet() { print("A"); } }
        class B : A { }
        class C : B { greet() { print("C"); } }
        A().greet();
        B().greet();
        C().greet();
    "#;
    let (output, result) = run(source);
    assert!(result.is_ok());
    assert_eq!(output, "A\nA\nC\n");
}

#[test]
fn read_consumes_whitespace_delimited_tokens() {
    let output = Rc::new(CollectOutput::new());
    struct Sniffer(Rc<CollectOutput>);
    impl rlox_tree::output::PrintSink for Sniffer {
        fn write_line(&self, line: &str) {
            self.0.write_line(line);
        }
    }
    let source = r#"
        print(read());
        print(read());
    "#;
    let result = run_source(
        source,
        Box::new(Sniffer(output.clone())),
        Box::new(FixedInput::new(vec!["42 rest"])),
    );
    assert!(result.is_ok());
    assert_eq!(output.contents(), "42\nrest\n");
}

#[test]
fn readline_consumes_a_whole_line() {
    let output = Rc::new(CollectOutput::new());
    struct Sniffer(Rc<CollectOutput>);
    impl rlox_tree::output::PrintSink for Sniffer {
        fn write_line(&self, line: &str) {
            self.0.write_line(line);
        }
    }
    let source = r#"print(readline());"#;
    let result = run_source(
        source,
        Box::new(Sniffer(output.clone())),
        Box::new(FixedInput::new(vec!["hello world"])),
    );
    assert!(result.is_ok());
    assert_eq!(output.contents(), "hello world\n");
}
