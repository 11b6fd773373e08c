//! The diagnostic surface: kinds, messages, spans, and rendering.

use santa_rt::{compile, Diagnostic, ErrorKind};

fn compile_err(source: &str) -> Diagnostic {
    compile(source).expect_err("compilation should fail")
}

fn run_err(source: &str) -> Diagnostic {
    compile(source)
        .expect("source should compile")
        .execute()
        .expect_err("execution should fail")
}

#[test]
fn lex_errors() {
    let err = compile_err("let s = \"open");
    assert_eq!(err.kind, ErrorKind::LexError);
    assert_eq!(err.message, "Unterminated string");

    let err = compile_err("\"bad \\q escape\"");
    assert_eq!(err.kind, ErrorKind::LexError);
    assert_eq!(err.message, "Invalid escape '\\q'");

    let err = compile_err("1 ^ 2");
    assert_eq!(err.message, "Unexpected character '^'");
    assert_eq!(err.span.unwrap().start.column, 3);
}

#[test]
fn syntax_errors() {
    let err = compile_err("let x 5");
    assert_eq!(err.kind, ErrorKind::SyntaxError);
    assert_eq!(err.message, "Expected '=' in let");

    let err = compile_err("(1 + 2");
    assert_eq!(err.message, "Expected ')', found end of input");

    let err = compile_err("1 +");
    assert!(err.message.starts_with("Expected expression"));

    let err = compile_err("match x { 5 }");
    assert_eq!(err.kind, ErrorKind::SyntaxError);
}

#[test]
fn resolve_errors() {
    let err = compile_err("ghost + 1");
    assert_eq!(err.kind, ErrorKind::ResolveError);
    assert_eq!(err.message, "Undefined identifier ghost");

    let err = compile_err("let size = 1");
    assert_eq!(err.message, "Cannot shadow built-in size");

    let err = compile_err("let x = 1; x = 2");
    assert_eq!(err.message, "Cannot assign to immutable variable");

    let err = compile_err("part_one: 1\npart_one: 2");
    assert_eq!(err.message, "Duplicate section part_one");
}

#[test]
fn runtime_type_errors_name_both_operands() {
    let err = run_err("1 + \"a\"");
    assert_eq!(err.kind, ErrorKind::RuntimeError);
    assert_eq!(err.message, "Cannot add Integer and String");

    assert_eq!(run_err("-\"x\"").message, "Cannot negate String");
    assert_eq!(run_err("[1] < [2]").message, "Cannot compare List and List");
    assert_eq!(run_err("3(1)").message, "Cannot call Integer");
    assert_eq!(run_err("nil[0]").message, "Cannot index Nil with Integer");
}

#[test]
fn integer_division_by_zero() {
    assert_eq!(run_err("1 / 0").message, "Division by zero");
    assert_eq!(run_err("1 % 0").message, "Division by zero");
}

#[test]
fn pattern_and_match_failures() {
    assert_eq!(run_err("let [a] = [1, 2]; a").message, "Pattern match failed");
    assert_eq!(run_err("match 9 { 1 { \"one\" } }").message, "Unhandled match value");
}

#[test]
fn unhashable_containers() {
    assert_eq!(run_err("{|x| x}").message, "Cannot hash Function");
    assert_eq!(run_err("#{(1..): 1}").message, "Cannot hash Range");
}

#[test]
fn deep_non_tail_recursion_is_bounded() {
    let source = "let f = |n| if n == 0 { 0 } else { 1 + f(n - 1) }; f(100000)";
    assert_eq!(run_err(source).message, "Maximum call stack depth exceeded");
}

#[test]
fn runtime_errors_carry_the_faulting_span() {
    let err = run_err("let a = 1\na + \"x\"");
    let span = err.span.expect("span attached");
    assert_eq!(span.start.line, 2);
}

#[test]
fn renderer_shows_the_offending_line() {
    let source = "let a = 1\na + \"x\"";
    let rendered = run_err(source).render(source);
    assert_eq!(
        rendered,
        "RuntimeError: Cannot add Integer and String\n  --> line 2, column 1\n    |\n  2 | a + \"x\"\n    | ^"
    );
}

#[test]
fn diagnostics_serialize_for_structured_output() {
    let err = compile_err("ghost");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["kind"], "ResolveError");
    assert_eq!(json["message"], "Undefined identifier ghost");
    assert_eq!(json["span"]["start"]["line"], 1);
}
