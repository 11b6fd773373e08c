//! End-to-end language semantics: compile source and execute it.

use santa_rt::{compile, Value};

fn run(source: &str) -> Value {
    compile(source)
        .expect("source should compile")
        .execute()
        .expect("script should execute")
}

fn shown(source: &str) -> String {
    run(source).to_string()
}

// ── Core scenarios ──────────────────────────────────────────────────

#[test]
fn assignment_and_comparison() {
    assert_eq!(run("let mut x = 10; x = x + 2; x >= 12"), Value::Bool(true));
}

#[test]
fn pipeline_into_curried_map() {
    assert_eq!(shown("[1, 2, 3] |> map(|x| x * 2)"), "[2, 4, 6]");
}

#[test]
fn ints_extracts_signed_integers() {
    assert_eq!(shown("ints(\"1 -2 3 foo 4\")"), "[1, -2, 3, 4]");
}

#[test]
fn strings_are_grapheme_indexed() {
    assert_eq!(shown("\"abc\"[0..2]"), "\"ab\"");
    assert_eq!(shown("\"hello\"[-1]"), "\"o\"");
    assert_eq!(shown("\"👨‍👩‍👧‍👦\"[0]"), "\"👨‍👩‍👧‍👦\"");
    assert_eq!(run("size(\"👨‍👩‍👧‍👦\")"), Value::Int(1));
}

#[test]
fn memoized_recursion_hits_the_cache() {
    let source =
        "let fib = memoize(|n| if n < 2 { n } else { fib(n - 1) + fib(n - 2) }); fib(50)";
    assert_eq!(run(source), Value::Int(12_586_269_025));
}

#[test]
fn zip_of_unbounded_range_with_list() {
    assert_eq!(
        shown("1.. |> zip([\"a\", \"b\", \"c\"]) |> take(3)"),
        "[[1, \"a\"], [2, \"b\"], [3, \"c\"]]"
    );
}

// ── Boundary cases ──────────────────────────────────────────────────

#[test]
fn empty_program_is_nil() {
    assert_eq!(run(""), Value::Nil);
}

#[test]
fn empty_block_is_nil() {
    assert_eq!(run("{}"), Value::Nil);
}

// A bounded range ahead of a pipeline needs parentheses: `|>` binds
// tighter than `..`.
#[test]
fn ranges_auto_reverse() {
    assert_eq!(shown("(5..5) |> map(|x| x)"), "[]");
    assert_eq!(shown("(5..=5) |> map(|x| x)"), "[5]");
    assert_eq!(shown("(5..1) |> map(|x| x)"), "[5, 4, 3, 2]");
    assert_eq!(shown("(5..=1) |> map(|x| x)"), "[5, 4, 3, 2, 1]");
}


// ── Operators ───────────────────────────────────────────────────────

#[test]
fn numeric_operators() {
    assert_eq!(run("7 / 2"), Value::Int(3));
    assert_eq!(run("7 % 3"), Value::Int(1));
    assert_eq!(run("1 + 2.5"), Value::Decimal(3.5));
    assert_eq!(shown("1.0 / 0"), "inf");
}

#[test]
fn collection_operators() {
    assert_eq!(shown("[1] + [2, 3]"), "[1, 2, 3]");
    assert_eq!(shown("{1, 2} + {2, 3}"), "{1, 2, 3}");
    assert_eq!(shown("#{\"a\": 1} + #{\"a\": 2, \"b\": 3}"), "#{\"a\": 2, \"b\": 3}");
    assert_eq!(shown("\"ab\" + \"cd\""), "\"abcd\"");
    assert_eq!(shown("\"ab\" * 2"), "\"abab\"");
    assert_eq!(shown("[0] * 3"), "[0, 0, 0]");
}

#[test]
fn structural_equality() {
    assert_eq!(run("[1, [2]] == [1, [2]]"), Value::Bool(true));
    assert_eq!(run("1 == 1.0"), Value::Bool(false));
    assert_eq!(run("#{\"a\": 1} == #{\"a\": 1}"), Value::Bool(true));
}

#[test]
fn truthiness_drives_short_circuits() {
    assert_eq!(run("if 0 { 1 } else { 2 }"), Value::Int(2));
    assert_eq!(shown("\"\" || \"x\""), "\"x\"");
    assert_eq!(run("nil && 1"), Value::Nil);
    assert_eq!(run("1 && 2"), Value::Int(2));
    assert_eq!(run("[] || 5"), Value::Int(5));
    assert_eq!(run("!0"), Value::Bool(true));
    // Even an empty range is truthy.
    assert_eq!(run("if 5..5 { 1 } else { 2 }"), Value::Int(1));
}

#[test]
fn indexing_is_total() {
    assert_eq!(run("[1, 2][5]"), Value::Nil);
    assert_eq!(run("#{\"a\": 1}[\"b\"]"), Value::Nil);
    assert_eq!(run("{1, 2}[1]"), Value::Bool(true));
    assert_eq!(run("{1, 2}[9]"), Value::Bool(false));
    assert_eq!(run("[1, 2, 3][-1]"), Value::Int(3));
    assert_eq!(shown("[1, 2, 3, 4][1..3]"), "[2, 3]");
    assert_eq!(shown("[1, 2, 3, 4][2..]"), "[3, 4]");
}

// ── Functions and closures ──────────────────────────────────────────

#[test]
fn partial_application_curries() {
    assert_eq!(run("let add = |a, b| a + b; add(1)(2)"), Value::Int(3));
    assert_eq!(run("let add = |a, b| a + b; let inc = add(1); inc(41)"), Value::Int(42));
}

#[test]
fn too_many_arguments_fail() {
    let err = compile("let id = |x| x; id(1, 2)")
        .unwrap()
        .execute()
        .unwrap_err();
    assert_eq!(err.message, "Expected 1 arguments, found 2");
}

#[test]
fn closures_share_mutable_cells() {
    let source = "
let counter = || { let mut n = 0; || { n = n + 1; n } }
let c = counter()
c()
c()
c()
";
    assert_eq!(run(source), Value::Int(3));
}

#[test]
fn composition_runs_left_to_right() {
    assert_eq!(
        run("let inc = _ + 1; let double = _ * 2; (inc >> double)(5)"),
        Value::Int(12)
    );
    assert_eq!(shown("[1, 2] |> (map(_ + 1) >> map(_ * 10))"), "[20, 30]");
}

#[test]
fn braced_lambda_bodies_are_blocks() {
    assert_eq!(run("(|n| { n * 2 })(4)"), Value::Int(8));
}

#[test]
fn infix_backtick_calls() {
    assert_eq!(run("let add = |a, b| a + b; 1 `add` 2"), Value::Int(3));
}

#[test]
fn trailing_lambda_sugar_appends_the_argument() {
    assert_eq!(
        run("let with = |coll, f| size(filter(f, coll)); with([1, -2, 3]) |x| x > 0"),
        Value::Int(2)
    );
    assert_eq!(shown("[1, 2, 3] |> map() |x| x * 2"), "[2, 4, 6]");
}

#[test]
fn placeholders_lift_to_lambdas() {
    assert_eq!(shown("filter(_ > 0, [-1, 2, -3, 4])"), "[2, 4]");
    assert_eq!(run("reduce(_ + _, [1, 2, 3])"), Value::Int(6));
    assert_eq!(shown("map(_[0], [[1, 2], [3, 4]])"), "[1, 3]");
}

#[test]
fn self_tail_recursion_runs_in_constant_stack() {
    let source = "let count = |n| if n == 0 { \"done\" } else { count(n - 1) }; count(100000)";
    assert_eq!(shown(source), "\"done\"");
}

#[test]
fn accumulator_style_tail_recursion() {
    let source = "let total = |n, acc| if n == 0 { acc } else { total(n - 1, acc + n) }; total(10000, 0)";
    assert_eq!(run(source), Value::Int(50_005_000));
}

#[test]
fn plain_recursion_through_the_binding_cell() {
    let source = "let fact = |n| if n == 0 { 1 } else { n * fact(n - 1) }; fact(10)";
    assert_eq!(run(source), Value::Int(3_628_800));
}

// ── Bindings and patterns ───────────────────────────────────────────

#[test]
fn destructuring_let() {
    assert_eq!(shown("let [a, ..rest] = [1, 2, 3]; rest"), "[2, 3]");
    assert_eq!(run("let [a, b] = [1, 2]; a + b"), Value::Int(3));
    assert_eq!(run("let [x, .., y] = [1, 2, 3, 4]; x + y"), Value::Int(5));
}

#[test]
fn match_expressions() {
    let source = "
let describe = |x| match x {
  0 { \"zero\" }
  1..=9 { \"small\" }
  [a, ..rest] { \"list\" }
  _ { \"other\" }
}
[describe(0), describe(5), describe([1, 2]), describe(\"hi\")]
";
    assert_eq!(shown(source), "[\"zero\", \"small\", \"list\", \"other\"]");
}

#[test]
fn match_binds_pattern_names() {
    assert_eq!(
        shown("match [1, 2, 3] { [head, ..tail] { [head, tail] } }"),
        "[1, [2, 3]]"
    );
}

#[test]
fn if_let_destructures() {
    assert_eq!(
        run("if let [x] = [42] { x } else { 0 }"),
        Value::Int(42)
    );
    assert_eq!(
        run("if let [x] = [1, 2] { x } else { 0 }"),
        Value::Int(0)
    );
}

#[test]
fn spreads_in_literals_and_calls() {
    assert_eq!(shown("[0, ..[1, 2], 3]"), "[0, 1, 2, 3]");
    assert_eq!(shown("{..[1, 2], 3}"), "{1, 2, 3}");
    assert_eq!(shown("#{..#{\"a\": 1}, \"b\": 2}"), "#{\"a\": 1, \"b\": 2}");
    assert_eq!(
        run("let args = [1, 2]; let add = |a, b| a + b; add(..args)"),
        Value::Int(3)
    );
    assert_eq!(shown("[..1..4]"), "[1, 2, 3]");
}

#[test]
fn dict_shorthand_uses_the_binding_name() {
    assert_eq!(shown("let a = 5; #{a}"), "#{\"a\": 5}");
}

#[test]
fn blocks_scope_and_evaluate_to_their_last_statement() {
    assert_eq!(run("{ let a = 1; let b = 2; a + b }"), Value::Int(3));
    assert_eq!(run("let x = { 1; 2 }\nx"), Value::Int(2));
}

#[test]
fn set_literals_and_membership() {
    assert_eq!(shown("{1, 2, 2, 3}"), "{1, 2, 3}");
    assert_eq!(run("let seen = {\"a\"}; seen[\"a\"]"), Value::Bool(true));
}

#[test]
fn multiline_pipelines_parse_as_one_expression() {
    let source = "
[1, 2, 3, 4]
|> filter(_ % 2 == 0)
|> map(_ * 10)
|> sum()
";
    assert_eq!(run(source), Value::Int(60));
}
