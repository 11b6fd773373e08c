//! Built-in function contracts.

use santa_rt::{compile, ConsoleCapture, Value};

fn run(source: &str) -> Value {
    compile(source)
        .expect("source should compile")
        .execute()
        .expect("script should execute")
}

fn shown(source: &str) -> String {
    run(source).to_string()
}

fn run_err(source: &str) -> String {
    compile(source)
        .expect("source should compile")
        .execute()
        .expect_err("script should fail")
        .message
}

// ── Collections ─────────────────────────────────────────────────────

#[test]
fn size_counts_elements_and_graphemes() {
    assert_eq!(run("size(\"héllo\")"), Value::Int(5));
    assert_eq!(run("size([1, 2, 3])"), Value::Int(3));
    assert_eq!(run("size({1, 2})"), Value::Int(2));
    assert_eq!(run("size(#{\"a\": 1})"), Value::Int(1));
    assert_eq!(run("size(1..5)"), Value::Int(4));
    assert_eq!(run("size(1..=5)"), Value::Int(5));
    assert_eq!(run_err("size(1..)"), "Cannot get the size of an unbounded Range");
}

#[test]
fn first_rest_push() {
    assert_eq!(run("first([7, 8])"), Value::Int(7));
    assert_eq!(run("first([])"), Value::Nil);
    assert_eq!(shown("rest([1, 2, 3])"), "[2, 3]");
    assert_eq!(shown("rest(\"abc\")"), "\"bc\"");
    assert_eq!(shown("rest(1..) |> take(2)"), "[2, 3]");
    assert_eq!(shown("push(3, [1, 2])"), "[1, 2, 3]");
    assert_eq!(shown("push(2, {1})"), "{1, 2}");
    assert_eq!(run("first(\"héllo\")"), Value::string("h"));
}

#[test]
fn keys_values_get() {
    assert_eq!(shown("keys(#{\"a\": 1}) |> size"), "1");
    assert_eq!(shown("values(#{\"a\": 7})"), "[7]");
    assert_eq!(run("get(\"a\", #{\"a\": 1})"), Value::Int(1));
    assert_eq!(run("get(\"b\", #{\"a\": 1})"), Value::Nil);
    assert_eq!(run("get(0, [9])"), Value::Int(9));
}

#[test]
fn update_and_assoc() {
    assert_eq!(shown("update(\"k\", _ + 1, #{\"k\": 1})"), "#{\"k\": 2}");
    assert_eq!(
        shown("update(\"k\", |v| if v == nil { 1 } else { v }, #{})"),
        "#{\"k\": 1}"
    );
    assert_eq!(shown("update(0, _ * 2, [1, 2])"), "[2, 2]");
    assert_eq!(shown("assoc(\"b\", 2, #{\"a\": 1})"), "#{\"a\": 1, \"b\": 2}");
    assert_eq!(shown("assoc(1, 9, [1, 2, 3])"), "[1, 9, 3]");
    assert_eq!(shown("assoc(3, 4, [1, 2, 3])"), "[1, 2, 3, 4]");
    assert_eq!(run_err("update(9, _ + 1, [1])"), "Index 9 is out of bounds");
}

#[test]
fn contains_reverse_last_second() {
    assert_eq!(run("contains(2, [1, 2])"), Value::Bool(true));
    assert_eq!(run("contains(\"ell\", \"hello\")"), Value::Bool(true));
    assert_eq!(run("contains(\"x\", {\"a\"})"), Value::Bool(false));
    assert_eq!(run("contains(\"a\", #{\"a\": 1})"), Value::Bool(true));
    assert_eq!(shown("reverse([1, 2, 3])"), "[3, 2, 1]");
    assert_eq!(shown("reverse(\"abc\")"), "\"cba\"");
    assert_eq!(run("last([1, 2, 3])"), Value::Int(3));
    assert_eq!(run("second([1, 2, 3])"), Value::Int(2));
    assert_eq!(run("last([])"), Value::Nil);
}

#[test]
fn sort_and_sort_by() {
    assert_eq!(shown("sort([3, 1, 2])"), "[1, 2, 3]");
    assert_eq!(shown("sort([\"b\", \"a\"])"), "[\"a\", \"b\"]");
    assert_eq!(shown("sort_by(|x| -x, [1, 3, 2])"), "[3, 2, 1]");
    assert_eq!(run_err("sort([1, \"a\"])"), "Cannot compare Integer and String");
}

#[test]
fn min_max_sum() {
    assert_eq!(run("min([3, 1, 2])"), Value::Int(1));
    assert_eq!(run("max([3, 1, 2])"), Value::Int(3));
    assert_eq!(run("min([])"), Value::Nil);
    assert_eq!(run("sum([1, 2, 3])"), Value::Int(6));
    assert_eq!(run("sum(1..=10)"), Value::Int(55));
    assert_eq!(run("sum([1, 0.5])"), Value::Decimal(1.5));
}

// ── Sequences ───────────────────────────────────────────────────────

#[test]
fn fold_reduce_each_honor_break() {
    assert_eq!(run("fold(0, |acc, x| acc + x, [1, 2, 3])"), Value::Int(6));
    assert_eq!(run("[1, 2, 3] |> fold(0, _ + _)"), Value::Int(6));
    assert_eq!(
        run("fold(0, |acc, x| if x > 2 { break acc } else { acc + x }, [1, 2, 3, 4])"),
        Value::Int(3)
    );
    assert_eq!(run("reduce(_ + _, [4, 5])"), Value::Int(9));
    assert_eq!(run("reduce(_ + _, [])"), Value::Nil);
    assert_eq!(run("each(|x| x, [1, 2])"), Value::Nil);
}

#[test]
fn fold_s_scans_intermediate_states() {
    assert_eq!(shown("fold_s(0, _ + _, [1, 2, 3])"), "[1, 3, 6]");
    assert_eq!(shown("fold_s(0, _ + _, [])"), "[]");
}

#[test]
fn map_and_filter_shapes() {
    assert_eq!(shown("map(_ * 2, #{\"a\": 1})"), "#{\"a\": 2}");
    assert_eq!(shown("filter(_ > 1, {1, 2, 3})"), "{2, 3}");
    assert_eq!(shown("map(_ * 2, 1..4)"), "[2, 4, 6]");
    assert_eq!(shown("filter_map(|x| if x % 2 == 0 { x * 10 } else { nil }, [1, 2, 3, 4])"), "[20, 40]");
    assert_eq!(shown("flat_map(|x| [x, x], [1, 2])"), "[1, 1, 2, 2]");
}

#[test]
fn lazy_sequences_stay_lazy_until_consumed() {
    assert_eq!(shown("iterate(1, _ * 2) |> take(5)"), "[1, 2, 4, 8, 16]");
    assert_eq!(shown("repeat(\"x\") |> take(2)"), "[\"x\", \"x\"]");
    assert_eq!(shown("cycle([1, 2]) |> take(5)"), "[1, 2, 1, 2, 1]");
    assert_eq!(shown("cycle([]) |> take(3)"), "[]");
    assert_eq!(shown("1.. |> map(_ * 2) |> take(3)"), "[2, 4, 6]");
    assert_eq!(shown("1.. |> filter(|n| n % 2 == 0) |> take(3)"), "[2, 4, 6]");
    assert_eq!(shown("1.. |> skip(2) |> take(2)"), "[3, 4]");
    assert_eq!(run("type(1.. |> map(_ * 2))"), Value::string("LazySequence"));
}

#[test]
fn cons_and_find() {
    assert_eq!(shown("cons(0, [1, 2]) |> take(3)"), "[0, 1, 2]");
    assert_eq!(run("first(cons(9, 1..))"), Value::Int(9));
    assert_eq!(run("find(_ > 10, 1..)"), Value::Int(11));
    assert_eq!(run("find(_ > 10, [1, 2])"), Value::Nil);
}

#[test]
fn zip_materializes_against_any_finite_source() {
    assert_eq!(shown("zip([3, 4], [1, 2])"), "[[1, 3], [2, 4]]");
    assert_eq!(shown("zip([\"a\"], 1..)"), "[[1, \"a\"]]");
    // All-infinite zips stay lazy.
    assert_eq!(run("type(1.. |> zip(repeat(\"x\")))"), Value::string("LazySequence"));
    assert_eq!(shown("1.. |> zip(repeat(\"x\")) |> take(2)"), "[[1, \"x\"], [2, \"x\"]]");
}

#[test]
fn skip_materializes_bounded_input() {
    assert_eq!(shown("skip(1, [1, 2, 3])"), "[2, 3]");
    assert_eq!(shown("skip(5, [1])"), "[]");
}

// ── Strings ─────────────────────────────────────────────────────────

#[test]
fn lines_split_join_chars() {
    assert_eq!(shown("lines(\"a\nb\")"), "[\"a\", \"b\"]");
    assert_eq!(shown("lines(\"a\r\nb\")"), "[\"a\", \"b\"]");
    assert_eq!(shown("split(\",\", \"a,b\")"), "[\"a\", \"b\"]");
    assert_eq!(shown("split(\"\", \"ab\")"), "[\"a\", \"b\"]");
    assert_eq!(shown("join(\"-\", [1, 2])"), "\"1-2\"");
    assert_eq!(shown("join(\", \", [\"a\", \"b\"])"), "\"a, b\"");
    assert_eq!(shown("chars(\"ab\")"), "[\"a\", \"b\"]");
}

#[test]
fn regex_helpers() {
    assert_eq!(shown(r#"regex_match("(\\d+)-(\\d+)", "3-4")"#), "[\"3\", \"4\"]");
    assert_eq!(shown(r#"regex_match("\\d+", "abc 42")"#), "[\"42\"]");
    assert_eq!(shown(r#"regex_match("\\d+", "abc")"#), "[]");
    assert_eq!(shown(r#"regex_match_all("\\d+", "1 2 3")"#), "[\"1\", \"2\", \"3\"]");
}

// ── Conversions and introspection ───────────────────────────────────

#[test]
fn type_names() {
    assert_eq!(run("type(1)"), Value::string("Integer"));
    assert_eq!(run("type(1.5)"), Value::string("Decimal"));
    assert_eq!(run("type(\"s\")"), Value::string("String"));
    assert_eq!(run("type(true)"), Value::string("Boolean"));
    assert_eq!(run("type(nil)"), Value::string("Nil"));
    assert_eq!(run("type([1])"), Value::string("List"));
    assert_eq!(run("type({1})"), Value::string("Set"));
    assert_eq!(run("type(#{})"), Value::string("Dictionary"));
    assert_eq!(run("type(1..2)"), Value::string("Range"));
    assert_eq!(run("type(|x| x)"), Value::string("Function"));
}

#[test]
fn int_parses_and_truncates() {
    assert_eq!(run("int(\"42\")"), Value::Int(42));
    assert_eq!(run("int(\" -7 \")"), Value::Int(-7));
    assert_eq!(run("int(3.9)"), Value::Int(3));
    assert_eq!(run("int(5)"), Value::Int(5));
    assert_eq!(run_err("int(\"abc\")"), "Unable to parse \"abc\" as an Integer");
}

#[test]
fn abs_on_numerics() {
    assert_eq!(run("abs(-3)"), Value::Int(3));
    assert_eq!(run("abs(-2.5)"), Value::Decimal(2.5));
    assert_eq!(run_err("abs(\"x\")"), "Cannot take the absolute value of String");
}

#[test]
fn memoize_requires_hashable_arguments() {
    assert_eq!(run_err("let f = memoize(|x| x); f(|y| y)"), "Cannot hash Function");
    assert_eq!(run("let f = memoize(|x| x * 2); f(4) + f(4)"), Value::Int(16));
}

// ── Console ─────────────────────────────────────────────────────────

#[test]
fn puts_writes_to_the_capture_sink() {
    ConsoleCapture::enable();
    let script = compile("puts(\"answer:\", 42)\nputs()\nputs(\"done\")").unwrap();
    script.execute().unwrap();
    let events = ConsoleCapture::disable();
    // A zero-argument puts emits nothing.
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].message, "answer: 42");
    assert_eq!(events[1].message, "done");
    assert!(events[0].timestamp_ms <= events[1].timestamp_ms);
}

// ── read ────────────────────────────────────────────────────────────

#[test]
fn read_returns_nil_for_missing_files() {
    assert_eq!(run("read(\"/no/such/santa/file.txt\")"), Value::Nil);
}
