//! Section-shaped programs: thunks, the `input` binding, and test blocks.

use santa_rt::{compile, Value};

const SOLUTION: &str = "
let parse = |s| ints(s)

input: \"1 2 3\"

part_one: {
  input |> parse |> sum
}

part_two: {
  input |> parse |> map(_ * 10) |> sum
}

test: {
  input: \"10 20\"
  part_one: \"30\"
}
";

#[test]
fn sections_expose_independent_thunks() {
    let script = compile(SOLUTION).unwrap();
    assert!(script.has_sections());
    let sections = script.sections();
    assert_eq!(sections.len(), 4);
    assert_eq!(sections["input"]().unwrap(), Value::string("1 2 3"));
    assert_eq!(sections["part_one"]().unwrap(), Value::Int(6));
    assert_eq!(sections["part_two"]().unwrap(), Value::Int(60));
}

#[test]
fn section_names_preserve_declaration_order() {
    let script = compile(SOLUTION).unwrap();
    assert_eq!(
        script.section_names(),
        vec!["input", "part_one", "part_two", "test"]
    );
}

#[test]
fn parts_see_the_input_section_value() {
    let source = "input: \"5 5\"\npart_one: input |> ints |> sum";
    let script = compile(source).unwrap();
    assert_eq!(script.sections()["part_one"]().unwrap(), Value::Int(10));
}

#[test]
fn input_can_be_overridden_for_test_runs() {
    let script = compile(SOLUTION).unwrap();
    let result = script
        .run_section_with_input("part_one", Some(Value::string("10 20")))
        .unwrap();
    assert_eq!(result, Value::Int(30));
}

#[test]
fn test_section_evaluates_to_its_blocks() {
    let script = compile(SOLUTION).unwrap();
    let value = script.sections()["test"]().unwrap();
    assert_eq!(value.to_string(), "#{\"input\": \"10 20\", \"part_one\": \"30\"}");
}

#[test]
fn execute_rejects_sectioned_scripts() {
    let err = compile(SOLUTION).unwrap().execute().unwrap_err();
    assert!(err.message.contains("sections()"));
}

#[test]
fn sectionless_scripts_have_no_thunks() {
    let script = compile("1 + 1").unwrap();
    assert!(!script.has_sections());
    assert!(script.sections().is_empty());
    assert_eq!(script.execute().unwrap(), Value::Int(2));
}

#[test]
fn unknown_sections_are_an_error() {
    let script = compile(SOLUTION).unwrap();
    let err = script.run_section_with_input("part_three", None).unwrap_err();
    assert_eq!(err.message, "Unknown section part_three");
}

#[test]
fn top_level_helpers_run_before_each_section() {
    let source = "
let mut calls = 0
let parse = |s| { calls = calls + 1; ints(s) }

input: \"7\"

part_one: (input |> parse |> sum) + calls
";
    let script = compile(source).unwrap();
    // A fresh machine per thunk: the counter starts at zero every run.
    assert_eq!(script.sections()["part_one"]().unwrap(), Value::Int(8));
    assert_eq!(script.sections()["part_one"]().unwrap(), Value::Int(8));
}
