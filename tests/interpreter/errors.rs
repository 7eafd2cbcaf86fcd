use crate::helpers::execute_with_flags;

#[test]
fn dividing_by_a_string_reports_a_runtime_error() {
    let (_, had_error, had_runtime_error) = execute_with_flags(r#"print 1 / "x";"#);
    assert!(!had_error);
    assert!(had_runtime_error);
}

#[test]
fn an_undefined_variable_is_a_runtime_error() {
    let (_, had_error, had_runtime_error) = execute_with_flags("print missing;");
    assert!(!had_error);
    assert!(had_runtime_error);
}

#[test]
fn a_runtime_error_stops_execution_of_the_rest_of_the_program() {
    let (output, _, had_runtime_error) = execute_with_flags(
        r#"print "before";
print 1 + nil;
print "after";"#,
    );
    assert!(had_runtime_error);
    assert_eq!(output, "before\n");
}

#[test]
fn a_syntax_error_is_a_compile_error_not_a_runtime_one() {
    let (_, had_error, had_runtime_error) = execute_with_flags("var = 1;");
    assert!(had_error);
    assert!(!had_runtime_error);
}

#[test]
fn the_parser_recovers_after_a_syntax_error_and_keeps_checking_later_statements() {
    // The first statement is malformed; the second, on its own, is a
    // legitimate "can't read local in its own initializer" resolver error.
    // Both should be reported rather than the parser giving up entirely.
    let (_, had_error, _) = execute_with_flags(
        r#"var = 1;
{ var a = a; }"#,
    );
    assert!(had_error);
}

#[test]
fn a_program_with_no_errors_never_runs_the_interpreter_on_partial_output() {
    let (output, had_error, had_runtime_error) = execute_with_flags("print 1; print 2;");
    assert!(!had_error);
    assert!(!had_runtime_error);
    assert_eq!(output, "1\n2\n");
}
