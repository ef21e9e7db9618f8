//! Integration tests for `lpshift`, driven through
//! [`asptools::run_lpshift`], covering base spec §8's concrete scenarios.

use std::io::{Cursor, Write};

use tempfile::NamedTempFile;

fn write_module(text: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(text.as_bytes()).unwrap();
    f
}

fn run(args: &[&str]) -> String {
    let mut out = Cursor::new(Vec::new());
    let argv: Vec<String> = std::iter::once("lpshift".to_string())
        .chain(args.iter().map(|s| s.to_string()))
        .collect();
    asptools::run_lpshift(argv, &mut out).unwrap();
    String::from_utf8(out.into_inner()).unwrap()
}

/// `1∨2 :- 3` written `8 2 1 2 1 0 3` (disjunctive, 2 heads, body `[3]`).
fn module_disjunction_over_one_body_atom() -> String {
    "8 2 1 2 1 0 3\n0\n1 a\n2 b\n3 c\n0\nB+\n0\nB-\n0\n1\n".to_string()
}

#[test]
fn forced_shift_splits_disjunction_into_complementary_basic_rules() {
    let m = write_module(&module_disjunction_over_one_body_atom());
    let out = run(&["-f", "-v", m.path().to_str().unwrap()]);
    assert!(out.contains("a :- c, not b."), "got: {out}");
    assert!(out.contains("b :- c, not a."), "got: {out}");
}

/// `1∨2∨3 :- 4,5,6`: three heads, three-literal body; body-compression
/// condition `(n-1)*m = (3-1)*3 = 6 > m+n = 3+3 = 6` is false under default
/// options, so no helper atom is introduced.
fn module_three_way_disjunction() -> String {
    "8 3 1 2 3 3 0 4 5 6\n0\n1 a\n2 b\n3 c\n4 d\n5 e\n6 f\n0\nB+\n0\nB-\n0\n1\n".to_string()
}

#[test]
fn default_options_skip_body_compression_when_not_worthwhile() {
    let m = write_module(&module_three_way_disjunction());
    let out = run(&["-f", "-v", m.path().to_str().unwrap()]);
    assert!(out.contains("a :- d, e, f, not b, not c."), "got: {out}");
    assert!(out.contains("b :- d, e, f, not a, not c."), "got: {out}");
    assert!(out.contains("c :- d, e, f, not a, not b."), "got: {out}");
    assert!(!out.contains("_helper") && !out.contains("body("), "unexpected helper atom: {out}");
}

#[test]
fn force_bc_compresses_the_shared_body_into_a_helper_atom() {
    let m = write_module(&module_three_way_disjunction());
    let out = run(&["-f", "--bc", "-v", m.path().to_str().unwrap()]);
    // The shared three-literal body becomes its own rule, referenced by
    // each complement rule instead of being repeated three times.
    assert!(out.matches("d, e, f").count() == 1, "body should be factored once: {out}");
    assert!(out.contains("not b") && out.contains("not c"), "got: {out}");
}

#[test]
fn bc_and_nb_together_is_a_cli_usage_error() {
    let mut out = Cursor::new(Vec::new());
    let m = write_module(&module_disjunction_over_one_body_atom());
    let argv = vec![
        "lpshift".to_string(),
        "--bc".to_string(),
        "--nb".to_string(),
        m.path().to_str().unwrap().to_string(),
    ];
    let err = asptools::run_lpshift(argv, &mut out).unwrap_err();
    assert!(matches!(err, asptools::LpError::CliUsage(_)));
}
