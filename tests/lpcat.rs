//! Integration tests for `lpcat`, driven through [`asptools::run_lpcat`]
//! rather than a spawned binary, covering base spec §8's concrete scenarios.

use std::io::{Cursor, Write};

use asptools::LpError;
use tempfile::NamedTempFile;

fn write_module(text: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(text.as_bytes()).unwrap();
    f
}

fn run(args: &[&str]) -> Result<String, LpError> {
    let mut out = Cursor::new(Vec::new());
    let argv: Vec<String> = std::iter::once("lpcat".to_string())
        .chain(args.iter().map(|s| s.to_string()))
        .collect();
    asptools::run_lpcat(argv, &mut out)?;
    Ok(String::from_utf8(out.into_inner()).unwrap())
}

#[test]
fn single_module_renumbers_atoms_from_one() {
    let m = write_module("1 2 1 0 3\n0\n2 a\n3 b\n0\nB+\n0\nB-\n0\n1\n");
    let out = run(&["-c", m.path().to_str().unwrap()]).unwrap();
    assert!(out.contains("1 1 1 0 2"), "got: {out}");
    assert!(out.contains("1 a"));
    assert!(out.contains("2 b"));
}

#[test]
fn doubly_defined_atom_is_a_module_conflict_under_dash_m() {
    let a = write_module("1 1 0 0\n0\n1 p\n0\nB+\n0\nB-\n0\n1\n");
    let b = write_module("1 1 0 0\n0\n1 p\n0\nB+\n0\nB-\n0\n1\n");
    let err = run(&["-c", "-m", a.path().to_str().unwrap(), b.path().to_str().unwrap()]).unwrap_err();
    match err {
        LpError::ModuleConflict { name } => assert_eq!(name, "p"),
        other => panic!("expected ModuleConflict, got {other:?}"),
    }
}

#[test]
fn cross_module_positive_cycle_is_detected_under_dash_c_dash_m() {
    // Module A: atom 1 named "p" is the head of `p :- q`, atom 2 named "q"
    // is only referenced in the body.
    let a = write_module("1 1 1 0 2\n0\n1 p\n2 q\n0\nB+\n0\nB-\n0\n1\n");
    // Module B: atom 1 named "q" is the head of `q :- p`, atom 2 named "p"
    // resolves (by shared name) to module A's "p".
    let b = write_module("1 1 1 0 2\n0\n1 q\n2 p\n0\nB+\n0\nB-\n0\n1\n");
    let err = run(&["-c", "-m", "-i", a.path().to_str().unwrap(), b.path().to_str().unwrap()]).unwrap_err();
    assert!(matches!(err, LpError::ModuleCycle { .. }), "got {err:?}");
}

#[test]
fn mark_input_without_modular_is_a_cli_usage_error() {
    let m = write_module("1 1 0 0\n0\n1 p\n0\nB+\n0\nB-\n0\n1\n");
    let err = run(&["-i", m.path().to_str().unwrap()]).unwrap_err();
    assert!(matches!(err, LpError::CliUsage(_)));
}

#[test]
fn atom_offset_must_be_positive() {
    let m = write_module("1 1 0 0\n0\n1 p\n0\nB+\n0\nB-\n0\n1\n");
    let err = run(&["-a", "0", m.path().to_str().unwrap()]).unwrap_err();
    assert!(matches!(err, LpError::CliUsage(_)));
}

#[test]
fn atom_offset_shifts_the_first_assigned_number() {
    let m = write_module("1 2 1 0 3\n0\n2 a\n3 b\n0\nB+\n0\nB-\n0\n1\n");
    let out = run(&["-c", "-a", "10", m.path().to_str().unwrap()]).unwrap();
    assert!(out.contains("1 10 1 0 11"), "got: {out}");
}

#[test]
fn atom_offset_accepts_the_attached_equals_spelling() {
    let m = write_module("1 2 1 0 3\n0\n2 a\n3 b\n0\nB+\n0\nB-\n0\n1\n");
    let out = run(&["-c", "-a=10", m.path().to_str().unwrap()]).unwrap();
    assert!(out.contains("1 10 1 0 11"), "got: {out}");
}

#[test]
fn symfile_accepts_the_attached_equals_spelling_and_writes_symbols_only() {
    let m = write_module("1 2 1 0 3\n0\n2 a\n3 b\n0\nB+\n0\nB-\n0\n1\n");
    let sym = NamedTempFile::new().unwrap();
    let symarg = format!("-s={}", sym.path().to_str().unwrap());
    run(&["-c", &symarg, m.path().to_str().unwrap()]).unwrap();
    let written = std::fs::read_to_string(sym.path()).unwrap();
    assert!(written.contains("1 a"));
    assert!(written.contains("2 b"));
    assert!(written.contains("B+"));
}
