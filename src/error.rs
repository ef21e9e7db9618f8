//! Error taxonomy shared by `lpcat` and `lpshift` (base spec §7).
//!
//! Every variant here corresponds to exactly one row of the error table:
//! CLI-usage, IO, Format, ModuleConflict, ModuleCycle, Invariant. Library
//! code always returns `Result<_, LpError>`; only the two binaries' `main`
//! functions turn an `Err` into a program-name-prefixed diagnostic and a
//! process exit code.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum LpError {
    #[error("{0}")]
    CliUsage(String),

    #[error("cannot open file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Format(String),

    #[error("module error: {name} is defined by several modules!")]
    ModuleConflict { name: String },

    #[error("module error: positively interdependent atoms: {}", .atoms.join(" "))]
    ModuleCycle { atoms: Vec<String> },

    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl LpError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        LpError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Print `err` to stderr prefixed with the program name, as base spec §7
/// mandates ("Diagnostics are prefixed with the program name"), and return
/// the process exit code that should follow (always 255 for an `LpError`;
/// callers use `0` on the `Ok` path).
pub fn report(program: &str, err: &impl fmt::Display) -> i32 {
    eprintln!("{program}: {err}");
    255
}
