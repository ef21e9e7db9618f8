//! `lpshift` — rewrites disjunctive rule heads into equivalent basic or
//! smaller-disjunctive rules (base spec §4.6).
//!
//! All argument parsing and driving logic lives in
//! [`asptools::cli::run_lpshift`]; this binary only wires it to the
//! process's real argv/stdout.

use std::io::{BufWriter, Write};
use std::process::exit;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let result = asptools::run_lpshift(std::env::args_os(), &mut out).and_then(|()| {
        out.flush().map_err(|e| asptools::LpError::io("<stdout>", e))
    });

    if let Err(err) = result {
        let code = asptools::error::report("lpshift", &err);
        exit(code);
    }
}
