//! `lpcat` — module-aware linker for ground ASP programs in SMODELS format.
//!
//! All argument parsing and driving logic lives in
//! [`asptools::cli::run_lpcat`]; this binary only wires it to the process's
//! real argv/stdout and turns an `Err` into the program-name-prefixed
//! diagnostic base spec §7 mandates.

use std::io::{BufWriter, Write};
use std::process::exit;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let result = asptools::run_lpcat(std::env::args_os(), &mut out).and_then(|()| {
        out.flush().map_err(|e| asptools::LpError::io("<stdout>", e))
    });

    if let Err(err) = result {
        let code = asptools::error::report("lpcat", &err);
        exit(code);
    }
}
