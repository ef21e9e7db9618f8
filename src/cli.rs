//! Library entry points for the two binaries' `main` functions.
//!
//! Keeping the argument parsing and module-read drivers here (instead of
//! inline in `src/bin/*.rs`) lets the integration tests exercise the exact
//! code a user invokes, without shelling out to a built binary.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use clap::{error::ErrorKind, Arg, ArgAction, Command};

use crate::atom::{Status, SymbolRegistry};
use crate::error::LpError;
use crate::io as lpio;
use crate::io::Style;
use crate::linker::{Lpcat, LpcatOptions};
use crate::scc::OccTable;
use crate::shifter::{shift_program, ShiftOptions};

fn lpcat_cli() -> Command {
    Command::new("lpcat")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Module-aware linker for ground ASP programs in SMODELS format")
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("verbose mode (human readable)"),
        )
        .arg(
            Arg::new("collect")
                .short('c')
                .action(ArgAction::SetTrue)
                .help("collect the entire program in memory"),
        )
        .arg(
            Arg::new("recursive")
                .short('r')
                .action(ArgAction::SetTrue)
                .help("read modules recursively until EOF"),
        )
        .arg(
            Arg::new("modular")
                .short('m')
                .action(ArgAction::SetTrue)
                .help("check module conditions (also SCCs if -c is given)"),
        )
        .arg(
            Arg::new("mark_input")
                .short('i')
                .action(ArgAction::SetTrue)
                .help("mark input atoms (having no defining rules)"),
        )
        .arg(
            Arg::new("meta")
                .short('f')
                .value_name("FILE")
                .action(ArgAction::Append)
                .help("read file names from a file"),
        )
        .arg(
            Arg::new("atom_offset")
                .short('a')
                .value_name("N")
                .help("set the first possible atom number"),
        )
        .arg(
            Arg::new("symfile")
                .short('s')
                .value_name("SYMFILE")
                .help("print a dummy program with symbol names"),
        )
        .arg(Arg::new("files").value_name("FILE").action(ArgAction::Append))
}

fn lpshift_cli() -> Command {
    Command::new("lpshift")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Shift disjunctions in a disjunctive logic program")
        .arg(
            Arg::new("force")
                .short('f')
                .action(ArgAction::SetTrue)
                .help("forced shift (SCCs neglected)"),
        )
        .arg(
            Arg::new("force_bc")
                .long("bc")
                .action(ArgAction::SetTrue)
                .help("force body compression"),
        )
        .arg(
            Arg::new("no_bc")
                .long("nb")
                .action(ArgAction::SetTrue)
                .help("no body compression"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("verbose (human readable) output"),
        )
        .arg(Arg::new("file").value_name("FILE"))
}

/// Parses `cmd` against `args`; on `--help`/`--version` the rendered text is
/// written to `out` and `Ok(None)` is returned (nothing further to run). Any
/// other parse failure becomes `LpError::CliUsage` rather than a process exit,
/// so this function never terminates the process — only the binaries do.
fn parse<I, T>(cmd: Command, args: I, out: &mut dyn Write) -> Result<Option<clap::ArgMatches>, LpError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match cmd.try_get_matches_from(args) {
        Ok(m) => Ok(Some(m)),
        Err(e) => {
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                write!(out, "{e}").map_err(|err| LpError::io("<stdout>", err))?;
                Ok(None)
            } else {
                Err(LpError::CliUsage(e.to_string()))
            }
        }
    }
}

/// `lpcat.c` parses `-a=N`/`-s=FILE` itself via `strncmp(arg, "-a=", 3)` and
/// `&arg[3]`, i.e. the `=` is part of the option spelling, not a clap-style
/// long-option separator. `clap`'s short-option parser hands the `=` to us
/// as part of the attached value (it only strips `=` for `--long=value`),
/// so strip a single leading `=` here to accept the spec's `-a=N` spelling
/// while still tolerating the space-separated `-a N` form clap also allows.
fn strip_attached_eq(s: &str) -> &str {
    s.strip_prefix('=').unwrap_or(s)
}

fn open_reader(name: &str) -> Result<Box<dyn BufRead>, LpError> {
    if name == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let f = File::open(name).map_err(|e| LpError::io(name.to_string(), e))?;
        Ok(Box::new(BufReader::new(f)))
    }
}

fn read_name_line(r: &mut Box<dyn BufRead>) -> Result<Option<String>, LpError> {
    let mut line = String::new();
    let n = r.read_line(&mut line).map_err(|e| LpError::io("<metafile>", e))?;
    if n == 0 {
        return Ok(None);
    }
    let name = line.trim();
    if name.is_empty() {
        return Err(LpError::Format("no filename/newline found".into()));
    }
    Ok(Some(name.to_string()))
}

/// Skips any whitespace-only remainder of `r` and reports whether the stream
/// is genuinely exhausted, so `-r` can tell "another module follows" from
/// "just a trailing newline".
fn at_eof(r: &mut Box<dyn BufRead>) -> Result<bool, LpError> {
    loop {
        let buf = r.fill_buf().map_err(|e| LpError::io("<input>", e))?;
        if buf.is_empty() {
            return Ok(true);
        }
        let skip = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
        if skip == 0 {
            return Ok(false);
        }
        r.consume(skip);
    }
}

fn read_modules(lp: &mut Lpcat, file: &str, recursive: bool, out: &mut dyn Write) -> Result<(), LpError> {
    let mut reader = open_reader(file)?;
    loop {
        tracing::debug!(file, "reading module");
        lp.process_module(&mut reader, out)?;
        if !recursive || at_eof(&mut reader)? {
            break;
        }
    }
    Ok(())
}

/// Runs `lpcat` given an argv-style iterator (`args[0]` is the program name,
/// matching `std::env::args_os()`), writing its program output to `out`.
pub fn run_lpcat<I, T>(args: I, out: &mut dyn Write) -> Result<(), LpError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = match parse(lpcat_cli(), args, out)? {
        Some(m) => m,
        None => return Ok(()),
    };

    let verbose = matches.get_flag("verbose");
    let collect = matches.get_flag("collect");
    let recursive = matches.get_flag("recursive");
    let modular = matches.get_flag("modular");
    let mark_input = matches.get_flag("mark_input");

    if mark_input && !modular {
        return Err(LpError::CliUsage("option -i presumes option -m!".into()));
    }

    let atom_offset = match matches.get_one::<String>("atom_offset") {
        Some(s) => {
            let s = strip_attached_eq(s);
            let n: i64 = s.parse().map_err(|_| LpError::CliUsage(format!("invalid -a value '{s}'")))?;
            if n < 1 {
                return Err(LpError::CliUsage("the first atom number should be positive".into()));
            }
            (n - 1) as u32
        }
        None => 0,
    };

    let symfile = matches
        .get_one::<String>("symfile")
        .map(|s| strip_attached_eq(s).to_string());

    // Reconstruct the command line's original files[]/ismeta[] ordering
    // (lpcat.c interleaves -f metafile markers with plain file arguments
    // and preserves that order across the module-read loop).
    let mut entries: Vec<(usize, bool, String)> = Vec::new();
    if let Some(idxs) = matches.indices_of("meta") {
        let vals: Vec<&String> = matches.get_many::<String>("meta").unwrap().collect();
        entries.extend(idxs.zip(vals).map(|(i, v)| (i, true, v.clone())));
    }
    if let Some(idxs) = matches.indices_of("files") {
        let vals: Vec<&String> = matches.get_many::<String>("files").unwrap().collect();
        entries.extend(idxs.zip(vals).map(|(i, v)| (i, false, v.clone())));
    }
    entries.sort_by_key(|(idx, _, _)| *idx);
    let mut entries: Vec<(bool, String)> = entries.into_iter().map(|(_, is_meta, v)| (is_meta, v)).collect();
    if entries.is_empty() {
        entries.push((false, "-".to_string()));
    }

    let options = LpcatOptions {
        verbose,
        collect,
        modular,
        mark_input,
        atom_offset,
    };
    let mut lp = Lpcat::new(options);

    // `lpcat.c` prints the "% Rules:" banner once, before the module-read
    // loop, only for streaming `-v` output (`-v -c` instead defers to the
    // `% Rules:` banner `Lpcat::finish` prints ahead of the accumulated
    // program).
    if verbose && !collect {
        writeln!(out, "% Rules:\n").map_err(|e| LpError::io("<stdout>", e))?;
    }

    for (is_meta, name) in entries.drain(..) {
        if is_meta {
            let mut meta = open_reader(&name)?;
            while let Some(file) = read_name_line(&mut meta)? {
                read_modules(&mut lp, &file, recursive, out)?;
            }
        } else {
            read_modules(&mut lp, &name, recursive, out)?;
        }
    }

    lp.finish(out)?;

    if let Some(path) = symfile {
        let file = File::create(&path).map_err(|e| LpError::io(path.clone(), e))?;
        let mut w = io::BufWriter::new(file);
        lp.write_symbol_dummy(&mut w)?;
        w.flush().map_err(|e| LpError::io(path, e))?;
    }

    Ok(())
}

/// Runs `lpshift` given an argv-style iterator (`args[0]` is the program
/// name), writing its program output to `out`.
pub fn run_lpshift<I, T>(args: I, out: &mut dyn Write) -> Result<(), LpError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = match parse(lpshift_cli(), args, out)? {
        Some(m) => m,
        None => return Ok(()),
    };

    let opts = ShiftOptions {
        force: matches.get_flag("force"),
        force_bc: matches.get_flag("force_bc"),
        no_bc: matches.get_flag("no_bc"),
    };
    opts.validate()?;
    let verbose = matches.get_flag("verbose");
    let file = matches.get_one::<String>("file").cloned();

    let mut reader = open_reader(file.as_deref().unwrap_or("-"))?;
    let (program, max_atom) = lpio::read_program(&mut reader)?;
    let mut registry = SymbolRegistry::new();
    let mut table = lpio::read_symbols(&mut reader, &mut registry, max_atom)?;
    lpio::read_compute_statement(&mut reader, &table)?;

    table.mark_occurrences(&program);

    let occ = if opts.force {
        None
    } else {
        tracing::debug!("computing positive-dependency SCCs");
        let mut occ = OccTable::from(&table);
        occ.compute_occurrences(&program, Status::NONE);
        occ.compute_sccs(&program, Status::POSOCC);
        Some(occ)
    };

    let shifted = shift_program(&program, &mut table, occ.as_ref(), &opts);

    let style = if verbose { Style::Readable } else { Style::Smodels };
    let fmt_err = |e: io::Error| LpError::Format(e.to_string());

    lpio::write_program(out, style, &shifted, &table).map_err(fmt_err)?;

    if verbose {
        writeln!(out).map_err(fmt_err)?;
        write!(out, "compute {{ ").map_err(fmt_err)?;
        lpio::write_compute_statement(out, style, &table, Status::TRUE_OR_FALSE).map_err(fmt_err)?;
        writeln!(out, " }}.\n").map_err(fmt_err)?;
        write!(out, "E ").map_err(fmt_err)?;
        lpio::write_compute_statement(out, style, &table, Status::INPUT).map_err(fmt_err)?;
        writeln!(out).map_err(fmt_err)?;
    } else {
        lpio::write_symbols(out, style, &table).map_err(fmt_err)?;

        writeln!(out, "B+").map_err(fmt_err)?;
        lpio::write_compute_statement(out, style, &table, Status::TRUE).map_err(fmt_err)?;

        writeln!(out, "B-").map_err(fmt_err)?;
        lpio::write_compute_statement(out, style, &table, Status::FALSE).map_err(fmt_err)?;

        writeln!(out, "E").map_err(fmt_err)?;
        lpio::write_compute_statement(out, style, &table, Status::INPUT).map_err(fmt_err)?;

        // lpshift never computes a model count of its own.
        writeln!(out, "0").map_err(fmt_err)?;
    }

    Ok(())
}
