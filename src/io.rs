//! Wire-format reader/writer for the SMODELS numeric format (base spec §6).
//!
//! Deliberately the least "designed" module in the crate: a direct token
//! scanner over whitespace-separated integers, no serde, no parser
//! combinator — the same register `delta::encoding` uses for its own
//! hand-rolled binary format. The base spec frames the reader/writer as
//! an external collaborator whose implementation "is not prescribed"; this
//! module is that collaborator, built from scratch for this crate's own
//! grammar.

use std::io::{BufRead, Write};
use std::rc::Rc;

use crate::atom::{AtomTable, Slice, Status, Symbol, SymbolRegistry};
use crate::error::LpError;
use crate::rule::{Program, Rule};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Smodels,
    Readable,
}

/// Lazy whitespace-token scanner over a `BufRead`, one line fetched at a
/// time. Atom names and section markers (`B+`, `B-`, `E`) are ordinary
/// tokens; everything else is parsed as an integer on demand.
pub struct TokenReader<'a> {
    inner: &'a mut dyn BufRead,
    pending: std::collections::VecDeque<String>,
}

impl<'a> TokenReader<'a> {
    pub fn new(inner: &'a mut dyn BufRead) -> Self {
        TokenReader {
            inner,
            pending: std::collections::VecDeque::new(),
        }
    }

    fn refill(&mut self) -> Result<bool, LpError> {
        loop {
            let mut line = String::new();
            let n = self
                .inner
                .read_line(&mut line)
                .map_err(|e| LpError::Format(format!("read error: {e}")))?;
            if n == 0 {
                return Ok(false);
            }
            for tok in line.split_whitespace() {
                self.pending.push_back(tok.to_string());
            }
            if !self.pending.is_empty() {
                return Ok(true);
            }
            // blank line: keep reading
        }
    }

    pub fn next_token(&mut self) -> Result<String, LpError> {
        if self.pending.is_empty() && !self.refill()? {
            return Err(LpError::Format("unexpected end of input".into()));
        }
        Ok(self.pending.pop_front().unwrap())
    }

    pub fn peek_token(&mut self) -> Result<Option<String>, LpError> {
        if self.pending.is_empty() && !self.refill()? {
            return Ok(None);
        }
        Ok(self.pending.front().cloned())
    }

    pub fn next_int(&mut self) -> Result<i64, LpError> {
        let tok = self.next_token()?;
        tok.parse::<i64>()
            .map_err(|_| LpError::Format(format!("expected integer, found '{tok}'")))
    }

    fn next_u32(&mut self) -> Result<u32, LpError> {
        let v = self.next_int()?;
        u32::try_from(v).map_err(|_| LpError::Format(format!("expected non-negative atom id, found {v}")))
    }
}

/// *read-program* — scans rules until the terminating `0` type digit,
/// returning the program together with the largest atom id it mentions
/// (used to size the symbol table that follows).
pub fn read_program(reader: &mut dyn BufRead) -> Result<(Program, u32), LpError> {
    let mut toks = TokenReader::new(reader);
    let mut program = Vec::new();
    let mut max_atom = 0u32;
    let mut note = |a: u32, max_atom: &mut u32| {
        if a > *max_atom {
            *max_atom = a;
        }
    };

    loop {
        let kind = toks.next_u32()?;
        if kind == 0 {
            break;
        }
        match kind {
            1 => {
                let head = toks.next_u32()?;
                let len = toks.next_u32()? as usize;
                let neg_len = toks.next_u32()? as usize;
                let pos_len = len - neg_len;
                let neg = read_atoms(&mut toks, neg_len)?;
                let pos = read_atoms(&mut toks, pos_len)?;
                note(head, &mut max_atom);
                for &a in pos.iter().chain(neg.iter()) {
                    note(a, &mut max_atom);
                }
                program.push(Rule::Basic { head, pos, neg });
            }
            2 => {
                let head = toks.next_u32()?;
                let len = toks.next_u32()? as usize;
                let neg_len = toks.next_u32()? as usize;
                let bound = toks.next_int()?;
                let pos_len = len - neg_len;
                let neg = read_atoms(&mut toks, neg_len)?;
                let pos = read_atoms(&mut toks, pos_len)?;
                note(head, &mut max_atom);
                for &a in pos.iter().chain(neg.iter()) {
                    note(a, &mut max_atom);
                }
                program.push(Rule::Constraint { head, bound, pos, neg });
            }
            3 => {
                let head_cnt = toks.next_u32()? as usize;
                let heads = read_atoms(&mut toks, head_cnt)?;
                let len = toks.next_u32()? as usize;
                let neg_len = toks.next_u32()? as usize;
                let pos_len = len - neg_len;
                let neg = read_atoms(&mut toks, neg_len)?;
                let pos = read_atoms(&mut toks, pos_len)?;
                for &a in heads.iter().chain(pos.iter()).chain(neg.iter()) {
                    note(a, &mut max_atom);
                }
                program.push(Rule::Choice { heads, pos, neg });
            }
            4 => {
                let len = toks.next_u32()? as usize;
                let neg_len = toks.next_u32()? as usize;
                let pos_len = len - neg_len;
                let neg = read_atoms(&mut toks, neg_len)?;
                let pos = read_atoms(&mut toks, pos_len)?;
                for &a in pos.iter().chain(neg.iter()) {
                    note(a, &mut max_atom);
                }
                program.push(Rule::Integrity { pos, neg });
            }
            5 => {
                let head = toks.next_u32()?;
                let bound = toks.next_int()?;
                let len = toks.next_u32()? as usize;
                let neg_len = toks.next_u32()? as usize;
                let pos_len = len - neg_len;
                let neg = read_atoms(&mut toks, neg_len)?;
                let pos = read_atoms(&mut toks, pos_len)?;
                let weights = read_ints(&mut toks, neg_len + pos_len)?;
                note(head, &mut max_atom);
                for &a in pos.iter().chain(neg.iter()) {
                    note(a, &mut max_atom);
                }
                program.push(Rule::Weight {
                    head,
                    bound,
                    pos,
                    neg,
                    weights,
                });
            }
            6 => {
                let _zero = toks.next_u32()?;
                let len = toks.next_u32()? as usize;
                let neg_len = toks.next_u32()? as usize;
                let pos_len = len - neg_len;
                let neg = read_atoms(&mut toks, neg_len)?;
                let pos = read_atoms(&mut toks, pos_len)?;
                let weights = read_ints(&mut toks, neg_len + pos_len)?;
                for &a in pos.iter().chain(neg.iter()) {
                    note(a, &mut max_atom);
                }
                program.push(Rule::Optimize { pos, neg, weights });
            }
            8 => {
                let head_cnt = toks.next_u32()? as usize;
                let heads = read_atoms(&mut toks, head_cnt)?;
                let len = toks.next_u32()? as usize;
                let neg_len = toks.next_u32()? as usize;
                let pos_len = len - neg_len;
                let neg = read_atoms(&mut toks, neg_len)?;
                let pos = read_atoms(&mut toks, pos_len)?;
                for &a in heads.iter().chain(pos.iter()).chain(neg.iter()) {
                    note(a, &mut max_atom);
                }
                program.push(Rule::Disjunctive { heads, pos, neg });
            }
            other => return Err(LpError::Format(format!("unsupported rule type {other}"))),
        }
    }

    Ok((program, max_atom))
}

fn read_atoms(toks: &mut TokenReader, n: usize) -> Result<Vec<u32>, LpError> {
    (0..n).map(|_| toks.next_u32()).collect()
}

fn read_ints(toks: &mut TokenReader, n: usize) -> Result<Vec<i64>, LpError> {
    (0..n).map(|_| toks.next_int()).collect()
}

/// *read-symbols* — reads `<atom> <name>` pairs until the terminating `0`,
/// interning names through `registry` so identically-named atoms across
/// calls resolve to the same [`Symbol`]. `max_atom` sizes the contiguous
/// slice backing the returned table (at least every atom mentioned by the
/// preceding rule section, per [`read_program`]'s return value).
pub fn read_symbols(
    reader: &mut dyn BufRead,
    registry: &mut SymbolRegistry,
    max_atom: u32,
) -> Result<AtomTable, LpError> {
    let mut toks = TokenReader::new(reader);
    let slice = Slice::new(max_atom, 0);
    loop {
        let atom = toks.next_u32()?;
        if atom == 0 {
            break;
        }
        let name = toks.next_token()?;
        if atom == 0 || atom > max_atom {
            return Err(LpError::Format(format!(
                "symbol table names atom {atom} outside range [1, {max_atom}]"
            )));
        }
        let sym: Rc<Symbol> = registry.intern(&name);
        slice.borrow_mut().names[atom as usize] = Some(sym);
    }
    Ok(AtomTable::single(slice))
}

/// *read-compute-statement* — `B+`, `B-`, and (when present — lpcat's own
/// extension) `E` sections, each a `0`-terminated atom list, followed by
/// the trailing model-count integer. Marks `TRUE`/`FALSE`/`INPUT` directly
/// on `table`.
pub fn read_compute_statement(reader: &mut dyn BufRead, table: &AtomTable) -> Result<u32, LpError> {
    let mut toks = TokenReader::new(reader);
    read_section(&mut toks, "B+", table, Status::TRUE)?;
    read_section(&mut toks, "B-", table, Status::FALSE)?;
    if let Some(tok) = toks.peek_token()? {
        if tok == "E" {
            read_section(&mut toks, "E", table, Status::INPUT)?;
        }
    }
    let count = toks.next_int()?;
    u32::try_from(count).map_err(|_| LpError::Format(format!("invalid model count {count}")))
}

fn read_section(
    toks: &mut TokenReader,
    header: &str,
    table: &AtomTable,
    bit: Status,
) -> Result<(), LpError> {
    let tok = toks.next_token()?;
    if tok != header {
        return Err(LpError::Format(format!("expected '{header}' section, found '{tok}'")));
    }
    loop {
        let atom = toks.next_u32()?;
        if atom == 0 {
            break;
        }
        if let Some((i, j)) = table.lookup(atom) {
            table.slices[i].borrow_mut().statuses[j as usize].insert(bit);
        }
    }
    Ok(())
}

/// Prints an atom: numeric id in [`Style::Smodels`], its name (or `_N`
/// for an invisible atom) in [`Style::Readable`]. Mirrors `spit_atom`.
pub fn write_atom(out: &mut dyn Write, style: Style, atom: u32, table: &AtomTable) -> std::io::Result<()> {
    match style {
        Style::Smodels => write!(out, " {atom}"),
        Style::Readable => match table.lookup(atom) {
            Some((i, j)) => {
                let s = table.slices[i].borrow();
                match &s.names[j as usize] {
                    Some(sym) => write!(out, "{}", sym.name),
                    None => write!(out, "_{atom}"),
                }
            }
            None => write!(out, "_{atom}"),
        },
    }
}

fn write_literal_list(
    out: &mut dyn Write,
    style: Style,
    pos: &[u32],
    neg: &[u32],
    weights: Option<&[i64]>,
    table: &AtomTable,
) -> std::io::Result<()> {
    match style {
        Style::Smodels => {
            for &a in neg.iter().chain(pos.iter()) {
                write!(out, " {a}")?;
            }
            if let Some(w) = weights {
                for v in w {
                    write!(out, " {v}")?;
                }
            }
        }
        Style::Readable => {
            let total = neg.len() + pos.len();
            let mut printed = 0;
            for (i, &a) in neg.iter().enumerate() {
                write!(out, "not ")?;
                write_atom(out, style, a, table)?;
                if let Some(w) = weights {
                    write!(out, "={}", w[i])?;
                }
                printed += 1;
                if printed != total {
                    write!(out, ", ")?;
                }
            }
            for (i, &a) in pos.iter().enumerate() {
                write_atom(out, style, a, table)?;
                if let Some(w) = weights {
                    write!(out, "={}", w[neg.len() + i])?;
                }
                printed += 1;
                if printed != total {
                    write!(out, ", ")?;
                }
            }
        }
    }
    Ok(())
}

fn write_heads(out: &mut dyn Write, style: Style, heads: &[u32], sep: &str, table: &AtomTable) -> std::io::Result<()> {
    for (i, &h) in heads.iter().enumerate() {
        write_atom(out, style, h, table)?;
        if i + 1 != heads.len() {
            write!(out, "{sep}")?;
        }
    }
    Ok(())
}

/// *write-program* — one rule per call to [`write_rule`], terminated by a
/// `0` line in [`Style::Smodels`] (no terminator is printed in
/// [`Style::Readable`]; callers add their own section banners). Used for
/// the final, single emission of the whole program (`lpcat.c`'s
/// `write_program`, called once at the very end — lpcat.c:400).
pub fn write_program(out: &mut dyn Write, style: Style, program: &Program, table: &AtomTable) -> std::io::Result<()> {
    write_rules(out, style, program, table)?;
    if style == Style::Smodels {
        writeln!(out, "0")?;
    }
    Ok(())
}

/// *spit-program* — writes each rule with no terminator line, for the
/// per-module streaming path (`lpcat.c`'s `spit_program`, lpcat.c:398,
/// called once per module; the single `0` terminator is only ever written
/// once the whole rule stream is done, by [`write_program`]).
pub fn write_rules(out: &mut dyn Write, style: Style, program: &Program, table: &AtomTable) -> std::io::Result<()> {
    for rule in program {
        write_rule(out, style, rule, table)?;
    }
    Ok(())
}

fn write_rule(out: &mut dyn Write, style: Style, rule: &Rule, table: &AtomTable) -> std::io::Result<()> {
    match style {
        Style::Smodels => {
            match rule {
                Rule::Basic { head, pos, neg } => {
                    write!(out, "1 {head} {} {}", pos.len() + neg.len(), neg.len())?;
                    write_literal_list(out, style, pos, neg, None, table)?;
                }
                Rule::Constraint { head, bound, pos, neg } => {
                    write!(out, "2 {head} {} {} {bound}", pos.len() + neg.len(), neg.len())?;
                    write_literal_list(out, style, pos, neg, None, table)?;
                }
                Rule::Choice { heads, pos, neg } => {
                    write!(out, "3 {}", heads.len())?;
                    for h in heads {
                        write!(out, " {h}")?;
                    }
                    write!(out, " {} {}", pos.len() + neg.len(), neg.len())?;
                    write_literal_list(out, style, pos, neg, None, table)?;
                }
                Rule::Integrity { pos, neg } => {
                    write!(out, "4 {} {}", pos.len() + neg.len(), neg.len())?;
                    write_literal_list(out, style, pos, neg, None, table)?;
                }
                Rule::Weight { head, bound, pos, neg, weights } => {
                    write!(out, "5 {head} {bound} {} {}", pos.len() + neg.len(), neg.len())?;
                    write_literal_list(out, style, pos, neg, Some(weights), table)?;
                }
                Rule::Optimize { pos, neg, weights } => {
                    write!(out, "6 0 {} {}", pos.len() + neg.len(), neg.len())?;
                    write_literal_list(out, style, pos, neg, Some(weights), table)?;
                }
                Rule::Disjunctive { heads, pos, neg } => {
                    write!(out, "8 {}", heads.len())?;
                    for h in heads {
                        write!(out, " {h}")?;
                    }
                    write!(out, " {} {}", pos.len() + neg.len(), neg.len())?;
                    write_literal_list(out, style, pos, neg, None, table)?;
                }
            }
            writeln!(out)
        }
        Style::Readable => {
            match rule {
                Rule::Basic { head, pos, neg } => {
                    write_atom(out, style, *head, table)?;
                    if !pos.is_empty() || !neg.is_empty() {
                        write!(out, " :- ")?;
                        write_literal_list(out, style, pos, neg, None, table)?;
                    }
                }
                Rule::Constraint { head, bound, pos, neg } => {
                    write_atom(out, style, *head, table)?;
                    write!(out, " :- {bound} {{ ")?;
                    write_literal_list(out, style, pos, neg, None, table)?;
                    write!(out, " }}")?;
                }
                Rule::Choice { heads, pos, neg } => {
                    write!(out, "{{ ")?;
                    write_heads(out, style, heads, ", ", table)?;
                    write!(out, " }}")?;
                    if !pos.is_empty() || !neg.is_empty() {
                        write!(out, " :- ")?;
                        write_literal_list(out, style, pos, neg, None, table)?;
                    }
                }
                Rule::Integrity { pos, neg } => {
                    write!(out, " :- ")?;
                    write_literal_list(out, style, pos, neg, None, table)?;
                }
                Rule::Weight { head, bound, pos, neg, weights } => {
                    write_atom(out, style, *head, table)?;
                    write!(out, " :- {bound} [ ")?;
                    write_literal_list(out, style, pos, neg, Some(weights), table)?;
                    write!(out, " ]")?;
                }
                Rule::Optimize { pos, neg, weights } => {
                    write!(out, "minimize [ ")?;
                    write_literal_list(out, style, pos, neg, Some(weights), table)?;
                    write!(out, " ]")?;
                }
                Rule::Disjunctive { heads, pos, neg } => {
                    write_heads(out, style, heads, " v ", table)?;
                    if !pos.is_empty() || !neg.is_empty() {
                        write!(out, " :- ")?;
                        write_literal_list(out, style, pos, neg, None, table)?;
                    }
                }
            }
            writeln!(out, ".")
        }
    }
}

/// *write-symbols* — one `atom name` line per named atom, in atom order.
pub fn write_symbols(out: &mut dyn Write, style: Style, table: &AtomTable) -> std::io::Result<()> {
    for slice in &table.slices {
        let s = slice.borrow();
        for i in 1..=s.count as usize {
            if let Some(sym) = &s.names[i] {
                match style {
                    Style::Smodels => writeln!(out, "{} {}", s.offset + i as u32, sym.name)?,
                    Style::Readable => writeln!(out, "{}: {}", s.offset + i as u32, sym.name)?,
                }
            }
        }
    }
    if style == Style::Smodels {
        writeln!(out, "0")?;
    }
    Ok(())
}

/// *write-compute-statement* — every atom whose status intersects `bit`,
/// one per line. Used for `B+`/`B-`/`E` and also for the combined
/// `TRUE|FALSE` rendering under `-v`.
pub fn write_compute_statement(out: &mut dyn Write, style: Style, table: &AtomTable, bit: Status) -> std::io::Result<()> {
    let mut first = true;
    for slice in &table.slices {
        let s = slice.borrow();
        for i in 1..=s.count as usize {
            if s.statuses[i].contains(bit) {
                let atom = s.offset + i as u32;
                match style {
                    Style::Smodels => writeln!(out, "{atom}")?,
                    Style::Readable => {
                        if !first {
                            write!(out, ", ")?;
                        }
                        write_atom(out, style, atom, table)?;
                        first = false;
                    }
                }
            }
        }
    }
    if style == Style::Smodels {
        writeln!(out, "0")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_program_parses_basic_rule() {
        let mut input = Cursor::new("1 1 1 1 2 0\n");
        let (program, max_atom) = read_program(&mut input).unwrap();
        assert_eq!(max_atom, 2);
        assert_eq!(
            program,
            vec![Rule::Basic {
                head: 1,
                pos: vec![2],
                neg: vec![1],
            }]
        );
    }

    #[test]
    fn read_symbols_interns_shared_names() {
        let mut registry = SymbolRegistry::new();
        let mut input = Cursor::new("1 a\n2 b\n0\n");
        let table = read_symbols(&mut input, &mut registry, 2).unwrap();
        let s = table.slices[0].borrow();
        assert_eq!(s.names[1].as_ref().unwrap().name.as_ref(), "a");
        assert_eq!(s.names[2].as_ref().unwrap().name.as_ref(), "b");
    }

    #[test]
    fn read_compute_statement_reads_model_count_without_e_section() {
        let table = AtomTable::single(Slice::new(2, 0));
        let mut input = Cursor::new("B+\n1\n0\nB-\n0\n1\n");
        let n = read_compute_statement(&mut input, &table).unwrap();
        assert_eq!(n, 1);
        assert!(table.slices[0].borrow().statuses[1].contains(Status::TRUE));
    }

    #[test]
    fn read_compute_statement_reads_optional_e_section() {
        let table = AtomTable::single(Slice::new(2, 0));
        let mut input = Cursor::new("B+\n0\nB-\n0\nE\n2\n0\n1\n");
        let n = read_compute_statement(&mut input, &table).unwrap();
        assert_eq!(n, 1);
        assert!(table.slices[0].borrow().statuses[2].contains(Status::INPUT));
    }

    #[test]
    fn write_program_round_trips_through_read_program() {
        let program: Program = vec![Rule::Basic {
            head: 1,
            pos: vec![2],
            neg: vec![],
        }];
        let table = AtomTable::single(Slice::new(2, 0));
        let mut buf = Vec::new();
        write_program(&mut buf, Style::Smodels, &program, &table).unwrap();
        let mut cursor = Cursor::new(buf);
        let (program2, _) = read_program(&mut cursor).unwrap();
        assert_eq!(program, program2);
    }
}
