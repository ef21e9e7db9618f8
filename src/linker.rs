//! C5 — Linker core (`lpcat`).
//!
//! Drives C1/C3/C4 across a sequence of modules: each module is read into
//! `(program1, table1)`, cross-referenced against the accumulator
//! `(program2, table2)`, relocated, and either streamed out immediately or
//! folded into the accumulator, following `lpcat.c`'s main loop
//! (§4.5 steps 1-11) one-to-one. Errors propagate as `Result<_, LpError>`
//! instead of the source's direct `exit()` calls.

use std::io::{BufRead, Write};

use crate::atom::{AtomTable, ModuleIds, Status, Symbol, SymbolRegistry};
use crate::error::LpError;
use crate::io::{self, Style};
use crate::relocate::{compress_symbol_table, reloc_program, reloc_symbol_table};
use crate::rule::Program;
use crate::scc::OccTable;
use std::rc::Rc;

#[derive(Clone, Default)]
pub struct LpcatOptions {
    pub verbose: bool,
    pub collect: bool,
    pub modular: bool,
    pub mark_input: bool,
    /// `-a=N`: first assignable atom number; stored as `N - 1`.
    pub atom_offset: u32,
}

pub struct Lpcat {
    options: LpcatOptions,
    registry: SymbolRegistry,
    table2: AtomTable,
    program2: Program,
    module_ids: ModuleIds,
    size2: u32,
    module: u32,
    number2: u32,
}

impl Lpcat {
    pub fn new(options: LpcatOptions) -> Self {
        let size2 = options.atom_offset;
        Lpcat {
            options,
            registry: SymbolRegistry::new(),
            table2: AtomTable::empty(),
            program2: Vec::new(),
            module_ids: ModuleIds::new(),
            size2,
            module: 0,
            number2: 1,
        }
    }

    fn style(&self) -> Style {
        if self.options.verbose {
            Style::Readable
        } else {
            Style::Smodels
        }
    }

    /// One pass of §4.5 steps 1-11 over a single module read from `reader`.
    /// In streaming mode (`collect == false`) the relocated rules are
    /// written to `out` as soon as they're known; in collecting mode they
    /// are folded into the running accumulator instead.
    pub fn process_module(&mut self, reader: &mut dyn BufRead, out: &mut dyn Write) -> Result<(), LpError> {
        let (mut program1, max_atom) = io::read_program(reader)?;
        let mut table1 = io::read_symbols(reader, &mut self.registry, max_atom)?;
        let number1 = io::read_compute_statement(reader, &table1)?;

        if self.options.mark_input {
            self.module += 1;
            table1.mark_io_atoms(&program1, self.module, &mut self.module_ids);
        }

        // initialize-other-tables(table1, table2): table1's `other` slots
        // are already zero, fresh from `Slice::new` — nothing to do.

        let doubly_defined = table1.combine_atom_tables(&self.table2, self.options.modular);
        if let Some(atom) = doubly_defined {
            let name = atom_name(&table1, atom);
            if !self.options.verbose {
                return Err(LpError::ModuleConflict { name });
            } else {
                tracing::warn!(atom = %name, "defined by several modules");
            }
        }

        table1 = table1.make_contiguous();
        table1.mark_visible();
        table1.mark_occurrences(&program1);

        let new_total = reloc_symbol_table(&mut table1, self.size2)?;
        let size1 = new_total - self.size2;

        reloc_program(&mut program1, &table1);
        if !self.options.collect {
            // Streaming mode writes each module's rules as soon as they're
            // relocated (`spit_program`, lpcat.c:398) but never terminates
            // the rule block itself — `finish` emits the single `0`
            // terminator once, after the last module (lpcat.c:400).
            io::write_rules(out, self.style(), &program1, &table1).map_err(|e| LpError::Format(e.to_string()))?;
        }

        table1.transfer_status_bits();

        if size1 > 0 {
            let compressed = compress_symbol_table(&table1, size1, self.size2)?;
            compressed.attach_names_to_table();
            self.table2 = std::mem::replace(&mut self.table2, AtomTable::empty()).append(compressed);
        }

        self.size2 += size1;

        if self.options.collect {
            self.program2.append(&mut program1);
        }

        self.number2 = self.number2.saturating_mul(number1);

        Ok(())
    }

    /// Joint-SCC module-condition check plus final emission (the tail of
    /// `lpcat.c`'s `main`, after every module has been processed).
    pub fn finish(&mut self, out: &mut dyn Write) -> Result<(), LpError> {
        if self.options.modular && self.options.collect {
            let mut occ = OccTable::from(&self.table2);
            occ.compute_occurrences(&self.program2, Status::NONE);
            occ.compute_joint_sccs(&self.program2, &self.module_ids)?;
        }

        if self.table2.slices.len() > 1 {
            self.table2 = std::mem::replace(&mut self.table2, AtomTable::empty()).make_contiguous();
        }

        let style = self.style();
        let wrap = |r: std::io::Result<()>| r.map_err(|e| LpError::Format(e.to_string()));

        if self.options.verbose {
            if self.options.collect {
                writeln!(out, "\n% Rules:\n").map_err(|e| LpError::Format(e.to_string()))?;
                wrap(io::write_program(out, style, &self.program2, &self.table2))?;
            }
            writeln!(out).map_err(|e| LpError::Format(e.to_string()))?;
            write!(out, "compute {{ ").map_err(|e| LpError::Format(e.to_string()))?;
            wrap(io::write_compute_statement(out, style, &self.table2, Status::TRUE_OR_FALSE))?;
            writeln!(out, " }}.\n").map_err(|e| LpError::Format(e.to_string()))?;
            write!(out, "E ").map_err(|e| LpError::Format(e.to_string()))?;
            wrap(io::write_compute_statement(out, style, &self.table2, Status::INPUT))?;
            writeln!(out).map_err(|e| LpError::Format(e.to_string()))?;
            writeln!(out, "% Symbols:\n").map_err(|e| LpError::Format(e.to_string()))?;
            wrap(io::write_symbols(out, style, &self.table2))?;
            writeln!(out).map_err(|e| LpError::Format(e.to_string()))?;
        } else {
            if self.options.collect {
                wrap(io::write_program(out, style, &self.program2, &self.table2))?;
            } else {
                writeln!(out, "0").map_err(|e| LpError::Format(e.to_string()))?;
            }

            wrap(io::write_symbols(out, style, &self.table2))?;

            writeln!(out, "B+").map_err(|e| LpError::Format(e.to_string()))?;
            wrap(io::write_compute_statement(out, style, &self.table2, Status::TRUE))?;

            writeln!(out, "B-").map_err(|e| LpError::Format(e.to_string()))?;
            wrap(io::write_compute_statement(out, style, &self.table2, Status::FALSE))?;

            if !self.options.mark_input {
                self.table2.reset_input_atoms();
            }
            writeln!(out, "E").map_err(|e| LpError::Format(e.to_string()))?;
            wrap(io::write_compute_statement(out, style, &self.table2, Status::INPUT))?;

            writeln!(out, "{}", self.number2).map_err(|e| LpError::Format(e.to_string()))?;
        }

        Ok(())
    }

    /// `-s=<file>`: a dummy program containing only the final symbol
    /// table and empty compute sections.
    pub fn write_symbol_dummy(&self, out: &mut dyn Write) -> Result<(), LpError> {
        let wrap = |r: std::io::Result<()>| r.map_err(|e| LpError::Format(e.to_string()));
        writeln!(out, "0").map_err(|e| LpError::Format(e.to_string()))?;
        wrap(io::write_symbols(out, Style::Smodels, &self.table2))?;
        writeln!(out, "B+\n0\nB-\n0\n0").map_err(|e| LpError::Format(e.to_string()))?;
        Ok(())
    }
}

fn atom_name(table: &AtomTable, atom: u32) -> String {
    match table.lookup(atom) {
        Some((i, j)) => {
            let s = table.slices[i].borrow();
            match &s.names[j as usize] {
                Some(sym) => name_text(sym),
                None => format!("_{atom}"),
            }
        }
        None => format!("_{atom}"),
    }
}

fn name_text(sym: &Rc<Symbol>) -> String {
    sym.name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn module(text: &str) -> Cursor<Vec<u8>> {
        Cursor::new(text.as_bytes().to_vec())
    }

    #[test]
    fn single_module_renumbers_from_one() {
        let mut lp = Lpcat::new(LpcatOptions {
            collect: true,
            ..Default::default()
        });
        let mut input = module("1 2 1 0 3\n0\n2 a\n3 b\n0\nB+\n0\nB-\n0\n1\n");
        let mut out = Vec::new();
        lp.process_module(&mut input, &mut out).unwrap();
        lp.finish(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("1 1 1 0 2"));
    }

    #[test]
    fn doubly_defined_atom_is_fatal_without_verbose() {
        let mut lp = Lpcat::new(LpcatOptions {
            collect: true,
            modular: true,
            ..Default::default()
        });
        let mut m1 = module("1 1 0 0\n0\n1 p\n0\nB+\n0\nB-\n0\n1\n");
        let mut out = Vec::new();
        lp.process_module(&mut m1, &mut out).unwrap();

        let mut m2 = module("1 1 0 0\n0\n1 p\n0\nB+\n0\nB-\n0\n1\n");
        let err = lp.process_module(&mut m2, &mut out).unwrap_err();
        assert!(matches!(err, LpError::ModuleConflict { .. }));
    }
}
