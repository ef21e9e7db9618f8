//! C3 — Relocator.
//!
//! Renumbers a module's atoms into a dense, unique range starting at
//! `shift`, then rewrites every rule to use the new ids. Directly grounded
//! in `relocate.c`'s `reloc_symbol_table`/`compress_symbol_table`/
//! `reloc_program` and their per-rule-kind dispatch.

use crate::atom::{AtomTable, Status};
use crate::error::LpError;
use crate::rule::{map_atoms, Program};

/// *reloc-symbol-table(table, shift)* — assigns a fresh, dense id
/// `shift + 1, shift + 2, ...` to every atom that is both unrelocated
/// (`others[i] == 0`) and "live" (any of `POSOCC`/`NEGOCC`/`HEADOCC`/
/// `VISIBLE`). Returns the final `new` counter (i.e. `shift + <atoms
/// relocated>`). Requires a contiguous table, as `relocate.c`'s single
/// linear `ATAB *table` walk assumes.
pub fn reloc_symbol_table(table: &mut AtomTable, shift: u32) -> Result<u32, LpError> {
    table.require_contiguous("reloc_symbol_table")?;
    let mut new = shift;
    for slice in &table.slices {
        let mut s = slice.borrow_mut();
        for i in 1..=s.count as usize {
            if s.others[i] != 0 {
                if s.others[i] > shift {
                    return Err(LpError::Invariant("too big cross-reference!".to_string()));
                }
                continue;
            }
            let live = s.statuses[i].contains(Status::POSOCC_OR_NEGOCC)
                || s.statuses[i].contains(Status::HEADOCC)
                || s.statuses[i].contains(Status::VISIBLE);
            if live {
                new += 1;
                s.others[i] = new;
            }
        }
    }
    Ok(new)
}

/// *compress-symbol-table(table, size, shift)* — materialises a fresh
/// contiguous table of `size` atoms holding, at each new index, the name
/// and status bits of whichever old atom relocated there. Verifies
/// `other == shift + new_index` for every surviving atom — a runtime
/// check (not `debug_assert!`) since it guards a cross-module invariant,
/// not an internal programmer error (base spec §4.3).
pub fn compress_symbol_table(table: &AtomTable, size: u32, shift: u32) -> Result<AtomTable, LpError> {
    let fresh = crate::atom::Slice::new(size, 0);
    {
        let mut f = fresh.borrow_mut();
        for slice in &table.slices {
            let s = slice.borrow();
            for i in 1..=s.count as usize {
                let new_atom = s.others[i];
                if new_atom == 0 {
                    continue;
                }
                let local = new_atom - shift;
                if local == 0 || local > size || new_atom != shift + local {
                    return Err(LpError::Invariant(format!(
                        "compress_symbol_table: atom {} relocated outside [{}, {}]",
                        s.offset + i as u32,
                        shift + 1,
                        shift + size
                    )));
                }
                f.names[local as usize] = s.names[i].clone();
                f.statuses[local as usize] = s.statuses[i];
            }
        }
    }
    Ok(AtomTable::single(fresh))
}

/// *reloc-program(program, table)* — rewrites every atom id referenced by
/// every rule via `table`'s `others[]` array (`relocate.c`'s per-kind
/// `reloc_basic`/`reloc_constraint`/.../`reloc_disjunctive`, unified here
/// since `Rule::heads_mut`/`pos_mut`/`neg_mut` already abstract the shape
/// differences away).
pub fn reloc_program(program: &mut Program, table: &AtomTable) {
    for rule in program.iter_mut() {
        map_atoms(rule, |atom| match table.lookup(atom) {
            Some((i, j)) => {
                let new = table.slices[i].borrow().others[j as usize];
                if new == 0 {
                    atom
                } else {
                    new
                }
            }
            None => atom,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Slice;
    use crate::rule::Rule;

    #[test]
    fn reloc_symbol_table_skips_dead_atoms() {
        let slice = Slice::new(3, 0);
        {
            let mut s = slice.borrow_mut();
            s.statuses[1].insert(Status::HEADOCC);
            s.statuses[2].insert(Status::VISIBLE);
            // atom 3 has no status bits: dead, stays unrelocated.
        }
        let mut table = AtomTable::single(slice);
        let new = reloc_symbol_table(&mut table, 0).unwrap();
        assert_eq!(new, 2);
        let s = table.slices[0].borrow();
        assert_eq!(s.others[1], 1);
        assert_eq!(s.others[2], 2);
        assert_eq!(s.others[3], 0);
    }

    #[test]
    fn reloc_symbol_table_rejects_non_contiguous() {
        let a = Slice::new(1, 0);
        let b = Slice::new(1, 5);
        let mut table = AtomTable {
            slices: vec![a, b],
        };
        assert!(reloc_symbol_table(&mut table, 0).is_err());
    }

    #[test]
    fn reloc_program_rewrites_every_literal() {
        let slice = Slice::new(2, 0);
        {
            let mut s = slice.borrow_mut();
            s.others[1] = 10;
            s.others[2] = 11;
        }
        let table = AtomTable::single(slice);
        let mut program: Program = vec![Rule::Basic {
            head: 1,
            pos: vec![2],
            neg: vec![],
        }];
        reloc_program(&mut program, &table);
        assert_eq!(
            program[0],
            Rule::Basic {
                head: 10,
                pos: vec![11],
                neg: vec![],
            }
        );
    }

    #[test]
    fn compress_symbol_table_detects_out_of_range_relocation() {
        let slice = Slice::new(1, 0);
        slice.borrow_mut().others[1] = 99;
        let table = AtomTable::single(slice);
        assert!(compress_symbol_table(&table, 1, 0).is_err());
    }
}
