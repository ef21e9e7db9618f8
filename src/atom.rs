//! C1 — Atom/Symbol table.
//!
//! An atom table is a sequence of *slices*, each a contiguous id range
//! `[offset+1, offset+count]` (base spec §3). A table is *contiguous* iff
//! it has exactly one slice at offset 0 (Design Note §9).
//!
//! Named atoms share a canonical [`Symbol`] looked up through a
//! [`SymbolRegistry`]; a symbol's `back_ref` is a non-owning pointer
//! (`Weak`) into whichever slice currently owns that atom, exactly the
//! "weak reference... the slice does not tie its lifetime to the symbol"
//! relationship Design Note §9 calls for.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::error::LpError;
use crate::rule::Program;

/// Status bitset (base spec §3). Hand-rolled rather than reaching for the
/// `bitflags` crate for a 7-bit set, matching this codebase's preference
/// for small hand-rolled numeric types over a dependency (cf.
/// `Command`/`PlacedCommand` being plain enums, `DELTA_FLAG_INPLACE`
/// being a bare `u8` constant).
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Status(pub u16);

impl Status {
    pub const NONE: Status = Status(0);
    pub const VISIBLE: Status = Status(1 << 0);
    pub const INPUT: Status = Status(1 << 1);
    pub const HEADOCC: Status = Status(1 << 2);
    pub const POSOCC: Status = Status(1 << 3);
    pub const NEGOCC: Status = Status(1 << 4);
    pub const TRUE: Status = Status(1 << 5);
    pub const FALSE: Status = Status(1 << 6);
    pub const POSOCC_OR_NEGOCC: Status = Status(Self::POSOCC.0 | Self::NEGOCC.0);
    pub const TRUE_OR_FALSE: Status = Status(Self::TRUE.0 | Self::FALSE.0);

    #[inline]
    pub fn contains(self, other: Status) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn insert(&mut self, other: Status) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Status) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for Status {
    type Output = Status;
    fn bitor(self, rhs: Status) -> Status {
        Status(self.0 | rhs.0)
    }
}

/// A canonical named atom, shared by every slice/module that defines or
/// references the name. `back_ref` names the slice (if still live) and
/// the absolute atom id currently holding this symbol.
pub struct Symbol {
    pub name: Rc<str>,
    pub back_ref: RefCell<Option<BackRef>>,
}

#[derive(Clone)]
pub struct BackRef {
    pub slice: Weak<RefCell<Slice>>,
    pub atom: u32,
}

/// Interns symbol names so that same-named atoms across modules resolve
/// to one canonical [`Symbol`] object (base spec §3: "this back-reference
/// is the means by which two modules discover they define the same
/// symbol"). Deliberately simple — the base spec marks the name-table
/// data structure itself as an external collaborator, not a design focus.
#[derive(Default)]
pub struct SymbolRegistry {
    by_name: HashMap<Rc<str>, Rc<Symbol>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Rc<Symbol> {
        if let Some(sym) = self.by_name.get(name) {
            return sym.clone();
        }
        let name: Rc<str> = Rc::from(name);
        let sym = Rc::new(Symbol {
            name: name.clone(),
            back_ref: RefCell::new(None),
        });
        self.by_name.insert(name, sym.clone());
        sym
    }

    pub fn find_by_name(&self, name: &str) -> Option<Rc<Symbol>> {
        self.by_name.get(name).cloned()
    }
}

/// One contiguous range of atom ids. `names`/`statuses`/`others` are
/// 1-based (index 0 unused) to mirror the source's own 1-based atom
/// arithmetic, so the relocation code in `relocate.rs` reads identically
/// to `relocate.c`.
pub struct Slice {
    pub offset: u32,
    pub count: u32,
    pub names: Vec<Option<Rc<Symbol>>>,
    pub statuses: Vec<Status>,
    pub others: Vec<u32>,
}

impl Slice {
    pub fn new(count: u32, offset: u32) -> Rc<RefCell<Slice>> {
        let n = count as usize + 1;
        Rc::new(RefCell::new(Slice {
            offset,
            count,
            names: vec![None; n],
            statuses: vec![Status::NONE; n],
            others: vec![0; n],
        }))
    }

    /// Extend this slice in place by `extra` fresh, unnamed, zero-status
    /// atoms (used by the shifter to allocate a fresh helper atom).
    pub fn extend(&mut self, extra: u32) {
        self.count += extra;
        let n = self.count as usize + 1;
        self.names.resize(n, None);
        self.statuses.resize(n, Status::NONE);
        self.others.resize(n, 0);
    }
}

pub struct AtomTable {
    pub slices: Vec<Rc<RefCell<Slice>>>,
}

impl AtomTable {
    pub fn empty() -> Self {
        AtomTable { slices: Vec::new() }
    }

    pub fn single(slice: Rc<RefCell<Slice>>) -> Self {
        AtomTable {
            slices: vec![slice],
        }
    }

    pub fn contiguous(&self) -> bool {
        self.slices.len() <= 1 && self.slices.first().map(|s| s.borrow().offset == 0).unwrap_or(true)
    }

    pub fn max_atom(&self) -> u32 {
        self.slices
            .iter()
            .map(|s| {
                let s = s.borrow();
                s.offset + s.count
            })
            .max()
            .unwrap_or(0)
    }

    /// `extend_table`/`joint_body` allocation (`lpshift.c`): grows the
    /// table's last slice by one fresh, unnamed, zero-status atom and
    /// returns its id. Requires a contiguous table, matching the shifter's
    /// precondition that `table` is already a single slice by the time
    /// helper atoms are allocated.
    pub fn alloc_fresh_atom(&mut self) -> u32 {
        let slice = self
            .slices
            .last()
            .expect("alloc_fresh_atom: empty atom table")
            .clone();
        slice.borrow_mut().extend(1);
        let s = slice.borrow();
        s.offset + s.count
    }

    /// *lookup(atom)* → slice + local index, `O(slices)` linear walk
    /// (base spec §4.1).
    pub fn lookup(&self, atom: u32) -> Option<(usize, u32)> {
        for (i, slice) in self.slices.iter().enumerate() {
            let s = slice.borrow();
            if atom > s.offset && atom <= s.offset + s.count {
                return Some((i, atom - s.offset));
            }
        }
        None
    }

    pub fn require_contiguous(&self, context: &str) -> Result<(), LpError> {
        if self.contiguous() {
            Ok(())
        } else {
            Err(LpError::Invariant(format!(
                "{context}: contiguous symbol table expected"
            )))
        }
    }

    /// *make-contiguous(table)* — destructively returns a fresh contiguous
    /// table equivalent to the input (base spec §4.1).
    pub fn make_contiguous(self) -> AtomTable {
        if self.contiguous() {
            return self;
        }
        let total: u32 = self.slices.iter().map(|s| s.borrow().count).sum();
        let fresh = Slice::new(total, 0);
        {
            let mut f = fresh.borrow_mut();
            let mut i: u32 = 1;
            for slice in &self.slices {
                let s = slice.borrow();
                for j in 1..=s.count {
                    f.names[i as usize] = s.names[j as usize].clone();
                    f.statuses[i as usize] = s.statuses[j as usize];
                    f.others[i as usize] = s.others[j as usize];
                    i += 1;
                }
            }
        }
        AtomTable::single(fresh)
    }

    /// *append-table(a, b)* — concatenates slices, preserving per-slice
    /// offsets (base spec §4.1).
    pub fn append(mut self, mut other: AtomTable) -> AtomTable {
        self.slices.append(&mut other.slices);
        self
    }

    /// *attach-names-to-table* — idempotent (base spec §4.1).
    pub fn attach_names_to_table(&self) {
        for slice in &self.slices {
            let s = slice.borrow();
            for j in 1..=s.count {
                if let Some(sym) = &s.names[j as usize] {
                    *sym.back_ref.borrow_mut() = Some(BackRef {
                        slice: Rc::downgrade(slice),
                        atom: s.offset + j,
                    });
                }
            }
        }
    }

    /// *combine-atom-tables(source, dest, module)* → first doubly-defined
    /// atom id, or `None` on success (base spec §4.1). Per the base
    /// spec's Open Question, the two literal-zero parameters of the
    /// original `combine_atom_tables` are treated as unused; only the
    /// `modular` flag matters here (decision recorded in DESIGN.md).
    pub fn combine_atom_tables(&mut self, dest: &AtomTable, modular: bool) -> Option<u32> {
        let _ = dest; // dest is reached only through symbols' back-refs
        for slice in &self.slices {
            let s = slice.borrow();
            for j in 1..=s.count {
                let Some(sym) = s.names[j as usize].clone() else {
                    continue;
                };
                let back = sym.back_ref.borrow().clone();
                let Some(back) = back else { continue };
                let Some(dest_slice) = back.slice.upgrade() else {
                    continue;
                };
                let dest_atom = back.atom;
                drop(s);
                {
                    let mut s_mut = slice.borrow_mut();
                    s_mut.others[j as usize] = dest_atom;
                }
                let s = slice.borrow();

                if modular {
                    let local_headocc = s.statuses[j as usize].contains(Status::HEADOCC);
                    let dest_local = dest_atom - dest_slice.borrow().offset;
                    let dest_headocc = dest_slice.borrow().statuses[dest_local as usize]
                        .contains(Status::HEADOCC);
                    if local_headocc && dest_headocc {
                        return Some(dest_atom);
                    }
                }
            }
        }
        None
    }

    /// *mark-visible(table)* — sets VISIBLE on every named atom.
    pub fn mark_visible(&self) {
        for slice in &self.slices {
            let mut s = slice.borrow_mut();
            for j in 1..=s.count as usize {
                if s.names[j].is_some() {
                    s.statuses[j].insert(Status::VISIBLE);
                }
            }
        }
    }

    /// *mark-occurrences(P, T)* — sets POSOCC / NEGOCC / HEADOCC flags on
    /// each atom appearing in any rule.
    pub fn mark_occurrences(&self, program: &Program) {
        let mark = |table: &AtomTable, atoms: &[u32], bit: Status| {
            for &a in atoms {
                if let Some((i, j)) = table.lookup(a) {
                    table.slices[i].borrow_mut().statuses[j as usize].insert(bit);
                }
            }
        };
        for rule in program {
            mark(self, rule.heads(), Status::HEADOCC);
            mark(self, rule.pos(), Status::POSOCC);
            mark(self, rule.neg(), Status::NEGOCC);
        }
    }

    /// `-i`/`mark_io_atoms`: every named atom becomes INPUT; every head
    /// clears INPUT and gains HEADOCC; stamps the module id into the
    /// back-reference of each name (base spec §4.5 step 2). Module ids
    /// are stashed in the high bits of `other[]` is avoided in favour of
    /// a dedicated side table, since `other[]` is reused for relocation;
    /// see [`ModuleIds`].
    pub fn mark_io_atoms(&self, program: &Program, module_id: u32, module_ids: &mut ModuleIds) {
        for slice in &self.slices {
            let mut s = slice.borrow_mut();
            for j in 1..=s.count as usize {
                if let Some(sym) = &s.names[j] {
                    s.statuses[j].insert(Status::INPUT);
                    module_ids.set(sym, module_id);
                }
            }
        }
        for rule in program {
            for &h in rule.heads() {
                if let Some((i, j)) = self.lookup(h) {
                    let mut s = self.slices[i].borrow_mut();
                    s.statuses[j as usize].remove(Status::INPUT);
                    s.statuses[j as usize].insert(Status::HEADOCC);
                }
            }
        }
    }

    /// *transfer-status-bits(T1, T2)*: OR `{TRUE, FALSE, HEADOCC}` from
    /// `self` into the back-referenced slot of `dest`'s current slices
    /// (base spec §4.5 step 9). Precondition: `dest`'s names have already
    /// been attached via [`AtomTable::attach_names_to_table`].
    pub fn transfer_status_bits(&self) {
        for slice in &self.slices {
            let s = slice.borrow();
            for j in 1..=s.count as usize {
                let Some(sym) = &s.names[j] else { continue };
                let Some(back) = sym.back_ref.borrow().clone() else {
                    continue;
                };
                let Some(dest_slice) = back.slice.upgrade() else {
                    continue;
                };
                // Skip self-transfers (atom freshly attached to itself).
                if Rc::ptr_eq(&dest_slice, slice) {
                    continue;
                }
                let local = back.atom - dest_slice.borrow().offset;
                let bits = s.statuses[j] & Status::TRUE_OR_FALSE | (s.statuses[j] & Status::HEADOCC);
                dest_slice.borrow_mut().statuses[local as usize].insert(bits);
            }
        }
    }

    /// *reset-input-atoms(table)*: any atom with HEADOCC has INPUT
    /// cleared (base spec §4.5, final emission step).
    pub fn reset_input_atoms(&self) {
        for slice in &self.slices {
            let mut s = slice.borrow_mut();
            for j in 1..=s.count as usize {
                if s.names[j].is_some() && s.statuses[j].contains(Status::HEADOCC) {
                    s.statuses[j].remove(Status::INPUT);
                }
            }
        }
    }
}

impl std::ops::BitAnd for Status {
    type Output = Status;
    fn bitand(self, rhs: Status) -> Status {
        Status(self.0 & rhs.0)
    }
}

/// Side table mapping symbols to the module id that defined them, used
/// only under `-i -m`. Kept out of `other[]`/`statuses[]` since those are
/// reused by relocation and the base status bitset respectively.
#[derive(Default)]
pub struct ModuleIds {
    by_symbol: HashMap<*const Symbol, u32>,
    // Keeps the Rc alive for the lifetime of the map so the pointer key
    // cannot be reused by an unrelated, freed Symbol.
    keep_alive: Vec<Rc<Symbol>>,
}

impl ModuleIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, sym: &Rc<Symbol>, module: u32) {
        let ptr = Rc::as_ptr(sym);
        if self.by_symbol.insert(ptr, module).is_none() {
            self.keep_alive.push(sym.clone());
        }
    }

    pub fn get(&self, sym: &Rc<Symbol>) -> Option<u32> {
        self.by_symbol.get(&Rc::as_ptr(sym)).copied()
    }

    /// *different-modules(atom1, atom2, table)* (base spec §4.4, `scc.c`).
    pub fn different_modules(&self, a: &Rc<Symbol>, b: &Rc<Symbol>) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(m1), Some(m2)) => m1 != 0 && m2 != 0 && m1 != m2,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_single_zero_offset() {
        let t = AtomTable::single(Slice::new(3, 0));
        assert!(t.contiguous());
        let t2 = AtomTable::single(Slice::new(3, 2));
        assert!(!t2.contiguous());
    }

    #[test]
    fn lookup_finds_slice_and_local_index() {
        let a = Slice::new(2, 0);
        let b = Slice::new(3, 2);
        let t = AtomTable {
            slices: vec![a, b],
        };
        assert_eq!(t.lookup(1), Some((0, 1)));
        assert_eq!(t.lookup(2), Some((0, 2)));
        assert_eq!(t.lookup(3), Some((1, 1)));
        assert_eq!(t.lookup(5), Some((1, 3)));
        assert_eq!(t.lookup(6), None);
    }

    #[test]
    fn make_contiguous_preserves_atoms_in_slice_order() {
        let mut reg = SymbolRegistry::new();
        let a = Slice::new(1, 0);
        a.borrow_mut().names[1] = Some(reg.intern("p"));
        let b = Slice::new(1, 1);
        b.borrow_mut().names[1] = Some(reg.intern("q"));
        let t = AtomTable {
            slices: vec![a, b],
        };
        let c = t.make_contiguous();
        assert!(c.contiguous());
        let s = c.slices[0].borrow();
        assert_eq!(s.count, 2);
        assert_eq!(s.names[1].as_ref().unwrap().name.as_ref(), "p");
        assert_eq!(s.names[2].as_ref().unwrap().name.as_ref(), "q");
    }

    #[test]
    fn mark_occurrences_sets_expected_bits() {
        use crate::rule::Rule;
        let t = AtomTable::single(Slice::new(3, 0));
        let program: Program = vec![Rule::Basic {
            head: 1,
            pos: vec![2],
            neg: vec![3],
        }];
        t.mark_occurrences(&program);
        let s = t.slices[0].borrow();
        assert!(s.statuses[1].contains(Status::HEADOCC));
        assert!(s.statuses[2].contains(Status::POSOCC));
        assert!(s.statuses[3].contains(Status::NEGOCC));
        assert!(!s.statuses[1].contains(Status::POSOCC));
    }

    #[test]
    fn combine_atom_tables_detects_doubly_defined_under_modular() {
        let mut reg = SymbolRegistry::new();
        let dest_slice = Slice::new(1, 0);
        let sym = reg.intern("p");
        dest_slice.borrow_mut().names[1] = Some(sym.clone());
        dest_slice.borrow_mut().statuses[1].insert(Status::HEADOCC);
        let dest = AtomTable::single(dest_slice);
        dest.attach_names_to_table();

        let src_slice = Slice::new(1, 0);
        src_slice.borrow_mut().names[1] = Some(sym);
        src_slice.borrow_mut().statuses[1].insert(Status::HEADOCC);
        let mut src = AtomTable::single(src_slice);

        let doubly = src.combine_atom_tables(&dest, true);
        assert_eq!(doubly, Some(1));
    }

    #[test]
    fn combine_atom_tables_ok_when_only_one_side_has_headocc() {
        let mut reg = SymbolRegistry::new();
        let dest_slice = Slice::new(1, 0);
        let sym = reg.intern("p");
        dest_slice.borrow_mut().names[1] = Some(sym.clone());
        let dest = AtomTable::single(dest_slice);
        dest.attach_names_to_table();

        let src_slice = Slice::new(1, 0);
        src_slice.borrow_mut().names[1] = Some(sym);
        src_slice.borrow_mut().statuses[1].insert(Status::HEADOCC);
        let mut src = AtomTable::single(src_slice);

        assert_eq!(src.combine_atom_tables(&dest, true), None);
        assert_eq!(src.slices[0].borrow().others[1], 1);
    }
}
