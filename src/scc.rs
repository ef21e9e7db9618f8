//! C4 — Dependency/SCC engine.
//!
//! Builds a head→rule occurrence index over an [`AtomTable`] and runs
//! Tarjan's algorithm under a caller-chosen edge predicate (`control`), in
//! the spirit of `scc.c`'s `visit`/`compute_sccs`. Two call sites use this
//! with different predicates: the shifter computes SCCs over the pure
//! positive dependency graph (head-cycle-freeness), while the linker
//! computes the *joint* SCCs of the positive graph across module
//! boundaries to check the module condition.
//!
//! Both traversals are iterative rather than recursive (an explicit
//! `Vec`-backed stack) so that SCC depth is bounded only by heap, not
//! call-stack, size.

use crate::atom::{AtomTable, ModuleIds, Status, Symbol};
use crate::error::LpError;
use crate::rule::Program;
use std::rc::Rc;

/// Reference to a rule inside the owning `Program`, by index.
pub type RuleRef = usize;

#[derive(Clone)]
pub struct OccEntry {
    pub rules: Vec<RuleRef>,
    pub scc: u32,
    pub scc_size: u32,
    pub visited: u32,
    pub status: Status,
    pub other: u32,
    pub name: Option<Rc<Symbol>>,
}

impl Default for OccEntry {
    fn default() -> Self {
        OccEntry {
            rules: Vec::new(),
            scc: 0,
            scc_size: 0,
            visited: 0,
            status: Status::NONE,
            other: 0,
            name: None,
        }
    }
}

struct OccSlice {
    offset: u32,
    count: u32,
    entries: Vec<OccEntry>,
}

/// Parallel structure to [`AtomTable`]: one [`OccEntry`] per atom, sliced
/// the same way the source atom table is (`initialize_occurrences`).
pub struct OccTable {
    slices: Vec<OccSlice>,
}

impl OccTable {
    /// `initialize_occurrences` — builds an empty occurrence table whose
    /// shape mirrors `table`'s slices; `status` seeds from `INPUT` plus
    /// `VISIBLE` for named atoms, `other` from the atom's relocation slot.
    pub fn from(table: &AtomTable) -> OccTable {
        let slices = table
            .slices
            .iter()
            .map(|slice| {
                let s = slice.borrow();
                let mut entries = vec![OccEntry::default(); s.count as usize + 1];
                for i in 1..=s.count as usize {
                    let mut status = s.statuses[i] & Status::INPUT;
                    if s.names[i].is_some() {
                        status.insert(Status::VISIBLE);
                    }
                    entries[i] = OccEntry {
                        status,
                        other: s.others[i],
                        name: s.names[i].clone(),
                        ..Default::default()
                    };
                }
                OccSlice {
                    offset: s.offset,
                    count: s.count,
                    entries,
                }
            })
            .collect();
        OccTable { slices }
    }

    fn find(&self, atom: u32) -> Option<(usize, usize)> {
        for (si, slice) in self.slices.iter().enumerate() {
            if atom > slice.offset && atom <= slice.offset + slice.count {
                return Some((si, (atom - slice.offset) as usize));
            }
        }
        None
    }

    pub fn get(&self, atom: u32) -> &OccEntry {
        let (si, i) = self.find(atom).expect("atom not present in occurrence table");
        &self.slices[si].entries[i]
    }

    fn get_mut(&mut self, atom: u32) -> &mut OccEntry {
        let (si, i) = self.find(atom).expect("atom not present in occurrence table");
        &mut self.slices[si].entries[i]
    }

    fn atoms_in_order(&self) -> Vec<u32> {
        let mut out = Vec::new();
        for slice in &self.slices {
            for i in 1..=slice.count {
                out.push(slice.offset + i);
            }
        }
        out
    }

    /// `compute_occurrences` — two-pass count-then-populate indexing of
    /// each rule under every head atom not excluded by `prune`.
    pub fn compute_occurrences(&mut self, program: &Program, prune: Status) {
        for (idx, rule) in program.iter().enumerate() {
            for &head in rule.heads() {
                let h = self.get_mut(head);
                if !h.status.contains(prune) {
                    h.rules.push(idx);
                }
            }
        }
    }

    /// *compute-sccs(idx, control)* — Tarjan's algorithm restricted to the
    /// edge kinds named in `control` (`POSOCC`/`NEGOCC`), visiting every
    /// atom except one skipped by the `VISIBLE` rule: an atom is skipped
    /// only when it is itself visible *and* `control` asks to prune
    /// visible atoms (`control.contains(Status::VISIBLE)`), mirroring the
    /// source's `!(status & (MARK_VISIBLE & control))` test.
    pub fn compute_sccs(&mut self, program: &Program, control: Status) {
        let mut next: u32 = 0;
        let atoms = self.atoms_in_order();
        for atom in atoms {
            let h = self.get(atom);
            let skip = control.contains(Status::VISIBLE) && h.status.contains(Status::VISIBLE);
            if !skip && h.visited == 0 {
                self.visit(atom, &mut next, program, control);
            }
        }
    }

    /// Iterative Tarjan visit rooted at `atom`, restricted to edges named
    /// by `control`. Returns the atom's lowlink, matching `visit`'s return
    /// value in `scc.c`. Skips a neighbor the same way [`OccTable::compute_sccs`]
    /// skips a root: only when it is visible and `control` asks to prune
    /// visible atoms.
    fn visit(&mut self, root: u32, next: &mut u32, program: &Program, control: Status) -> u32 {
        struct Node {
            atom: u32,
            edges: Vec<u32>,
            pos: usize,
        }

        let skip = |occ: &OccTable, atom: u32| -> bool {
            control.contains(Status::VISIBLE) && occ.get(atom).status.contains(Status::VISIBLE)
        };

        let mut stack: Vec<Node> = Vec::new();
        let mut tarjan_stack: Vec<u32> = Vec::new();
        let mut lowlink: std::collections::HashMap<u32, u32> = std::collections::HashMap::new();

        let start_edges = self.edges_of(root, program, control);
        *next += 1;
        self.get_mut(root).visited = *next;
        lowlink.insert(root, *next);
        tarjan_stack.push(root);
        stack.push(Node {
            atom: root,
            edges: start_edges,
            pos: 0,
        });

        while let Some(top) = stack.last_mut() {
            if top.pos < top.edges.len() {
                let child = top.edges[top.pos];
                top.pos += 1;
                if skip(self, child) {
                    continue;
                }
                if self.get(child).visited == 0 {
                    let child_edges = self.edges_of(child, program, control);
                    *next += 1;
                    self.get_mut(child).visited = *next;
                    lowlink.insert(child, *next);
                    tarjan_stack.push(child);
                    stack.push(Node {
                        atom: child,
                        edges: child_edges,
                        pos: 0,
                    });
                } else {
                    let child_visited = self.get(child).visited;
                    let parent = top.atom;
                    let pl = lowlink.entry(parent).or_insert(u32::MAX);
                    if child_visited < *pl {
                        *pl = child_visited;
                    }
                }
                continue;
            }

            let Node { atom, .. } = stack.pop().unwrap();
            let min = *lowlink.get(&atom).unwrap();

            if self.get(atom).visited == min {
                let max_atom = self.max_atom();
                let mut component: Vec<u32> = Vec::new();
                loop {
                    let a2 = tarjan_stack.pop().unwrap();
                    component.push(a2);
                    let h2 = self.get_mut(a2);
                    h2.scc = min;
                    h2.visited = max_atom + 1;
                    if a2 == atom {
                        break;
                    }
                }
                let size = component.len() as u32;
                for &a in &component {
                    self.get_mut(a).scc_size = size;
                }
            }

            if let Some(parent) = stack.last() {
                let child_low = *lowlink.get(&atom).unwrap();
                let parent_atom = parent.atom;
                let pl = lowlink.entry(parent_atom).or_insert(u32::MAX);
                if child_low < *pl {
                    *pl = child_low;
                }
            }
        }

        *lowlink.get(&root).unwrap_or(&0)
    }

    fn edges_of(&self, atom: u32, program: &Program, control: Status) -> Vec<u32> {
        let h = self.get(atom);
        let mut out = Vec::new();
        for &ridx in &h.rules {
            let rule = &program[ridx];
            if control.contains(Status::POSOCC) {
                out.extend_from_slice(rule.pos());
            }
            if control.contains(Status::NEGOCC) {
                out.extend_from_slice(rule.neg());
            }
        }
        out
    }

    pub fn max_atom(&self) -> u32 {
        self.slices
            .iter()
            .map(|s| s.offset + s.count)
            .max()
            .unwrap_or(0)
    }

    /// *is-stratifiable(idx)* (base spec §4.4): every invisible atom's
    /// defining rules must not be a `CHOICE` and must not negate an atom
    /// sharing its SCC.
    pub fn is_stratifiable(&self, program: &Program) -> bool {
        for slice in &self.slices {
            for i in 1..=slice.count as usize {
                let h = &slice.entries[i];
                if h.status.contains(Status::VISIBLE) {
                    continue;
                }
                for &ridx in &h.rules {
                    let rule = &program[ridx];
                    if matches!(rule, crate::rule::Rule::Choice { .. }) {
                        return false;
                    }
                    for &n in rule.neg() {
                        let b = self.get(n);
                        if !b.status.contains(Status::VISIBLE) && b.scc == h.scc {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// *compute-joint-sccs(idx)* — positive-only Tarjan with no `VISIBLE`
    /// filter (every atom participates), failing with
    /// [`LpError::ModuleCycle`] the moment an SCC spans more than one
    /// module id (base spec §4.4, `scc.c`'s `pos_visit`).
    pub fn compute_joint_sccs(
        &mut self,
        program: &Program,
        module_ids: &ModuleIds,
    ) -> Result<(), LpError> {
        let mut next: u32 = 0;
        let atoms = self.atoms_in_order();
        for atom in atoms {
            if self.get(atom).visited == 0 {
                self.pos_visit(atom, &mut next, program, module_ids)?;
            }
        }
        Ok(())
    }

    fn pos_visit(
        &mut self,
        root: u32,
        next: &mut u32,
        program: &Program,
        module_ids: &ModuleIds,
    ) -> Result<u32, LpError> {
        // Non-recursive depth-first walk, stack of (atom, next child index).
        struct Node {
            atom: u32,
            edges: Vec<u32>,
            pos: usize,
        }

        let mut stack: Vec<Node> = Vec::new();
        let mut tarjan_stack: Vec<u32> = Vec::new();
        let mut lowlink: std::collections::HashMap<u32, u32> = std::collections::HashMap::new();

        let start_edges = self.edges_of(root, program, Status::POSOCC);
        *next += 1;
        self.get_mut(root).visited = *next;
        lowlink.insert(root, *next);
        tarjan_stack.push(root);
        stack.push(Node {
            atom: root,
            edges: start_edges,
            pos: 0,
        });

        while let Some(top) = stack.last_mut() {
            if top.pos < top.edges.len() {
                let child = top.edges[top.pos];
                top.pos += 1;
                if self.get(child).visited == 0 {
                    let child_edges = self.edges_of(child, program, Status::POSOCC);
                    *next += 1;
                    self.get_mut(child).visited = *next;
                    lowlink.insert(child, *next);
                    tarjan_stack.push(child);
                    stack.push(Node {
                        atom: child,
                        edges: child_edges,
                        pos: 0,
                    });
                } else {
                    let child_visited = self.get(child).visited;
                    let parent = top.atom;
                    let pl = *lowlink.get(&parent).unwrap();
                    if child_visited < pl {
                        lowlink.insert(parent, child_visited);
                    }
                }
                continue;
            }

            let Node { atom, .. } = stack.pop().unwrap();
            let min = *lowlink.get(&atom).unwrap();

            if self.get(atom).visited == min {
                let max_atom = self.max_atom();
                let mut component: Vec<u32> = Vec::new();
                loop {
                    let a2 = tarjan_stack.pop().unwrap();
                    component.push(a2);
                    let h2 = self.get_mut(a2);
                    h2.scc = min;
                    h2.visited = max_atom + 1;
                    if a2 == atom {
                        break;
                    }
                }
                let size = component.len() as u32;
                for &a in &component {
                    self.get_mut(a).scc_size = size;
                }

                let mut conflict = false;
                for &a2 in &component {
                    if a2 == atom {
                        continue;
                    }
                    let name_a = self.get(atom).name.clone();
                    let name_b = self.get(a2).name.clone();
                    if let (Some(na), Some(nb)) = (name_a, name_b) {
                        if module_ids.different_modules(&na, &nb) {
                            conflict = true;
                        }
                    }
                }
                if conflict {
                    let names: Vec<String> = component
                        .iter()
                        .rev()
                        .map(|&a| match self.get(a).name {
                            Some(ref sym) => sym.name.to_string(),
                            None => format!("_{a}"),
                        })
                        .collect();
                    return Err(LpError::ModuleCycle { atoms: names });
                }
            }

            if let Some(parent) = stack.last() {
                let child_low = *lowlink.get(&atom).unwrap();
                let parent_atom = parent.atom;
                let pl = lowlink.entry(parent_atom).or_insert(u32::MAX);
                if child_low < *pl {
                    *pl = child_low;
                }
            }
        }

        Ok(*lowlink.get(&root).unwrap())
    }

    pub fn get_scc(&self, atom: u32) -> u32 {
        self.get(atom).scc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{AtomTable, Slice};
    use crate::rule::Rule;

    fn basic(head: u32, pos: Vec<u32>, neg: Vec<u32>) -> Rule {
        Rule::Basic { head, pos, neg }
    }

    #[test]
    fn compute_sccs_groups_mutual_positive_cycle() {
        let table = AtomTable::single(Slice::new(3, 0));
        let program: Program = vec![
            basic(1, vec![2], vec![]),
            basic(2, vec![1], vec![]),
            basic(3, vec![], vec![]),
        ];
        table.mark_occurrences(&program);
        let mut occ = OccTable::from(&table);
        occ.compute_occurrences(&program, Status::NONE);
        occ.compute_sccs(&program, Status::POSOCC);
        assert_eq!(occ.get_scc(1), occ.get_scc(2));
        assert_ne!(occ.get_scc(1), occ.get_scc(3));
    }

    #[test]
    fn is_stratifiable_rejects_negative_self_cycle_on_invisible_atom() {
        let table = AtomTable::single(Slice::new(2, 0));
        // atom 1 invisible, atom 2 invisible, 1 :- not 2. 2 :- not 1.
        let program: Program = vec![basic(1, vec![], vec![2]), basic(2, vec![], vec![1])];
        table.mark_occurrences(&program);
        let mut occ = OccTable::from(&table);
        occ.compute_occurrences(&program, Status::NONE);
        occ.compute_sccs(&program, Status::POSOCC | Status::NEGOCC);
        assert!(!occ.is_stratifiable(&program));
    }

    #[test]
    fn is_stratifiable_accepts_acyclic_invisible_part() {
        let table = AtomTable::single(Slice::new(2, 0));
        let program: Program = vec![basic(2, vec![], vec![1])];
        table.mark_occurrences(&program);
        let mut occ = OccTable::from(&table);
        occ.compute_occurrences(&program, Status::NONE);
        occ.compute_sccs(&program, Status::POSOCC | Status::NEGOCC);
        assert!(occ.is_stratifiable(&program));
    }
}
