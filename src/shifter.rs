//! C6 — Shifter core (`lpshift`).
//!
//! Rewrites disjunctive rule heads into equivalent basic/smaller-
//! disjunctive rules, using positive-dependency SCC information to keep
//! only head-cycle-free splits together. Grounded directly in
//! `lpshift.c`'s `shift_rule`/`partition_head_by_sccs`/
//! `transform_into_basic`.

use crate::atom::AtomTable;
use crate::error::LpError;
use crate::rule::{Program, Rule};
use crate::scc::OccTable;

#[derive(Clone, Copy, Default)]
pub struct ShiftOptions {
    /// `-f`: ignore SCC partitioning, split every head into its own group.
    pub force: bool,
    /// `--bc`: force body compression whenever the body has >= 2 literals.
    pub force_bc: bool,
    /// `--nb`: forbid body compression unconditionally.
    pub no_bc: bool,
}

impl ShiftOptions {
    pub fn validate(&self) -> Result<(), LpError> {
        if self.force_bc && self.no_bc {
            Err(LpError::CliUsage(
                "options --bc and --nb are incompatible".into(),
            ))
        } else {
            Ok(())
        }
    }
}

fn get_scc(occ: Option<&OccTable>, atom: u32) -> u32 {
    match occ {
        Some(o) => o.get_scc(atom),
        None => 0,
    }
}

/// *partition-head-by-sccs* — stable in-place grouping of `heads` by SCC
/// membership, returning the number of groups formed. Transliterated
/// directly from `lpshift.c`'s swap-based partition (`occ = None` — the
/// `-f` case — collapses every atom to the same fake SCC 0, so this
/// counts exactly one group; the actual singleton split under `-f`
/// happens later, in [`shift_rule`]'s own chunking loop).
fn partition_head_by_sccs(heads: &mut [u32], occ: Option<&OccTable>) -> usize {
    let cnt = heads.len();
    let mut scc_cnt = 0usize;
    let mut i = 0usize;
    while i < cnt {
        let scc = get_scc(occ, heads[i]);
        scc_cnt += 1;
        let mut j = i + 1;
        while j < cnt {
            if scc == get_scc(occ, heads[j]) {
                i += 1;
                if j > i {
                    heads.swap(i, j);
                }
            }
            j += 1;
        }
        i += 1;
    }
    scc_cnt
}

/// *transform-into-basic* — a single-headed disjunctive rule degenerates
/// to `BASIC` verbatim.
fn transform_into_basic(rule: &Rule) -> Rule {
    match rule {
        Rule::Disjunctive { heads, pos, neg } => Rule::Basic {
            head: heads[0],
            pos: pos.clone(),
            neg: neg.clone(),
        },
        other => other.clone(),
    }
}

/// *shift-rule* — rewrites one multi-headed disjunctive rule, appending
/// its replacement(s) to `out`. Returns the (possibly advanced) next
/// fresh atom id.
fn shift_rule(
    rule: &Rule,
    table: &mut AtomTable,
    occ: Option<&OccTable>,
    opts: &ShiftOptions,
    mut newatom: u32,
    out: &mut Program,
) -> u32 {
    let Rule::Disjunctive { heads, pos, neg } = rule else {
        unreachable!("shift_rule called on a non-disjunctive rule");
    };
    let mut heads = heads.clone();
    let head_cnt = heads.len();
    let n = partition_head_by_sccs(&mut heads, occ);

    let body_len = pos.len() + neg.len();
    let compress = (!opts.no_bc && (n as i64 - 1) * body_len as i64 > n as i64 + 3)
        || (opts.force_bc && body_len > 1);

    let joint_body: Option<u32> = if compress {
        let fresh = table.alloc_fresh_atom();
        debug_assert_eq!(fresh, newatom);
        newatom += 1;
        out.push(Rule::Basic {
            head: fresh,
            pos: pos.clone(),
            neg: neg.clone(),
        });
        Some(fresh)
    } else {
        None
    };

    let mut scc = if opts.force { 0 } else { get_scc(occ, heads[0]) };
    let mut i = 0usize;
    while i < head_cnt {
        let j = if opts.force {
            i + 1
        } else {
            let mut j = i;
            while j < head_cnt && scc == get_scc(occ, heads[j]) {
                j += 1;
            }
            j
        };
        let group = &heads[i..j];
        let complement: Vec<u32> = heads[..i].iter().chain(heads[j..].iter()).copied().collect();

        let (new_pos, new_neg) = if let Some(b) = joint_body {
            (vec![b], complement)
        } else {
            let mut merged_neg = neg.clone();
            merged_neg.extend(complement);
            (pos.clone(), merged_neg)
        };

        let shifted = if group.len() == 1 {
            Rule::Basic {
                head: group[0],
                pos: new_pos,
                neg: new_neg,
            }
        } else {
            Rule::Disjunctive {
                heads: group.to_vec(),
                pos: new_pos,
                neg: new_neg,
            }
        };
        out.push(shifted);

        i = j;
        if i < head_cnt {
            scc = get_scc(occ, heads[i]);
        }
    }

    newatom
}

/// *shift-program* — the full `lpshift` transformation: non-disjunctive
/// rules pass through unchanged, single-headed disjunctive rules become
/// `BASIC`, and multi-headed disjunctive rules are shifted per
/// [`shift_rule`]. `occ` must be `Some` unless `opts.force` is set
/// (matching `lpshift.c`: SCC computation is skipped entirely under
/// `-f`).
pub fn shift_program(program: &Program, table: &mut AtomTable, occ: Option<&OccTable>, opts: &ShiftOptions) -> Program {
    let mut newatom = table.max_atom() + 1;
    let mut out = Vec::with_capacity(program.len());
    for rule in program {
        match rule {
            Rule::Disjunctive { heads, .. } if heads.len() > 1 => {
                newatom = shift_rule(rule, table, occ, opts, newatom, &mut out);
            }
            Rule::Disjunctive { .. } => out.push(transform_into_basic(rule)),
            other => out.push(other.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Slice;

    fn table_of(n: u32) -> AtomTable {
        AtomTable::single(Slice::new(n, 0))
    }

    #[test]
    fn forced_shift_degenerates_to_singletons() {
        let mut table = table_of(3);
        let program: Program = vec![Rule::Disjunctive {
            heads: vec![1, 2],
            pos: vec![3],
            neg: vec![],
        }];
        let opts = ShiftOptions {
            force: true,
            ..Default::default()
        };
        let out = shift_program(&program, &mut table, None, &opts);
        assert_eq!(
            out,
            vec![
                Rule::Basic {
                    head: 1,
                    pos: vec![3],
                    neg: vec![2],
                },
                Rule::Basic {
                    head: 2,
                    pos: vec![3],
                    neg: vec![1],
                },
            ]
        );
    }

    #[test]
    fn single_headed_disjunctive_becomes_basic() {
        let mut table = table_of(2);
        let program: Program = vec![Rule::Disjunctive {
            heads: vec![1],
            pos: vec![2],
            neg: vec![],
        }];
        let opts = ShiftOptions::default();
        let out = shift_program(&program, &mut table, None, &opts);
        assert_eq!(
            out,
            vec![Rule::Basic {
                head: 1,
                pos: vec![2],
                neg: vec![],
            }]
        );
    }

    #[test]
    fn forced_body_compression_allocates_helper_atom() {
        let mut table = table_of(6);
        let program: Program = vec![Rule::Disjunctive {
            heads: vec![1, 2, 3],
            pos: vec![4, 5, 6],
            neg: vec![],
        }];
        let opts = ShiftOptions {
            force: true,
            force_bc: true,
            ..Default::default()
        };
        let out = shift_program(&program, &mut table, None, &opts);
        assert_eq!(table.max_atom(), 7);
        assert_eq!(
            out[0],
            Rule::Basic {
                head: 7,
                pos: vec![4, 5, 6],
                neg: vec![],
            }
        );
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn validate_rejects_bc_and_nb_together() {
        let opts = ShiftOptions {
            force_bc: true,
            no_bc: true,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }
}
