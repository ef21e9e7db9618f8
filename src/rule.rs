//! C2 — Rule store.
//!
//! A ground rule is one of seven shapes (base spec §3). Represented here
//! as a plain tagged enum rather than a C-style `union` keyed by a type
//! tag: the compiler enforces that a rule's payload always matches its
//! kind, so there is no analogue of the base spec's "no rule-level
//! invariants beyond type-tag correctness" caveat to enforce by hand.

/// A program is simply the ordered sequence of its rules; iteration order
/// is output order (base spec §3, §5 ordering law).
pub type Program = Vec<Rule>;

#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    /// `h :- pos, not neg`
    Basic {
        head: u32,
        pos: Vec<u32>,
        neg: Vec<u32>,
    },
    /// `h :- bound { pos, not neg }`
    Constraint {
        head: u32,
        bound: i64,
        pos: Vec<u32>,
        neg: Vec<u32>,
    },
    /// `{ h1..hn } :- pos, not neg`
    Choice {
        heads: Vec<u32>,
        pos: Vec<u32>,
        neg: Vec<u32>,
    },
    /// `:- pos, not neg`
    Integrity { pos: Vec<u32>, neg: Vec<u32> },
    /// `h :- bound [ pos=w, not neg=w ]`
    Weight {
        head: u32,
        bound: i64,
        pos: Vec<u32>,
        neg: Vec<u32>,
        /// Aligned with the wire order `neg... pos...`: `weights[0..neg.len()]`
        /// are the negative literals' weights, the remainder the positives'.
        weights: Vec<i64>,
    },
    /// `minimize [ pos=w, not neg=w ]`
    Optimize {
        pos: Vec<u32>,
        neg: Vec<u32>,
        weights: Vec<i64>,
    },
    /// `h1 v .. v hn :- pos, not neg`
    Disjunctive {
        heads: Vec<u32>,
        pos: Vec<u32>,
        neg: Vec<u32>,
    },
}

impl Rule {
    /// SMODELS wire type digit (base spec §6). No digit 7 is assigned in
    /// the original format; this crate never emits or expects one.
    pub fn type_digit(&self) -> u8 {
        match self {
            Rule::Basic { .. } => 1,
            Rule::Constraint { .. } => 2,
            Rule::Choice { .. } => 3,
            Rule::Integrity { .. } => 4,
            Rule::Weight { .. } => 5,
            Rule::Optimize { .. } => 6,
            Rule::Disjunctive { .. } => 8,
        }
    }

    pub fn heads(&self) -> &[u32] {
        match self {
            Rule::Basic { head, .. } | Rule::Constraint { head, .. } | Rule::Weight { head, .. } => {
                std::slice::from_ref(head)
            }
            Rule::Choice { heads, .. } | Rule::Disjunctive { heads, .. } => heads,
            Rule::Integrity { .. } | Rule::Optimize { .. } => &[],
        }
    }

    pub fn heads_mut(&mut self) -> &mut [u32] {
        match self {
            Rule::Basic { head, .. } | Rule::Constraint { head, .. } | Rule::Weight { head, .. } => {
                std::slice::from_mut(head)
            }
            Rule::Choice { heads, .. } | Rule::Disjunctive { heads, .. } => heads,
            Rule::Integrity { .. } | Rule::Optimize { .. } => &mut [],
        }
    }

    pub fn pos(&self) -> &[u32] {
        match self {
            Rule::Basic { pos, .. }
            | Rule::Constraint { pos, .. }
            | Rule::Choice { pos, .. }
            | Rule::Integrity { pos, .. }
            | Rule::Weight { pos, .. }
            | Rule::Optimize { pos, .. }
            | Rule::Disjunctive { pos, .. } => pos,
        }
    }

    pub fn pos_mut(&mut self) -> &mut [u32] {
        match self {
            Rule::Basic { pos, .. }
            | Rule::Constraint { pos, .. }
            | Rule::Choice { pos, .. }
            | Rule::Integrity { pos, .. }
            | Rule::Weight { pos, .. }
            | Rule::Optimize { pos, .. }
            | Rule::Disjunctive { pos, .. } => pos,
        }
    }

    pub fn neg(&self) -> &[u32] {
        match self {
            Rule::Basic { neg, .. }
            | Rule::Constraint { neg, .. }
            | Rule::Choice { neg, .. }
            | Rule::Integrity { neg, .. }
            | Rule::Weight { neg, .. }
            | Rule::Optimize { neg, .. }
            | Rule::Disjunctive { neg, .. } => neg,
        }
    }

    pub fn neg_mut(&mut self) -> &mut [u32] {
        match self {
            Rule::Basic { neg, .. }
            | Rule::Constraint { neg, .. }
            | Rule::Choice { neg, .. }
            | Rule::Integrity { neg, .. }
            | Rule::Weight { neg, .. }
            | Rule::Optimize { neg, .. }
            | Rule::Disjunctive { neg, .. } => neg,
        }
    }

    pub fn weights(&self) -> Option<&[i64]> {
        match self {
            Rule::Weight { weights, .. } | Rule::Optimize { weights, .. } => Some(weights),
            _ => None,
        }
    }

    pub fn is_disjunctive(&self) -> bool {
        matches!(self, Rule::Disjunctive { .. })
    }
}

/// Rewrite every atom id referenced by `rule` via `f`. Used by the
/// relocator (C3) and left here since it only needs the rule's shape,
/// not the atom table itself.
pub fn map_atoms(rule: &mut Rule, mut f: impl FnMut(u32) -> u32) {
    for h in rule.heads_mut() {
        *h = f(*h);
    }
    for p in rule.pos_mut() {
        *p = f(*p);
    }
    for n in rule.neg_mut() {
        *n = f(*n);
    }
}
