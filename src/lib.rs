//! Library core for `lpcat` and `lpshift`: module-aware concatenation and
//! disjunction-shifting over ground ASP programs in SMODELS numeric format.
//!
//! - [`atom`] (C1) — the atom/symbol table.
//! - [`rule`] (C2) — the seven ground rule shapes.
//! - [`relocate`] (C3) — cross-module atom renumbering.
//! - [`scc`] (C4) — the Tarjan/SCC engine shared by both binaries.
//! - [`linker`] (C5) — the `lpcat` driver.
//! - [`shifter`] (C6) — the `lpshift` driver.
//! - [`io`] — the SMODELS wire-format reader/writer.
//! - [`error`] — the shared error taxonomy.
//! - [`cli`] — the `run_lpcat`/`run_lpshift` entry points each binary calls.

pub mod atom;
pub mod cli;
pub mod error;
pub mod io;
pub mod linker;
pub mod relocate;
pub mod rule;
pub mod scc;
pub mod shifter;

pub use atom::{AtomTable, ModuleIds, Slice, Status, Symbol, SymbolRegistry};
pub use cli::{run_lpcat, run_lpshift};
pub use error::LpError;
pub use io::{Style, TokenReader};
pub use linker::{Lpcat, LpcatOptions};
pub use relocate::{compress_symbol_table, reloc_program, reloc_symbol_table};
pub use rule::{map_atoms, Program, Rule};
pub use scc::{OccEntry, OccTable, RuleRef};
pub use shifter::{shift_program, ShiftOptions};
