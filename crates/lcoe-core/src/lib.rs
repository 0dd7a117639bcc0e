pub mod assumptions;
pub mod cashflow;
pub mod engine;
pub mod error;
pub mod export;
pub mod solver;
pub mod time_value;
pub mod types;

#[cfg(feature = "sensitivity")]
pub mod sensitivity;

pub use assumptions::{DebtSizing, ProjectAssumptions, RawAssumptions};
pub use cashflow::{simulate, CashflowRow, CashflowSummary, CashflowTable, IrrHandling, Simulation};
pub use error::{CashflowFailure, FieldViolation, LcoeError};
pub use solver::{solve_breakeven, solve_lcoe, BreakevenSolution, SolverConfig};
pub use types::*;

/// Standard result type for all LCOE engine operations
pub type LcoeResult<T> = Result<T, LcoeError>;
