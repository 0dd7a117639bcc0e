mod debt;
mod simulator;
mod table;

pub use debt::AMORTIZATION_TOLERANCE;
pub use simulator::{simulate, CashflowSummary, IrrHandling, Simulation, MAX_TARIFF};
pub use table::{CashflowRow, CashflowTable, COLUMNS};

pub(crate) use simulator::{equity_irr, project};
