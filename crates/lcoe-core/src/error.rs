use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::FinancingMode;

/// A single violated constraint on the input assumptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Why an equity cashflow series has no internal rate of return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashflowFailure {
    /// Equity cashflows never repay the equity invested.
    TariffTooLow,
    /// No equity is ever put at risk, so the return is unbounded.
    FullyDebtFinanced,
}

impl fmt::Display for CashflowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CashflowFailure::TariffTooLow => write!(
                f,
                "equity cashflows never repay the equity invested, tariff too low to recover capital"
            ),
            CashflowFailure::FullyDebtFinanced => write!(
                f,
                "project is fully debt-financed, equity IRR is unbounded"
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum LcoeError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid assumptions: {}", join_violations(.0))]
    Validation(Vec<FieldViolation>),

    #[error("No valid equity IRR at tariff {tariff} ({mode}): {cause}")]
    InvalidCashflow {
        tariff: Decimal,
        cause: CashflowFailure,
        mode: FinancingMode,
    },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Internal consistency error ({mode}): {outstanding} debt outstanding at end of period {period}")]
    Consistency {
        period: u32,
        outstanding: Decimal,
        mode: FinancingMode,
    },

    #[error("Breakeven tariff not found ({mode}) after {iterations} iterations, last guess {last_guess}: {reason}")]
    Solver {
        last_guess: Decimal,
        iterations: u32,
        mode: FinancingMode,
        reason: String,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LcoeError {
    /// The invalid-cashflow cause, if this error is one.
    pub fn cashflow_failure(&self) -> Option<CashflowFailure> {
        match self {
            LcoeError::InvalidCashflow { cause, .. } => Some(*cause),
            _ => None,
        }
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for LcoeError {
    fn from(e: serde_json::Error) -> Self {
        LcoeError::SerializationError(e.to_string())
    }
}
