use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::assumptions::{DebtSizing, ProjectAssumptions};
use crate::cashflow::{equity_irr, project, MAX_TARIFF};
use crate::error::{CashflowFailure, LcoeError};
use crate::time_value::npv;
use crate::types::{FinancingMode, Money, Rate};
use crate::LcoeResult;

/// Tunables for the breakeven search. Every field has a default, so a
/// partial JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// First tariff tried (per MWh)
    pub initial_guess: Money,
    /// Increment applied while the tariff is still below breakeven
    pub invalid_tariff_step: Money,
    /// Tariff to fall back to when a guess overshoots or cannot be evaluated
    pub floor_guess: Money,
    /// Budget for bracketing evaluations
    pub max_attempts: u32,
    pub max_bisection_iterations: u32,
    /// Stop once the bracket is narrower than this (per MWh)
    pub tariff_tolerance: Money,
    /// Accept a tariff whose IRR is this close to the cost of equity
    pub irr_tolerance: Decimal,
    /// Added to the root to land just on the profitable side
    pub breakeven_offset: Money,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            initial_guess: dec!(20),
            invalid_tariff_step: dec!(5),
            floor_guess: dec!(1),
            max_attempts: 5000,
            max_bisection_iterations: 200,
            tariff_tolerance: dec!(0.0000001),
            irr_tolerance: dec!(0.000000001),
            breakeven_offset: dec!(0.0001),
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> LcoeResult<()> {
        let invalid = |field: &str, reason: &str| {
            Err(LcoeError::InvalidInput {
                field: format!("solver.{field}"),
                reason: reason.into(),
            })
        };
        let tariff_range = format!("must be within [0, {MAX_TARIFF}]");
        if self.initial_guess < Decimal::ZERO || self.initial_guess > MAX_TARIFF {
            return invalid("initial_guess", &tariff_range);
        }
        if self.floor_guess < Decimal::ZERO || self.floor_guess > MAX_TARIFF {
            return invalid("floor_guess", &tariff_range);
        }
        if self.invalid_tariff_step <= Decimal::ZERO {
            return invalid("invalid_tariff_step", "must be positive");
        }
        if self.tariff_tolerance <= Decimal::ZERO {
            return invalid("tariff_tolerance", "must be positive");
        }
        if self.irr_tolerance < Decimal::ZERO {
            return invalid("irr_tolerance", "must not be negative");
        }
        if self.max_attempts == 0 {
            return invalid("max_attempts", "must be at least 1");
        }
        Ok(())
    }
}

/// Result of a breakeven search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakevenSolution {
    /// Accepted LCOE: root plus the configured offset
    pub lcoe: Money,
    /// Tariff at which equity IRR equals the cost of equity
    pub root: Money,
    pub bracket: (Money, Money),
    pub attempts: u32,
    pub bisection_iterations: u32,
    pub financing_mode: FinancingMode,
}

/// Where a tariff sits relative to breakeven.
#[derive(Debug, Clone, PartialEq)]
enum Placement {
    Root,
    Below,
    Above,
    Unusable(String),
}

/// Breakeven tariff (LCOE) at which post-tax equity IRR equals the cost of
/// equity.
pub fn solve_lcoe(assumptions: &ProjectAssumptions, config: &SolverConfig) -> LcoeResult<Money> {
    solve_breakeven(assumptions, config).map(|s| s.lcoe)
}

/// Bracket the breakeven tariff, then bisect.
///
/// The objective is the equity NPV at the cost of equity, which rises with
/// the tariff; its sign places each tariff. Tariffs whose equity cashflows
/// have no IRR still carry a direction: a tariff too low to recover capital
/// lies below breakeven, and one high enough to fully debt-finance the
/// project lies above it.
pub fn solve_breakeven(
    assumptions: &ProjectAssumptions,
    config: &SolverConfig,
) -> LcoeResult<BreakevenSolution> {
    config.validate()?;
    assumptions.validate()?;
    let mode = assumptions.financing_mode();

    if let DebtSizing::ManualSplit { equity_pct, .. } = assumptions.debt_sizing()? {
        if equity_pct.is_zero() {
            return Err(LcoeError::Solver {
                last_guess: config.initial_guess,
                iterations: 0,
                mode,
                reason: "no equity at risk, equity IRR is undefined at every tariff".into(),
            });
        }
    }

    let solution = |root: Money, bracket: (Money, Money), attempts: u32, iterations: u32| {
        tracing::debug!(%root, attempts, iterations, %mode, "breakeven tariff found");
        BreakevenSolution {
            lcoe: root + config.breakeven_offset,
            root,
            bracket,
            attempts,
            bisection_iterations: iterations,
            financing_mode: mode,
        }
    };

    // ── Phase 1: Bracket ─────────────────────────────────────────────
    let mut guess = config.initial_guess;
    let mut lower: Option<Money> = None;
    let mut upper: Option<Money> = None;
    let mut attempts: u32 = 0;

    let (mut lo, mut hi) = loop {
        if attempts >= config.max_attempts {
            return Err(LcoeError::Solver {
                last_guess: guess,
                iterations: attempts,
                mode,
                reason: format!(
                    "no bracketing interval found (lower: {lower:?}, upper: {upper:?})"
                ),
            });
        }
        attempts += 1;

        let placement = classify(assumptions, guess, config)?;
        tracing::debug!(%guess, ?placement, attempts, "bracketing");

        match placement {
            Placement::Root => return Ok(solution(guess, (guess, guess), attempts, 0)),
            Placement::Below => {
                lower = Some(guess);
                if let Some(hi) = upper {
                    break (guess, hi);
                }
                guess += config.invalid_tariff_step;
            }
            Placement::Above => {
                if guess.is_zero() {
                    return Err(LcoeError::Solver {
                        last_guess: guess,
                        iterations: attempts,
                        mode,
                        reason: "equity return exceeds its cost at a zero tariff".into(),
                    });
                }
                upper = Some(guess);
                if let Some(lo) = lower {
                    break (lo, guess);
                }
                guess = fall_back(guess, config.floor_guess);
            }
            Placement::Unusable(_) => {
                guess = if lower.is_none() && guess > config.floor_guess {
                    config.floor_guess
                } else {
                    guess + config.invalid_tariff_step
                };
            }
        }
    };

    // ── Phase 2: Bisect ──────────────────────────────────────────────
    let bracket = (lo, hi);
    for iteration in 1..=config.max_bisection_iterations {
        let mid = (lo + hi) / dec!(2);
        if hi - lo < config.tariff_tolerance {
            return Ok(solution(mid, bracket, attempts, iteration - 1));
        }

        let placement = classify(assumptions, mid, config)?;
        tracing::trace!(%mid, %lo, %hi, ?placement, "bisecting");

        match placement {
            Placement::Root => return Ok(solution(mid, bracket, attempts, iteration)),
            Placement::Below => lo = mid,
            Placement::Above => hi = mid,
            Placement::Unusable(reason) => {
                return Err(LcoeError::Solver {
                    last_guess: mid,
                    iterations: attempts + iteration,
                    mode,
                    reason: format!("equity IRR could not be evaluated inside the bracket: {reason}"),
                });
            }
        }
    }

    if hi - lo < config.tariff_tolerance {
        return Ok(solution(
            (lo + hi) / dec!(2),
            bracket,
            attempts,
            config.max_bisection_iterations,
        ));
    }

    Err(LcoeError::Solver {
        last_guess: (lo + hi) / dec!(2),
        iterations: attempts + config.max_bisection_iterations,
        mode,
        reason: format!("bracket [{lo}, {hi}] still wider than tolerance"),
    })
}

/// Next lower guess after overshooting: the floor, then zero.
fn fall_back(guess: Money, floor: Money) -> Money {
    if guess > floor {
        floor
    } else {
        Decimal::ZERO
    }
}

fn classify(
    assumptions: &ProjectAssumptions,
    tariff: Money,
    config: &SolverConfig,
) -> LcoeResult<Placement> {
    let projection = match project(assumptions, tariff) {
        Ok(projection) => projection,
        Err(e) => {
            return match e.cashflow_failure() {
                Some(cause) => Ok(direction(cause)),
                None => Err(e),
            }
        }
    };

    let flows = projection.table.equity_cashflows();
    let irr = equity_irr(
        &flows,
        projection.equity_pct,
        assumptions.cost_of_equity,
        tariff,
        projection.sizing.mode(),
    );
    classify_flows(&flows, irr, assumptions.cost_of_equity, config.irr_tolerance)
}

/// Place one equity series relative to breakeven given its IRR outcome.
fn classify_flows(
    flows: &[Money],
    irr: LcoeResult<Rate>,
    cost_of_equity: Rate,
    irr_tolerance: Decimal,
) -> LcoeResult<Placement> {
    let rate = match irr {
        Ok(rate) if (rate - cost_of_equity).abs() < irr_tolerance => return Ok(Placement::Root),
        Ok(rate) => Some(rate),
        Err(e) => match e.cashflow_failure() {
            Some(cause) => return Ok(direction(cause)),
            None if matches!(e, LcoeError::ConvergenceFailure { .. }) => {
                tracing::debug!(error = %e, "equity IRR unavailable, using NPV at cost of equity");
                None
            }
            None => return Err(e),
        },
    };

    match npv(cost_of_equity, flows) {
        Ok(value) if value > Decimal::ZERO => Ok(Placement::Above),
        Ok(value) if value < Decimal::ZERO => Ok(Placement::Below),
        Ok(_) => Ok(Placement::Root),
        Err(e) => Ok(match rate {
            Some(rate) if rate < cost_of_equity => Placement::Below,
            Some(_) => Placement::Above,
            None => Placement::Unusable(e.to_string()),
        }),
    }
}

fn direction(cause: CashflowFailure) -> Placement {
    match cause {
        CashflowFailure::TariffTooLow => Placement::Below,
        CashflowFailure::FullyDebtFinanced => Placement::Above,
    }
}
