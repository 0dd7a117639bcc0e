use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::assumptions::{DebtSizing, SPLIT_TOLERANCE};
use crate::error::{CashflowFailure, LcoeError};
use crate::time_value::npv;
use crate::types::{Money, Rate};
use crate::LcoeResult;

/// Largest balance tolerated once the loan should have been repaid.
pub const AMORTIZATION_TOLERANCE: Decimal = dec!(0.0001);

/// Per-period debt figures, indexed by period `0..=lifetime`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DebtSchedule {
    pub principal: Money,
    pub debt_pct: Rate,
    pub bop: Vec<Money>,
    pub eop: Vec<Money>,
    pub interest: Vec<Money>,
    pub amortization: Vec<Money>,
    pub debt_service: Vec<Money>,
}

/// Initial principal and the per-period service stream it is sized from.
struct Sizing {
    principal: Money,
    debt_pct: Rate,
    /// DSCR mode only: service each period should carry
    target_service: Option<Vec<Money>>,
    /// Manual mode only: straight-line principal repayment
    level_amortization: Money,
}

/// Size the loan and run the amortization recurrence.
///
/// `cfads` is indexed by period with `cfads[0]` at financial close.
pub(crate) fn build_schedule(
    sizing: DebtSizing,
    capital_cost: Money,
    cfads: &[Money],
    cost_of_debt: Rate,
    loan_tenor_years: u32,
    tariff: Money,
) -> LcoeResult<DebtSchedule> {
    let sized = size_debt(sizing, capital_cost, cfads, cost_of_debt, loan_tenor_years, tariff)?;
    let tenor = loan_tenor_years as usize;
    let periods = cfads.len();

    let mut bop = vec![Decimal::ZERO; periods];
    let mut eop = vec![Decimal::ZERO; periods];
    let mut interest = vec![Decimal::ZERO; periods];
    let mut amortization = vec![Decimal::ZERO; periods];
    let mut debt_service = vec![Decimal::ZERO; periods];

    if periods == 0 {
        return Ok(DebtSchedule {
            principal: sized.principal,
            debt_pct: sized.debt_pct,
            bop,
            eop,
            interest,
            amortization,
            debt_service,
        });
    }

    eop[0] = sized.principal;

    for p in 1..periods {
        bop[p] = eop[p - 1];
        if p <= tenor {
            interest[p] = bop[p] * cost_of_debt;
            amortization[p] = match &sized.target_service {
                Some(target) => (target[p] - interest[p]).min(bop[p]),
                None => sized.level_amortization.min(bop[p]),
            };
            debt_service[p] = interest[p] + amortization[p];
        }
        eop[p] = bop[p] - amortization[p];
    }

    Ok(DebtSchedule {
        principal: sized.principal,
        debt_pct: sized.debt_pct,
        bop,
        eop,
        interest,
        amortization,
        debt_service,
    })
}

fn size_debt(
    sizing: DebtSizing,
    capital_cost: Money,
    cfads: &[Money],
    cost_of_debt: Rate,
    loan_tenor_years: u32,
    tariff: Money,
) -> LcoeResult<Sizing> {
    if capital_cost <= Decimal::ZERO {
        return Err(LcoeError::DivisionByZero {
            context: "debt fraction of zero capital cost".into(),
        });
    }

    match sizing {
        DebtSizing::TargetDscr { dscr } => {
            let tenor = loan_tenor_years as usize;
            let target: Vec<Money> = cfads
                .iter()
                .enumerate()
                .map(|(p, cf)| {
                    if p == 0 || p > tenor {
                        Decimal::ZERO
                    } else {
                        (*cf).max(Decimal::ZERO) / dscr
                    }
                })
                .collect();

            let principal = npv(cost_of_debt, &target)?.min(capital_cost);
            let debt_pct = principal / capital_cost;
            check_split(debt_pct, sizing, tariff)?;

            Ok(Sizing {
                principal,
                debt_pct,
                target_service: Some(target),
                level_amortization: Decimal::ZERO,
            })
        }
        DebtSizing::ManualSplit { debt_pct, .. } => {
            check_split(debt_pct, sizing, tariff)?;
            let principal = debt_pct * capital_cost;
            let level_amortization = if loan_tenor_years > 0 {
                principal / Decimal::from(loan_tenor_years)
            } else {
                Decimal::ZERO
            };
            Ok(Sizing {
                principal,
                debt_pct,
                target_service: None,
                level_amortization,
            })
        }
    }
}

fn check_split(debt_pct: Rate, sizing: DebtSizing, tariff: Money) -> LcoeResult<()> {
    if debt_pct < Decimal::ZERO || debt_pct > Decimal::ONE {
        return Err(LcoeError::InvalidCashflow {
            tariff,
            cause: CashflowFailure::TariffTooLow,
            mode: sizing.mode(),
        });
    }
    if let DebtSizing::ManualSplit { equity_pct, .. } = sizing {
        if ((debt_pct + equity_pct) - Decimal::ONE).abs() > SPLIT_TOLERANCE {
            return Err(LcoeError::InvalidInput {
                field: "debt_pct_of_capital_cost + equity_pct_of_capital_cost".into(),
                reason: format!("must sum to 1, got {}", debt_pct + equity_pct),
            });
        }
    }
    Ok(())
}

/// Fail if any balance remains from the final loan period onwards.
pub(crate) fn check_amortized(
    schedule: &DebtSchedule,
    loan_tenor_years: u32,
    sizing: DebtSizing,
) -> LcoeResult<()> {
    let first = loan_tenor_years as usize;
    for (p, outstanding) in schedule.eop.iter().enumerate().skip(first) {
        if outstanding.abs() > AMORTIZATION_TOLERANCE {
            return Err(LcoeError::Consistency {
                period: p as u32,
                outstanding: *outstanding,
                mode: sizing.mode(),
            });
        }
    }
    Ok(())
}
