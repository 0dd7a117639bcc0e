use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::assumptions::{DebtSizing, ProjectAssumptions};
use crate::cashflow::debt::{build_schedule, check_amortized};
use crate::cashflow::table::{CashflowRow, CashflowTable};
use crate::error::{CashflowFailure, LcoeError};
use crate::time_value::{irr, npv, payback_period};
use crate::types::{FinancingMode, Money, Rate, HOURS_PER_YEAR};
use crate::LcoeResult;

/// Highest tariff (per MWh) the simulator accepts.
pub const MAX_TARIFF: Money = dec!(1_000_000_000);

/// What to do when the equity cashflows admit no IRR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrHandling {
    /// Return `InvalidCashflow`
    #[default]
    Strict,
    /// Report the IRR as absent and keep the table
    Lenient,
}

/// A fully-built cashflow at one tariff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    pub table: CashflowTable,
    /// `None` only under [`IrrHandling::Lenient`]
    pub post_tax_equity_irr: Option<Rate>,
    pub tariff: Money,
    /// Input assumptions with the solved debt/equity split and DSCR filled in
    pub adjusted_assumptions: ProjectAssumptions,
    /// Lowest EBITDA / debt service across serviced periods
    pub min_dscr: Option<Decimal>,
    pub initial_debt: Money,
    /// Why the IRR is absent, when it is
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr_failure: Option<CashflowFailure>,
}

/// Headline figures derived from a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowSummary {
    pub financing_mode: FinancingMode,
    pub capital_cost: Money,
    pub initial_debt: Money,
    pub debt_pct_of_capital_cost: Rate,
    pub equity_pct_of_capital_cost: Rate,
    pub dscr: Option<Decimal>,
    pub wacc: Option<Rate>,
    pub tax_adjusted_wacc: Option<Rate>,
    pub total_generation_mwh: Decimal,
    pub total_revenues: Money,
    pub total_tax: Money,
    /// Years until equity is repaid from post-tax cashflows
    pub equity_payback_years: Option<Decimal>,
}

/// Cashflow table at one tariff, before the equity return is known.
#[derive(Debug, Clone)]
pub(crate) struct Projection {
    pub table: CashflowTable,
    pub sizing: DebtSizing,
    pub principal: Money,
    pub debt_pct: Rate,
    pub equity_pct: Rate,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Build the project cashflow for `tariff` (per MWh) and compute the post-tax
/// equity IRR.
///
/// The caller's assumptions are never modified; the solved financing fields
/// come back on `adjusted_assumptions`.
pub fn simulate(
    assumptions: &ProjectAssumptions,
    tariff: Money,
    handling: IrrHandling,
) -> LcoeResult<Simulation> {
    let projection = project(assumptions, tariff)?;
    let Projection {
        table,
        sizing,
        principal,
        debt_pct,
        equity_pct,
    } = projection;

    // ── Equity return ────────────────────────────────────────────────
    let min_dscr = table.min_dscr();
    let reported_dscr = match sizing {
        DebtSizing::TargetDscr { dscr } => Some(dscr),
        DebtSizing::ManualSplit { .. } => min_dscr,
    };
    let adjusted_assumptions = assumptions.adjusted(debt_pct, reported_dscr);

    let flows = table.equity_cashflows();
    let (post_tax_equity_irr, irr_failure) =
        match equity_irr(&flows, equity_pct, assumptions.cost_of_equity, tariff, sizing.mode()) {
            Ok(rate) => (Some(rate), None),
            Err(e) => match (handling, e.cashflow_failure()) {
                (IrrHandling::Lenient, Some(cause)) => {
                    tracing::debug!(%tariff, %cause, "equity IRR undefined, reporting none");
                    (None, Some(cause))
                }
                _ => return Err(e),
            },
        };

    tracing::trace!(
        %tariff,
        irr = ?post_tax_equity_irr,
        %debt_pct,
        "cashflow simulated"
    );

    Ok(Simulation {
        table,
        post_tax_equity_irr,
        tariff,
        adjusted_assumptions,
        min_dscr,
        initial_debt: principal,
        irr_failure,
    })
}

/// Operating, debt and equity cashflows at `tariff`.
pub(crate) fn project(assumptions: &ProjectAssumptions, tariff: Money) -> LcoeResult<Projection> {
    assumptions.validate()?;
    if tariff < Decimal::ZERO || tariff > MAX_TARIFF {
        return Err(LcoeError::InvalidInput {
            field: "tariff".into(),
            reason: format!("must be within [0, {MAX_TARIFF}], got {tariff}"),
        });
    }

    let sizing = assumptions.debt_sizing()?;
    let lifetime = assumptions.project_lifetime_years;
    let periods = lifetime as usize + 1;
    let capital_cost = assumptions.capital_cost();

    // ── Phase 1: Operating cashflow ─────────────────────────────────
    let o_m_costs = assumptions.o_m_cost_pct_of_capital_cost * capital_cost;
    let depreciation = capital_cost / Decimal::from(lifetime);
    let hours = Decimal::from(HOURS_PER_YEAR);

    let mut capacity_factors = vec![Decimal::ZERO; periods];
    let mut degradation_factor = Decimal::ONE;
    for (p, cf) in capacity_factors.iter_mut().enumerate().skip(1) {
        if p > 1 {
            degradation_factor *= Decimal::ONE - assumptions.degradation_rate;
        }
        *cf = assumptions.capacity_factor * degradation_factor;
    }

    let generation: Vec<Decimal> = capacity_factors
        .iter()
        .map(|cf| assumptions.capacity_mw * *cf * hours)
        .collect();
    let cfads: Vec<Money> = generation
        .iter()
        .enumerate()
        .map(|(p, mwh)| {
            if p == 0 {
                Decimal::ZERO
            } else {
                *mwh * tariff - o_m_costs
            }
        })
        .collect();

    // ── Phase 2: Debt sizing and amortization ────────────────────────
    let schedule = build_schedule(
        sizing,
        capital_cost,
        &cfads,
        assumptions.cost_of_debt,
        assumptions.loan_tenor_years,
        tariff,
    )?;
    check_amortized(&schedule, assumptions.loan_tenor_years, sizing)?;
    let equity_pct = Decimal::ONE - schedule.debt_pct;

    // ── Phase 3: Tax and equity cashflow ─────────────────────────────
    let mut rows: Vec<CashflowRow> = Vec::with_capacity(periods);
    for p in 0..periods {
        let row = if p == 0 {
            CashflowRow {
                period: 0,
                capacity_mw: Decimal::ZERO,
                capacity_factor: Decimal::ZERO,
                tariff_per_mwh: Decimal::ZERO,
                total_generation_mwh: Decimal::ZERO,
                total_revenues: Decimal::ZERO,
                o_m_costs: Decimal::ZERO,
                total_operating_costs: Decimal::ZERO,
                ebitda: Decimal::ZERO,
                cfads: Decimal::ZERO,
                debt_outstanding_eop: schedule.eop[0],
                debt_outstanding_bop: Decimal::ZERO,
                interest_expense: Decimal::ZERO,
                amortization: Decimal::ZERO,
                target_debt_service: Decimal::ZERO,
                depreciation: Decimal::ZERO,
                taxable_income: Decimal::ZERO,
                tax_liability: Decimal::ZERO,
                post_tax_net_equity_cashflow: -(capital_cost * equity_pct),
            }
        } else {
            let revenue = generation[p] * tariff;
            let ebitda = revenue - o_m_costs;
            let taxable_income = ebitda - depreciation - schedule.interest[p];
            let tax = (assumptions.tax_rate * taxable_income).max(Decimal::ZERO);
            CashflowRow {
                period: p as u32,
                capacity_mw: assumptions.capacity_mw,
                capacity_factor: capacity_factors[p],
                tariff_per_mwh: tariff,
                total_generation_mwh: generation[p],
                total_revenues: revenue,
                o_m_costs,
                total_operating_costs: o_m_costs,
                ebitda,
                cfads: cfads[p],
                debt_outstanding_eop: schedule.eop[p],
                debt_outstanding_bop: schedule.bop[p],
                interest_expense: schedule.interest[p],
                amortization: schedule.amortization[p],
                target_debt_service: schedule.debt_service[p],
                depreciation,
                taxable_income,
                tax_liability: tax,
                post_tax_net_equity_cashflow: ebitda - schedule.debt_service[p] - tax,
            }
        };
        rows.push(row);
    }
    let table = CashflowTable::from_rows(rows);

    Ok(Projection {
        table,
        sizing,
        principal: schedule.principal,
        debt_pct: schedule.debt_pct,
        equity_pct,
    })
}

/// IRR of the equity series, after ruling out series that have none.
///
/// A series with no positive flow is `TariffTooLow` even when no equity is
/// at risk. So is a series whose NPV stays negative at every rate, which
/// shows up as no root and a negative undiscounted sum.
pub(crate) fn equity_irr(
    flows: &[Money],
    equity_pct: Rate,
    cost_of_equity: Rate,
    tariff: Money,
    mode: FinancingMode,
) -> LcoeResult<Rate> {
    let invalid = |cause: CashflowFailure| LcoeError::InvalidCashflow { tariff, cause, mode };

    if !flows.iter().any(|f| *f > Decimal::ZERO) {
        return Err(invalid(CashflowFailure::TariffTooLow));
    }
    if equity_pct.is_zero() || !flows.iter().any(|f| *f < Decimal::ZERO) {
        return Err(invalid(CashflowFailure::FullyDebtFinanced));
    }

    match irr(flows, cost_of_equity) {
        Err(LcoeError::ConvergenceFailure { .. }) if npv(Decimal::ZERO, flows)? < Decimal::ZERO => {
            Err(invalid(CashflowFailure::TariffTooLow))
        }
        result => result,
    }
}

impl Simulation {
    pub fn financing_mode(&self) -> FinancingMode {
        self.adjusted_assumptions.financing_mode()
    }

    pub fn summary(&self) -> CashflowSummary {
        let a = &self.adjusted_assumptions;
        let rows = self.table.rows();
        let debt_pct = a.debt_pct_of_capital_cost.unwrap_or(Decimal::ZERO);
        let equity_pct = a
            .equity_pct_of_capital_cost
            .unwrap_or(Decimal::ONE - debt_pct);
        let equity_outlay = a.capital_cost() * equity_pct;
        let inflows: Vec<Money> = rows
            .iter()
            .skip(1)
            .map(|r| r.post_tax_net_equity_cashflow)
            .collect();

        CashflowSummary {
            financing_mode: a.financing_mode(),
            capital_cost: a.capital_cost(),
            initial_debt: self.initial_debt,
            debt_pct_of_capital_cost: debt_pct,
            equity_pct_of_capital_cost: equity_pct,
            dscr: a.dscr,
            wacc: a.wacc(),
            tax_adjusted_wacc: a.tax_adjusted_wacc(),
            total_generation_mwh: rows.iter().map(|r| r.total_generation_mwh).sum(),
            total_revenues: rows.iter().map(|r| r.total_revenues).sum(),
            total_tax: rows.iter().map(|r| r.tax_liability).sum(),
            equity_payback_years: payback_period(equity_outlay, &inflows),
        }
    }
}
