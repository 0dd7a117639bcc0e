use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::assumptions::{ProjectAssumptions, RawAssumptions};
use crate::cashflow::{simulate, CashflowSummary, CashflowTable, IrrHandling, Simulation};
use crate::error::CashflowFailure;
use crate::solver::{solve_breakeven, SolverConfig};
use crate::types::{with_metadata, ComputationOutput, FinancingMode, Money, Rate};
use crate::LcoeResult;

/// Capacity factors above this are unusual for fixed or tracking PV.
const HIGH_CAPACITY_FACTOR: Decimal = dec!(0.35);
/// Typical senior lender DSCR covenant.
const COVENANT_DSCR: Decimal = dec!(1.2);

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Request for a breakeven tariff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LcoeInput {
    pub assumptions: RawAssumptions,
    #[serde(default)]
    pub solver: SolverConfig,
}

/// Request for a cashflow at a given tariff, or at breakeven when the
/// tariff is omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashflowInput {
    pub assumptions: RawAssumptions,
    /// Tariff per MWh; solved for when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tariff: Option<Money>,
    #[serde(default)]
    pub irr_handling: IrrHandling,
    #[serde(default)]
    pub solver: SolverConfig,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LcoeOutput {
    /// Breakeven tariff per MWh
    pub lcoe: Money,
    pub post_tax_equity_irr: Option<Rate>,
    pub financing_mode: FinancingMode,
    /// Tariffs bounding the breakeven before bisection
    pub bracket: (Money, Money),
    pub attempts: u32,
    pub bisection_iterations: u32,
    pub summary: CashflowSummary,
    pub adjusted_assumptions: ProjectAssumptions,
    /// Cashflow at the LCOE
    pub cashflow: CashflowTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TariffSource {
    Supplied,
    Breakeven,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashflowOutput {
    pub tariff: Money,
    pub tariff_source: TariffSource,
    pub post_tax_equity_irr: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr_failure: Option<CashflowFailure>,
    pub summary: CashflowSummary,
    pub adjusted_assumptions: ProjectAssumptions,
    pub cashflow: CashflowTable,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Solve for the LCOE and return the breakeven cashflow with it.
pub fn calculate_lcoe(input: &LcoeInput) -> LcoeResult<ComputationOutput<LcoeOutput>> {
    let start = Instant::now();

    let assumptions = input.assumptions.validate()?;
    let solution = solve_breakeven(&assumptions, &input.solver)?;
    let sim = simulate(&assumptions, solution.lcoe, IrrHandling::Lenient)?;
    let warnings = collect_warnings(&assumptions, &sim);

    let output = LcoeOutput {
        lcoe: solution.lcoe,
        post_tax_equity_irr: sim.post_tax_equity_irr,
        financing_mode: solution.financing_mode,
        bracket: solution.bracket,
        attempts: solution.attempts,
        bisection_iterations: solution.bisection_iterations,
        summary: sim.summary(),
        adjusted_assumptions: sim.adjusted_assumptions,
        cashflow: sim.table,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Solar PV LCOE: breakeven tariff where post-tax equity IRR equals cost of equity",
        &serde_json::json!({
            "assumptions": assumptions,
            "solver": input.solver,
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Build the project cashflow at the supplied tariff, or at breakeven.
pub fn model_cashflow(input: &CashflowInput) -> LcoeResult<ComputationOutput<CashflowOutput>> {
    let start = Instant::now();

    let assumptions = input.assumptions.validate()?;
    let (tariff, tariff_source) = match input.tariff {
        Some(t) => (t, TariffSource::Supplied),
        None => {
            let solution = solve_breakeven(&assumptions, &input.solver)?;
            (solution.lcoe, TariffSource::Breakeven)
        }
    };

    let sim = simulate(&assumptions, tariff, input.irr_handling)?;
    let warnings = collect_warnings(&assumptions, &sim);

    let output = CashflowOutput {
        tariff,
        tariff_source,
        post_tax_equity_irr: sim.post_tax_equity_irr,
        irr_failure: sim.irr_failure,
        summary: sim.summary(),
        adjusted_assumptions: sim.adjusted_assumptions,
        cashflow: sim.table,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Solar PV project finance cashflow with post-tax equity IRR",
        &serde_json::json!({
            "assumptions": assumptions,
            "tariff": input.tariff,
            "irr_handling": input.irr_handling,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn collect_warnings(assumptions: &ProjectAssumptions, sim: &Simulation) -> Vec<String> {
    let mut warnings = Vec::new();

    if assumptions.capacity_factor > HIGH_CAPACITY_FACTOR {
        warnings.push(format!(
            "Capacity factor {} is unusually high for solar PV",
            assumptions.capacity_factor
        ));
    }

    if assumptions.loan_tenor_years < assumptions.project_lifetime_years {
        warnings.push(format!(
            "Loan tenor of {} years is shorter than the {}-year project life",
            assumptions.loan_tenor_years, assumptions.project_lifetime_years
        ));
    }

    if assumptions.financing_mode() == FinancingMode::ManualSplit {
        if let Some(dscr) = sim.min_dscr {
            if dscr < Decimal::ONE {
                warnings.push(format!(
                    "Minimum DSCR {:.2}x below 1.0x: EBITDA does not cover debt service",
                    dscr
                ));
            } else if dscr < COVENANT_DSCR {
                warnings.push(format!(
                    "Minimum DSCR {:.2}x below the typical 1.20x lender covenant",
                    dscr
                ));
            }
        }
    }

    if let Some(cause) = sim.irr_failure {
        warnings.push(format!("Post-tax equity IRR not reported: {cause}"));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(targeting_dscr: bool) -> RawAssumptions {
        RawAssumptions {
            capacity_mw: Some(dec!(30)),
            capacity_factor: Some(dec!(0.10)),
            capital_expenditure_per_kw: Some(dec!(670)),
            o_m_cost_pct_of_capital_cost: Some(dec!(0.02)),
            debt_pct_of_capital_cost: Some(dec!(0.8)),
            equity_pct_of_capital_cost: Some(dec!(0.2)),
            cost_of_debt: Some(dec!(0.05)),
            cost_of_equity: Some(dec!(0.10)),
            tax_rate: Some(dec!(0.30)),
            project_lifetime_years: Some(25),
            degradation_rate: Some(dec!(0.005)),
            dscr: Some(dec!(1.3)),
            targeting_dscr: Some(targeting_dscr),
            ..Default::default()
        }
    }

    #[test]
    fn test_supplied_tariff_is_used() {
        let input = CashflowInput {
            assumptions: raw(false),
            tariff: Some(dec!(100)),
            irr_handling: IrrHandling::Strict,
            solver: SolverConfig::default(),
        };
        let out = model_cashflow(&input).unwrap();
        assert_eq!(out.result.tariff, dec!(100));
        assert_eq!(out.result.tariff_source, TariffSource::Supplied);
        assert_eq!(out.result.cashflow.len(), 26);
    }

    #[test]
    fn test_absent_tariff_solves_breakeven() {
        let input = CashflowInput {
            assumptions: raw(true),
            tariff: None,
            irr_handling: IrrHandling::Strict,
            solver: SolverConfig::default(),
        };
        let out = model_cashflow(&input).unwrap();
        assert_eq!(out.result.tariff_source, TariffSource::Breakeven);
        let irr = out.result.post_tax_equity_irr.unwrap();
        assert!((irr - dec!(0.10)).abs() < dec!(0.001));
    }

    #[test]
    fn test_lenient_suppression_warns() {
        let input = CashflowInput {
            assumptions: raw(true),
            tariff: Some(Decimal::ZERO),
            irr_handling: IrrHandling::Lenient,
            solver: SolverConfig::default(),
        };
        let out = model_cashflow(&input).unwrap();
        assert_eq!(out.result.post_tax_equity_irr, None);
        assert!(out
            .warnings
            .iter()
            .any(|w| w.contains("Post-tax equity IRR not reported")));
    }

    #[test]
    fn test_short_tenor_warns() {
        let mut assumptions = raw(false);
        assumptions.loan_tenor_years = Some(15);
        let input = CashflowInput {
            assumptions,
            tariff: Some(dec!(100)),
            irr_handling: IrrHandling::Strict,
            solver: SolverConfig::default(),
        };
        let out = model_cashflow(&input).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("Loan tenor")));
    }

    #[test]
    fn test_request_json_shape() {
        let input: LcoeInput = serde_json::from_value(serde_json::json!({
            "assumptions": {
                "capacity_mw": 30,
                "capacity_factor": 0.1,
                "capital_expenditure_per_kw": 670,
                "o_m_cost_pct_of_capital_cost": 0.02,
                "cost_of_debt": 0.05,
                "cost_of_equity": 0.1,
                "tax_rate": 0.3,
                "project_lifetime_years": 25,
                "dscr": 1.3,
                "targeting_dscr": true
            },
            "solver": { "initial_guess": 60 }
        }))
        .unwrap();
        assert_eq!(input.solver.initial_guess, dec!(60));
        assert_eq!(input.solver.invalid_tariff_step, dec!(5));

        let out = calculate_lcoe(&input).unwrap();
        assert!(out.result.lcoe > dec!(20) && out.result.lcoe < dec!(200));
        assert_eq!(out.result.financing_mode, FinancingMode::TargetDscr);
    }
}
