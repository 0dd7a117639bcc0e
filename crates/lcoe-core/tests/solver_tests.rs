use lcoe_core::assumptions::{ProjectAssumptions, RawAssumptions};
use lcoe_core::cashflow::{simulate, IrrHandling};
use lcoe_core::error::LcoeError;
use lcoe_core::solver::{solve_breakeven, solve_lcoe, SolverConfig};
use lcoe_core::types::FinancingMode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn sculpted() -> ProjectAssumptions {
    RawAssumptions {
        capacity_mw: Some(dec!(30)),
        capacity_factor: Some(dec!(0.10)),
        capital_expenditure_per_kw: Some(dec!(670)),
        o_m_cost_pct_of_capital_cost: Some(dec!(0.02)),
        cost_of_debt: Some(dec!(0.05)),
        cost_of_equity: Some(dec!(0.10)),
        tax_rate: Some(dec!(0.30)),
        project_lifetime_years: Some(25),
        degradation_rate: Some(dec!(0.005)),
        dscr: Some(dec!(1.3)),
        targeting_dscr: Some(true),
        ..Default::default()
    }
    .validate()
    .unwrap()
}

fn irr_at(a: &ProjectAssumptions, tariff: Decimal) -> Decimal {
    simulate(a, tariff, IrrHandling::Strict)
        .unwrap()
        .post_tax_equity_irr
        .unwrap()
}

// ===========================================================================
// Bracketing
// ===========================================================================

#[test]
fn test_start_above_breakeven_falls_back_to_floor() {
    // 500/MWh fully debt-finances the plant, so the ladder must come down
    let config = SolverConfig {
        initial_guess: dec!(500),
        ..Default::default()
    };
    let s = solve_breakeven(&sculpted(), &config).unwrap();
    assert_eq!(s.bracket, (dec!(1), dec!(500)));
    assert!((irr_at(&sculpted(), s.lcoe) - dec!(0.10)).abs() < dec!(0.001));
}

#[test]
fn test_start_guess_does_not_change_answer() {
    let a = sculpted();
    let low = solve_lcoe(&a, &SolverConfig::default()).unwrap();
    let high = solve_lcoe(
        &a,
        &SolverConfig {
            initial_guess: dec!(300),
            ..Default::default()
        },
    )
    .unwrap();
    assert!((low - high).abs() < dec!(0.00001), "{} vs {}", low, high);
}

#[test]
fn test_start_at_zero() {
    let config = SolverConfig {
        initial_guess: Decimal::ZERO,
        ..Default::default()
    };
    let s = solve_breakeven(&sculpted(), &config).unwrap();
    assert!(s.lcoe > dec!(60) && s.lcoe < dec!(100));
}

#[test]
fn test_ladder_steps_from_initial_guess() {
    // 20, 25, .., 75 are all below breakeven; 80 is above
    let s = solve_breakeven(&sculpted(), &SolverConfig::default()).unwrap();
    assert_eq!(s.bracket, (dec!(75), dec!(80)));
    assert_eq!(s.attempts, 13);
}

// ===========================================================================
// Convergence
// ===========================================================================

#[test]
fn test_root_within_tolerance() {
    let a = sculpted();
    let s = solve_breakeven(&a, &SolverConfig::default()).unwrap();
    assert_eq!(s.lcoe - s.root, dec!(0.0001));
    assert!(irr_at(&a, s.root - dec!(0.001)) < dec!(0.10));
    assert!(irr_at(&a, s.root + dec!(0.001)) > dec!(0.10));
    assert!(s.bisection_iterations > 0);
}

#[test]
fn test_bisection_budget_exhausted() {
    let config = SolverConfig {
        max_bisection_iterations: 3,
        ..Default::default()
    };
    match solve_lcoe(&sculpted(), &config).unwrap_err() {
        LcoeError::Solver {
            last_guess, mode, ..
        } => {
            assert!(last_guess > dec!(75) && last_guess < dec!(80));
            assert_eq!(mode, FinancingMode::TargetDscr);
        }
        other => panic!("Expected Solver error, got: {other:?}"),
    }
}

#[test]
fn test_custom_offset_applied() {
    let config = SolverConfig {
        breakeven_offset: Decimal::ZERO,
        ..Default::default()
    };
    let s = solve_breakeven(&sculpted(), &config).unwrap();
    assert_eq!(s.lcoe, s.root);
}

#[test]
fn test_invalid_assumptions_fail_fast() {
    let mut a = sculpted();
    a.capacity_factor = dec!(2);
    assert!(matches!(
        solve_lcoe(&a, &SolverConfig::default()),
        Err(LcoeError::Validation(_))
    ));
}

// ===========================================================================
// Long, heavily degrading plants
// ===========================================================================

/// 50 years at 5%/yr degradation: late CFADS goes negative, so equity
/// cashflows change sign more than once.
fn degrading(targeting_dscr: bool) -> ProjectAssumptions {
    let mut raw = RawAssumptions {
        capacity_mw: Some(dec!(30)),
        capacity_factor: Some(dec!(0.10)),
        capital_expenditure_per_kw: Some(dec!(670)),
        o_m_cost_pct_of_capital_cost: Some(dec!(0.02)),
        cost_of_debt: Some(dec!(0.05)),
        cost_of_equity: Some(dec!(0.10)),
        tax_rate: Some(dec!(0.30)),
        project_lifetime_years: Some(50),
        degradation_rate: Some(dec!(0.05)),
        targeting_dscr: Some(targeting_dscr),
        ..Default::default()
    };
    if targeting_dscr {
        raw.dscr = Some(dec!(1.3));
    } else {
        raw.debt_pct_of_capital_cost = Some(dec!(0.8));
        raw.equity_pct_of_capital_cost = Some(dec!(0.2));
    }
    raw.validate().unwrap()
}

fn sign_changes(flows: &[Decimal]) -> usize {
    flows
        .iter()
        .filter(|f| !f.is_zero())
        .collect::<Vec<_>>()
        .windows(2)
        .filter(|w| w[0].is_sign_negative() != w[1].is_sign_negative())
        .count()
}

#[test]
fn test_degrading_manual_split_solves() {
    let a = degrading(false);
    let s = solve_breakeven(&a, &SolverConfig::default()).unwrap();
    assert_eq!(s.financing_mode, FinancingMode::ManualSplit);

    let sim = simulate(&a, s.lcoe, IrrHandling::Lenient).unwrap();
    assert!(sign_changes(&sim.table.equity_cashflows()) > 1);
    let irr = sim.post_tax_equity_irr.unwrap();
    assert!((irr - dec!(0.10)).abs() < dec!(0.001), "irr {irr}");
}

#[test]
fn test_degrading_dscr_target_solves() {
    let a = degrading(true);
    let s = solve_breakeven(&a, &SolverConfig::default()).unwrap();
    assert_eq!(s.financing_mode, FinancingMode::TargetDscr);

    let sim = simulate(&a, s.lcoe, IrrHandling::Lenient).unwrap();
    let irr = sim.post_tax_equity_irr.unwrap();
    assert!((irr - dec!(0.10)).abs() < dec!(0.001), "irr {irr}");
}

#[test]
fn test_degrading_below_breakeven_is_never_a_convergence_error() {
    // Deep in the negative tail the equity never earns its money back
    for tariff in [dec!(30), dec!(60), dec!(90)] {
        for a in [degrading(false), degrading(true)] {
            match simulate(&a, tariff, IrrHandling::Lenient) {
                Ok(sim) => {
                    let last = sim.table.rows().last().unwrap();
                    assert!(last.debt_outstanding_eop.abs() < dec!(0.0001));
                }
                Err(e) => panic!("tariff {tariff}: {e}"),
            }
        }
    }
}

#[test]
fn test_objective_rises_with_tariff_on_degrading_plant() {
    let a = degrading(false);
    let lcoe = solve_lcoe(&a, &SolverConfig::default()).unwrap();
    let below = simulate(&a, lcoe - dec!(1), IrrHandling::Lenient).unwrap();
    let above = simulate(&a, lcoe + dec!(1), IrrHandling::Lenient).unwrap();
    let npv_below = lcoe_core::time_value::npv(dec!(0.10), &below.table.equity_cashflows()).unwrap();
    let npv_above = lcoe_core::time_value::npv(dec!(0.10), &above.table.equity_cashflows()).unwrap();
    assert!(npv_below < Decimal::ZERO && npv_above > Decimal::ZERO);
}
