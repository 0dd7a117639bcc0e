use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::assumptions::RawAssumptions;
use crate::error::LcoeError;
use crate::solver::{solve_lcoe, SolverConfig};
use crate::types::{with_metadata, ComputationOutput, Money, SensitivityVariable};
use crate::LcoeResult;

/// Upper bound on points in one sweep; each point is a full breakeven solve.
pub const MAX_SWEEP_POINTS: usize = 1000;

/// One-way LCOE sensitivity request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LcoeSensitivityInput {
    /// Base case
    pub assumptions: RawAssumptions,
    /// Assumption to sweep, by field name
    pub variable: SensitivityVariable,
    #[serde(default)]
    pub solver: SolverConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub value: Decimal,
    /// `None` when no breakeven exists at this value
    pub lcoe: Option<Money>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LcoeSensitivityOutput {
    pub variable: String,
    pub base_lcoe: Money,
    pub points: Vec<SensitivityPoint>,
}

/// Generate the sweep values for a sensitivity variable from min to max with step.
fn generate_sweep_values(var: &SensitivityVariable) -> LcoeResult<Vec<Decimal>> {
    if var.step <= Decimal::ZERO {
        return Err(LcoeError::InvalidInput {
            field: format!("variable:{}", var.name),
            reason: "Step must be positive".into(),
        });
    }
    if var.min > var.max {
        return Err(LcoeError::InvalidInput {
            field: format!("variable:{}", var.name),
            reason: "Min must be <= max".into(),
        });
    }

    let mut values = Vec::new();
    let mut current = var.min;
    while current <= var.max {
        if values.len() == MAX_SWEEP_POINTS {
            return Err(LcoeError::InvalidInput {
                field: format!("variable:{}", var.name),
                reason: format!("Sweep exceeds {MAX_SWEEP_POINTS} points"),
            });
        }
        values.push(current);
        current += var.step;
    }
    // Ensure max is included if step doesn't land exactly on it
    if let Some(&last) = values.last() {
        if last < var.max {
            values.push(var.max);
        }
    }

    Ok(values)
}

/// Sweep one assumption and solve for the LCOE at each value.
///
/// Points with no breakeven (invalid assumptions, solver failure) are kept
/// with `lcoe: None` and reported as warnings. The base case must solve.
pub fn lcoe_sensitivity(
    input: &LcoeSensitivityInput,
) -> LcoeResult<ComputationOutput<LcoeSensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let values = generate_sweep_values(&input.variable)?;
    // Reject unknown field names before solving anything
    input
        .assumptions
        .with_override(&input.variable.name, input.variable.min)?;

    let base = input.assumptions.validate()?;
    let base_lcoe = solve_lcoe(&base, &input.solver)?;

    let mut points = Vec::with_capacity(values.len());
    for value in values {
        let solved = input
            .assumptions
            .with_override(&input.variable.name, value)
            .and_then(|raw| raw.validate())
            .and_then(|a| solve_lcoe(&a, &input.solver));

        match solved {
            Ok(lcoe) => points.push(SensitivityPoint {
                value,
                lcoe: Some(lcoe),
                error: None,
            }),
            Err(e) => {
                tracing::debug!(variable = %input.variable.name, %value, error = %e, "sweep point failed");
                warnings.push(format!(
                    "{} = {}: {}",
                    input.variable.name, value, e
                ));
                points.push(SensitivityPoint {
                    value,
                    lcoe: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let output = LcoeSensitivityOutput {
        variable: input.variable.name.clone(),
        base_lcoe,
        points,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "One-way LCOE sensitivity",
        &serde_json::json!({
            "variable": input.variable,
            "solver": input.solver,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn var(name: &str, min: Decimal, max: Decimal, step: Decimal) -> SensitivityVariable {
        SensitivityVariable {
            name: name.into(),
            min,
            max,
            step,
        }
    }

    fn base() -> RawAssumptions {
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
            ..Default::default()
        }
    }

    #[test]
    fn test_sweep_includes_max() {
        let values = generate_sweep_values(&var("x", dec!(0), dec!(1), dec!(0.3))).unwrap();
        assert_eq!(values, vec![dec!(0), dec!(0.3), dec!(0.6), dec!(0.9), dec!(1)]);
    }

    #[test]
    fn test_sweep_rejects_bad_step() {
        assert!(generate_sweep_values(&var("x", dec!(0), dec!(1), dec!(0))).is_err());
        assert!(generate_sweep_values(&var("x", dec!(2), dec!(1), dec!(1))).is_err());
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let input = LcoeSensitivityInput {
            assumptions: base(),
            variable: var("colour", dec!(0), dec!(1), dec!(1)),
            solver: SolverConfig::default(),
        };
        assert!(matches!(
            lcoe_sensitivity(&input),
            Err(LcoeError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_lcoe_falls_with_capacity_factor() {
        let input = LcoeSensitivityInput {
            assumptions: base(),
            variable: var("capacity_factor", dec!(0.10), dec!(0.20), dec!(0.05)),
            solver: SolverConfig::default(),
        };
        let out = lcoe_sensitivity(&input).unwrap().result;
        let lcoes: Vec<Decimal> = out.points.iter().map(|p| p.lcoe.unwrap()).collect();
        assert_eq!(lcoes.len(), 3);
        assert!(lcoes[0] > lcoes[1] && lcoes[1] > lcoes[2]);
    }

    #[test]
    fn test_out_of_bounds_point_recorded_not_zeroed() {
        let input = LcoeSensitivityInput {
            assumptions: base(),
            variable: var("tax_rate", dec!(0.3), dec!(0.6), dec!(0.3)),
            solver: SolverConfig::default(),
        };
        let out = lcoe_sensitivity(&input).unwrap();
        assert_eq!(out.result.points.len(), 2);
        assert!(out.result.points[0].lcoe.is_some());
        assert_eq!(out.result.points[1].lcoe, None);
        assert!(out.result.points[1].error.is_some());
        assert_eq!(out.warnings.len(), 1);
    }
}
