use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{FieldViolation, LcoeError};
use crate::types::{FinancingMode, Money, Rate};
use crate::LcoeResult;

/// Tolerance on `debt + equity == 1`.
pub const SPLIT_TOLERANCE: Decimal = dec!(0.000000001);

/// Utility-scale ceiling on nameplate capacity.
pub const MAX_CAPACITY_MW: Decimal = dec!(1000);
/// 1,000,000 per MW.
pub const MAX_CAPEX_PER_KW: Decimal = dec!(1000);
const MIN_LIFETIME_YEARS: u32 = 5;
const MAX_LIFETIME_YEARS: u32 = 50;
const MIN_LOAN_TENOR_YEARS: u32 = 5;
const MAX_O_M_PCT: Decimal = dec!(0.5);
const MAX_FINANCING_RATE: Decimal = dec!(0.5);
const MAX_DEGRADATION_RATE: Decimal = dec!(0.05);
const MIN_DSCR: Decimal = dec!(1);
const MAX_DSCR: Decimal = dec!(10);

// ---------------------------------------------------------------------------
// Boundary type
// ---------------------------------------------------------------------------

/// Assumptions as they arrive from a caller: every field optional, textual
/// placeholders such as `""` or `"None"` read as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAssumptions {
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub capacity_mw: Option<Decimal>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub capacity_factor: Option<Rate>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub capital_expenditure_per_kw: Option<Money>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub o_m_cost_pct_of_capital_cost: Option<Rate>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub debt_pct_of_capital_cost: Option<Rate>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub equity_pct_of_capital_cost: Option<Rate>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub cost_of_debt: Option<Rate>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub cost_of_equity: Option<Rate>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<Rate>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub project_lifetime_years: Option<u32>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub loan_tenor_years: Option<u32>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub degradation_rate: Option<Rate>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub dscr: Option<Decimal>,
    #[serde(default, deserialize_with = "optional_field", skip_serializing_if = "Option::is_none")]
    pub targeting_dscr: Option<bool>,
}

fn is_absent_marker(text: &str) -> bool {
    text.is_empty()
        || ["none", "null", "nan", "undefined"]
            .iter()
            .any(|marker| text.eq_ignore_ascii_case(marker))
}

/// Deserialize an optional value that may also arrive as text, mapping
/// placeholder strings to `None`.
fn optional_field<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field<T> {
        Value(T),
        Text(String),
    }

    match Option::<Field<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Field::Value(value)) => Ok(Some(value)),
        Some(Field::Text(text)) => {
            let text = text.trim();
            if is_absent_marker(text) {
                Ok(None)
            } else {
                text.parse::<T>()
                    .map(Some)
                    .map_err(|e| de::Error::custom(format!("'{text}': {e}")))
            }
        }
    }
}

/// Collects every violated constraint before failing.
#[derive(Default)]
struct Violations(Vec<FieldViolation>);

impl Violations {
    fn push(&mut self, field: &str, reason: impl Into<String>) {
        self.0.push(FieldViolation {
            field: field.to_string(),
            reason: reason.into(),
        });
    }

    fn require<T: Copy>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.push(field, "is required");
        }
        value
    }

    /// `(0, max]`
    fn positive_up_to(&mut self, field: &str, value: Option<Decimal>, max: Decimal) {
        if let Some(v) = value {
            if v <= Decimal::ZERO {
                self.push(field, format!("must be greater than 0, got {v}"));
            } else if v > max {
                self.push(field, format!("must not exceed {max}, got {v}"));
            }
        }
    }

    fn within(&mut self, field: &str, value: Option<Decimal>, min: Decimal, max: Decimal) {
        if let Some(v) = value {
            if v < min || v > max {
                self.push(field, format!("must be within [{min}, {max}], got {v}"));
            }
        }
    }

    fn within_years(&mut self, field: &str, value: Option<u32>, min: u32, max: u32) {
        if let Some(v) = value {
            if v < min || v > max {
                self.push(field, format!("must be within [{min}, {max}] years, got {v}"));
            }
        }
    }

    fn finish(self) -> LcoeResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(LcoeError::Validation(self.0))
        }
    }
}

impl RawAssumptions {
    /// Validate and normalize into [`ProjectAssumptions`], reporting every
    /// violated constraint at once.
    ///
    /// The loan tenor defaults to the project lifetime and degradation to 0.
    /// Whichever of {debt fraction, DSCR target} the mode does not use is
    /// dropped, since the engine computes it.
    pub fn validate(&self) -> LcoeResult<ProjectAssumptions> {
        let mut v = Violations::default();

        let capacity_mw = v.require("capacity_mw", self.capacity_mw);
        let capacity_factor = v.require("capacity_factor", self.capacity_factor);
        let capex = v.require("capital_expenditure_per_kw", self.capital_expenditure_per_kw);
        let o_m = v.require("o_m_cost_pct_of_capital_cost", self.o_m_cost_pct_of_capital_cost);
        let cost_of_debt = v.require("cost_of_debt", self.cost_of_debt);
        let cost_of_equity = v.require("cost_of_equity", self.cost_of_equity);
        let tax_rate = v.require("tax_rate", self.tax_rate);
        let lifetime = v.require("project_lifetime_years", self.project_lifetime_years);
        let degradation = self.degradation_rate.unwrap_or(Decimal::ZERO);
        let targeting_dscr = self.targeting_dscr.unwrap_or(false);

        v.positive_up_to("capacity_mw", capacity_mw, MAX_CAPACITY_MW);
        v.within("capacity_factor", capacity_factor, Decimal::ZERO, Decimal::ONE);
        v.positive_up_to("capital_expenditure_per_kw", capex, MAX_CAPEX_PER_KW);
        v.within("o_m_cost_pct_of_capital_cost", o_m, Decimal::ZERO, MAX_O_M_PCT);
        v.within("cost_of_debt", cost_of_debt, Decimal::ZERO, MAX_FINANCING_RATE);
        v.within("cost_of_equity", cost_of_equity, Decimal::ZERO, MAX_FINANCING_RATE);
        v.within("tax_rate", tax_rate, Decimal::ZERO, MAX_FINANCING_RATE);
        v.within("degradation_rate", Some(degradation), Decimal::ZERO, MAX_DEGRADATION_RATE);
        v.within_years(
            "project_lifetime_years",
            lifetime,
            MIN_LIFETIME_YEARS,
            MAX_LIFETIME_YEARS,
        );

        let loan_tenor = self.loan_tenor_years.or(lifetime);
        if let Some(tenor) = loan_tenor {
            let max_tenor = lifetime.unwrap_or(MAX_LIFETIME_YEARS);
            if tenor < MIN_LOAN_TENOR_YEARS {
                v.push(
                    "loan_tenor_years",
                    format!("must be at least {MIN_LOAN_TENOR_YEARS} years, got {tenor}"),
                );
            } else if tenor > max_tenor {
                v.push(
                    "loan_tenor_years",
                    format!("must not exceed the project lifetime of {max_tenor} years, got {tenor}"),
                );
            }
        }

        let (debt_pct, equity_pct, dscr) = if targeting_dscr {
            let dscr = v.require("dscr", self.dscr);
            v.within("dscr", dscr, MIN_DSCR, MAX_DSCR);
            (None, None, dscr)
        } else {
            let debt = v.require("debt_pct_of_capital_cost", self.debt_pct_of_capital_cost);
            let equity = v.require("equity_pct_of_capital_cost", self.equity_pct_of_capital_cost);
            v.within("debt_pct_of_capital_cost", debt, Decimal::ZERO, Decimal::ONE);
            v.within("equity_pct_of_capital_cost", equity, Decimal::ZERO, Decimal::ONE);
            if let (Some(d), Some(e)) = (debt, equity) {
                if ((d + e) - Decimal::ONE).abs() > SPLIT_TOLERANCE {
                    v.push(
                        "debt_pct_of_capital_cost + equity_pct_of_capital_cost",
                        format!("must sum to 1, got {}", d + e),
                    );
                }
            }
            (debt, equity, None)
        };

        v.finish()?;

        // Every required field was checked above; absence has already failed.
        let missing = |field: &str| LcoeError::InvalidInput {
            field: field.into(),
            reason: "is required".into(),
        };
        Ok(ProjectAssumptions {
            capacity_mw: capacity_mw.ok_or_else(|| missing("capacity_mw"))?,
            capacity_factor: capacity_factor.ok_or_else(|| missing("capacity_factor"))?,
            capital_expenditure_per_kw: capex
                .ok_or_else(|| missing("capital_expenditure_per_kw"))?,
            o_m_cost_pct_of_capital_cost: o_m
                .ok_or_else(|| missing("o_m_cost_pct_of_capital_cost"))?,
            debt_pct_of_capital_cost: debt_pct,
            equity_pct_of_capital_cost: equity_pct,
            cost_of_debt: cost_of_debt.ok_or_else(|| missing("cost_of_debt"))?,
            cost_of_equity: cost_of_equity.ok_or_else(|| missing("cost_of_equity"))?,
            tax_rate: tax_rate.ok_or_else(|| missing("tax_rate"))?,
            project_lifetime_years: lifetime.ok_or_else(|| missing("project_lifetime_years"))?,
            loan_tenor_years: loan_tenor.ok_or_else(|| missing("loan_tenor_years"))?,
            degradation_rate: degradation,
            dscr,
            targeting_dscr,
        })
    }

    /// Replace one numeric field by name. Used by sensitivity sweeps.
    pub fn with_override(&self, field: &str, value: Decimal) -> LcoeResult<RawAssumptions> {
        let mut out = self.clone();
        let years = || -> LcoeResult<u32> {
            if !value.fract().is_zero() {
                return Err(LcoeError::InvalidInput {
                    field: field.into(),
                    reason: format!("must be a whole number of years, got {value}"),
                });
            }
            value.to_u32().ok_or_else(|| LcoeError::InvalidInput {
                field: field.into(),
                reason: format!("{value} is not a valid year count"),
            })
        };

        match field {
            "capacity_mw" => out.capacity_mw = Some(value),
            "capacity_factor" => out.capacity_factor = Some(value),
            "capital_expenditure_per_kw" => out.capital_expenditure_per_kw = Some(value),
            "o_m_cost_pct_of_capital_cost" => out.o_m_cost_pct_of_capital_cost = Some(value),
            "debt_pct_of_capital_cost" => {
                out.debt_pct_of_capital_cost = Some(value);
                out.equity_pct_of_capital_cost = Some(Decimal::ONE - value);
            }
            "equity_pct_of_capital_cost" => {
                out.equity_pct_of_capital_cost = Some(value);
                out.debt_pct_of_capital_cost = Some(Decimal::ONE - value);
            }
            "cost_of_debt" => out.cost_of_debt = Some(value),
            "cost_of_equity" => out.cost_of_equity = Some(value),
            "tax_rate" => out.tax_rate = Some(value),
            "degradation_rate" => out.degradation_rate = Some(value),
            "dscr" => out.dscr = Some(value),
            "project_lifetime_years" => out.project_lifetime_years = Some(years()?),
            "loan_tenor_years" => out.loan_tenor_years = Some(years()?),
            other => {
                return Err(LcoeError::InvalidInput {
                    field: other.into(),
                    reason: "not a numeric assumption".into(),
                })
            }
        }
        Ok(out)
    }
}

impl From<&ProjectAssumptions> for RawAssumptions {
    fn from(a: &ProjectAssumptions) -> Self {
        RawAssumptions {
            capacity_mw: Some(a.capacity_mw),
            capacity_factor: Some(a.capacity_factor),
            capital_expenditure_per_kw: Some(a.capital_expenditure_per_kw),
            o_m_cost_pct_of_capital_cost: Some(a.o_m_cost_pct_of_capital_cost),
            debt_pct_of_capital_cost: a.debt_pct_of_capital_cost,
            equity_pct_of_capital_cost: a.equity_pct_of_capital_cost,
            cost_of_debt: Some(a.cost_of_debt),
            cost_of_equity: Some(a.cost_of_equity),
            tax_rate: Some(a.tax_rate),
            project_lifetime_years: Some(a.project_lifetime_years),
            loan_tenor_years: Some(a.loan_tenor_years),
            degradation_rate: Some(a.degradation_rate),
            dscr: a.dscr,
            targeting_dscr: Some(a.targeting_dscr),
        }
    }
}

// ---------------------------------------------------------------------------
// Validated assumptions
// ---------------------------------------------------------------------------

/// Technical and financial assumptions for a single solar PV project.
///
/// Built by [`RawAssumptions::validate`]. Fields the engine solves for
/// (debt/equity split in DSCR mode, DSCR in manual mode) are `None` on input
/// and filled in on the adjusted copy returned with each simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectAssumptions {
    /// Nameplate capacity (MW)
    pub capacity_mw: Decimal,
    /// Year-1 capacity factor (decimal, e.g. 0.10 = 10%)
    pub capacity_factor: Rate,
    /// Capital expenditure per kW of capacity
    pub capital_expenditure_per_kw: Money,
    /// Annual O&M cost as a fraction of capital cost
    pub o_m_cost_pct_of_capital_cost: Rate,
    /// Debt as a fraction of capital cost
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debt_pct_of_capital_cost: Option<Rate>,
    /// Equity as a fraction of capital cost
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity_pct_of_capital_cost: Option<Rate>,
    /// Pre-tax cost of debt
    pub cost_of_debt: Rate,
    /// Required post-tax return on equity
    pub cost_of_equity: Rate,
    /// Corporate tax rate
    pub tax_rate: Rate,
    pub project_lifetime_years: u32,
    pub loan_tenor_years: u32,
    /// Annual fractional loss of generation
    #[serde(default)]
    pub degradation_rate: Rate,
    /// Target DSCR (DSCR mode) or computed minimum DSCR (manual mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dscr: Option<Decimal>,
    #[serde(default)]
    pub targeting_dscr: bool,
}

/// How the initial debt principal is determined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebtSizing {
    /// Size debt so each period's debt service equals CFADS / dscr
    TargetDscr { dscr: Decimal },
    /// Debt is this fraction of capital cost
    ManualSplit { debt_pct: Rate, equity_pct: Rate },
}

impl DebtSizing {
    pub fn mode(&self) -> FinancingMode {
        match self {
            DebtSizing::TargetDscr { .. } => FinancingMode::TargetDscr,
            DebtSizing::ManualSplit { .. } => FinancingMode::ManualSplit,
        }
    }
}

impl ProjectAssumptions {
    /// Re-check every invariant on an already-typed value.
    pub fn validate(&self) -> LcoeResult<()> {
        RawAssumptions::from(self).validate().map(|_| ())
    }

    /// capacity (MW) x capex (per kW) x 1000 kW/MW
    pub fn capital_cost(&self) -> Money {
        self.capacity_mw * self.capital_expenditure_per_kw * dec!(1000)
    }

    pub fn financing_mode(&self) -> FinancingMode {
        if self.targeting_dscr {
            FinancingMode::TargetDscr
        } else {
            FinancingMode::ManualSplit
        }
    }

    /// The single input that drives debt sizing for this run.
    pub fn debt_sizing(&self) -> LcoeResult<DebtSizing> {
        if self.targeting_dscr {
            let dscr = self.dscr.ok_or_else(|| LcoeError::InvalidInput {
                field: "dscr".into(),
                reason: "required when targeting a DSCR".into(),
            })?;
            Ok(DebtSizing::TargetDscr { dscr })
        } else {
            match (self.debt_pct_of_capital_cost, self.equity_pct_of_capital_cost) {
                (Some(debt_pct), Some(equity_pct)) => Ok(DebtSizing::ManualSplit {
                    debt_pct,
                    equity_pct,
                }),
                _ => Err(LcoeError::InvalidInput {
                    field: "debt_pct_of_capital_cost".into(),
                    reason: "debt and equity fractions are required for a manual split".into(),
                }),
            }
        }
    }

    /// debt x Kd + equity x Ke, once the split is known
    pub fn wacc(&self) -> Option<Rate> {
        let (debt, equity) = self.split()?;
        Some(debt * self.cost_of_debt + equity * self.cost_of_equity)
    }

    /// debt x Kd x (1 - t) + equity x Ke, once the split is known
    pub fn tax_adjusted_wacc(&self) -> Option<Rate> {
        let (debt, equity) = self.split()?;
        Some(debt * self.cost_of_debt * (Decimal::ONE - self.tax_rate) + equity * self.cost_of_equity)
    }

    /// Copy with the solved financing fields back-filled.
    pub fn adjusted(&self, debt_pct: Rate, dscr: Option<Decimal>) -> ProjectAssumptions {
        ProjectAssumptions {
            debt_pct_of_capital_cost: Some(debt_pct),
            equity_pct_of_capital_cost: Some(Decimal::ONE - debt_pct),
            dscr,
            ..self.clone()
        }
    }

    fn split(&self) -> Option<(Rate, Rate)> {
        let debt = self.debt_pct_of_capital_cost?;
        let equity = self
            .equity_pct_of_capital_cost
            .unwrap_or(Decimal::ONE - debt);
        Some((debt, equity))
    }
}
