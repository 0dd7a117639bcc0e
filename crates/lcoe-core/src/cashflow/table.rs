use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Column names in export order. Part of the external interface.
pub const COLUMNS: [&str; 19] = [
    "Period",
    "Capacity_MW",
    "Capacity_Factor",
    "Tariff_per_MWh",
    "Total_Generation_MWh",
    "Total_Revenues",
    "O&M_Costs",
    "Total_Operating_Costs",
    "EBITDA",
    "CFADS",
    "Debt_Outstanding_EoP",
    "Debt_Outstanding_BoP",
    "Interest_Expense",
    "Amortization",
    "Target_Debt_Service",
    "Depreciation",
    "Taxable_Income",
    "Tax_Liability",
    "Post_Tax_Net_Equity_Cashflow",
];

/// One period of the project cashflow. Period 0 is financial close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowRow {
    #[serde(rename = "Period")]
    pub period: u32,
    #[serde(rename = "Capacity_MW")]
    pub capacity_mw: Decimal,
    /// Degraded capacity factor for the period
    #[serde(rename = "Capacity_Factor")]
    pub capacity_factor: Decimal,
    #[serde(rename = "Tariff_per_MWh")]
    pub tariff_per_mwh: Money,
    #[serde(rename = "Total_Generation_MWh")]
    pub total_generation_mwh: Decimal,
    #[serde(rename = "Total_Revenues")]
    pub total_revenues: Money,
    #[serde(rename = "O&M_Costs")]
    pub o_m_costs: Money,
    #[serde(rename = "Total_Operating_Costs")]
    pub total_operating_costs: Money,
    #[serde(rename = "EBITDA")]
    pub ebitda: Money,
    /// Cash flow available for debt service
    #[serde(rename = "CFADS")]
    pub cfads: Money,
    #[serde(rename = "Debt_Outstanding_EoP")]
    pub debt_outstanding_eop: Money,
    #[serde(rename = "Debt_Outstanding_BoP")]
    pub debt_outstanding_bop: Money,
    #[serde(rename = "Interest_Expense")]
    pub interest_expense: Money,
    #[serde(rename = "Amortization")]
    pub amortization: Money,
    #[serde(rename = "Target_Debt_Service")]
    pub target_debt_service: Money,
    #[serde(rename = "Depreciation")]
    pub depreciation: Money,
    #[serde(rename = "Taxable_Income")]
    pub taxable_income: Money,
    #[serde(rename = "Tax_Liability")]
    pub tax_liability: Money,
    #[serde(rename = "Post_Tax_Net_Equity_Cashflow")]
    pub post_tax_net_equity_cashflow: Money,
}

impl CashflowRow {
    /// Cell values in [`COLUMNS`] order.
    pub fn values(&self) -> [Decimal; 19] {
        [
            Decimal::from(self.period),
            self.capacity_mw,
            self.capacity_factor,
            self.tariff_per_mwh,
            self.total_generation_mwh,
            self.total_revenues,
            self.o_m_costs,
            self.total_operating_costs,
            self.ebitda,
            self.cfads,
            self.debt_outstanding_eop,
            self.debt_outstanding_bop,
            self.interest_expense,
            self.amortization,
            self.target_debt_service,
            self.depreciation,
            self.taxable_income,
            self.tax_liability,
            self.post_tax_net_equity_cashflow,
        ]
    }

    /// Debt service coverage for the period, `None` when no debt is serviced.
    pub fn dscr(&self) -> Option<Decimal> {
        if self.target_debt_service.is_zero() {
            None
        } else {
            Some(self.ebitda / self.target_debt_service)
        }
    }
}

/// Ordered rows for periods `0..=lifetime`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CashflowTable {
    rows: Vec<CashflowRow>,
}

impl CashflowTable {
    pub fn from_rows(rows: Vec<CashflowRow>) -> Self {
        CashflowTable { rows }
    }

    pub fn rows(&self) -> &[CashflowRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn period(&self, period: u32) -> Option<&CashflowRow> {
        self.rows.get(period as usize)
    }

    /// The post-tax equity cashflow series the IRR is computed on.
    pub fn equity_cashflows(&self) -> Vec<Money> {
        self.rows
            .iter()
            .map(|r| r.post_tax_net_equity_cashflow)
            .collect()
    }

    /// All values of one column by its exported name.
    pub fn column(&self, name: &str) -> Option<Vec<Decimal>> {
        let idx = COLUMNS.iter().position(|c| *c == name)?;
        Some(self.rows.iter().map(|r| r.values()[idx]).collect())
    }

    /// Lowest period DSCR across periods that carry debt service.
    pub fn min_dscr(&self) -> Option<Decimal> {
        self.rows.iter().filter_map(CashflowRow::dscr).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(period: u32, ebitda: Decimal, service: Decimal) -> CashflowRow {
        CashflowRow {
            period,
            capacity_mw: dec!(10),
            capacity_factor: dec!(0.2),
            tariff_per_mwh: dec!(50),
            total_generation_mwh: dec!(17520),
            total_revenues: dec!(876000),
            o_m_costs: dec!(100000),
            total_operating_costs: dec!(100000),
            ebitda,
            cfads: ebitda,
            debt_outstanding_eop: Decimal::ZERO,
            debt_outstanding_bop: Decimal::ZERO,
            interest_expense: Decimal::ZERO,
            amortization: service,
            target_debt_service: service,
            depreciation: Decimal::ZERO,
            taxable_income: ebitda,
            tax_liability: Decimal::ZERO,
            post_tax_net_equity_cashflow: ebitda - service,
        }
    }

    #[test]
    fn test_rows_serialize_with_column_names() {
        let json = serde_json::to_value(row(1, dec!(500), dec!(250))).unwrap();
        let keys: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        for column in COLUMNS {
            assert!(keys.contains(&column), "missing column {column}");
        }
        assert_eq!(keys.len(), COLUMNS.len());
    }

    #[test]
    fn test_min_dscr_skips_periods_without_service() {
        let table = CashflowTable::from_rows(vec![
            row(0, Decimal::ZERO, Decimal::ZERO),
            row(1, dec!(500), dec!(250)),
            row(2, dec!(300), dec!(250)),
            row(3, dec!(300), Decimal::ZERO),
        ]);
        assert_eq!(table.min_dscr(), Some(dec!(1.2)));
    }

    #[test]
    fn test_column_lookup() {
        let table = CashflowTable::from_rows(vec![row(0, dec!(1), dec!(0)), row(1, dec!(2), dec!(1))]);
        assert_eq!(table.column("Period"), Some(vec![dec!(0), dec!(1)]));
        assert_eq!(table.column("EBITDA"), Some(vec![dec!(1), dec!(2)]));
        assert_eq!(table.column("Nope"), None);
    }
}
