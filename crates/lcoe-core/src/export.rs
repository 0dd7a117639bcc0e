use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cashflow::{CashflowTable, COLUMNS};

/// Header of the first column in the transposed layout.
pub const TRANSPOSED_LABEL: &str = "Column";

/// A rectangular text grid ready for table or CSV rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularExport {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Round to `sig_figs` significant figures and drop trailing zeros.
/// `None` leaves the value untouched.
pub fn format_significant(value: Decimal, sig_figs: Option<u32>) -> Decimal {
    match sig_figs {
        Some(digits) if digits > 0 => value.round_sf(digits).unwrap_or(value).normalize(),
        _ => value.normalize(),
    }
}

fn cell(column: &str, value: Decimal, sig_figs: Option<u32>) -> String {
    // Period is an index, never rounded
    if column == COLUMNS[0] {
        value.normalize().to_string()
    } else {
        format_significant(value, sig_figs).to_string()
    }
}

/// One row per period, columns in contract order.
pub fn row_major(table: &CashflowTable, sig_figs: Option<u32>) -> TabularExport {
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            COLUMNS
                .iter()
                .zip(row.values())
                .map(|(column, value)| cell(column, value, sig_figs))
                .collect()
        })
        .collect();

    TabularExport {
        headers: COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

/// One row per column, one column per period: `Column, 0, 1, .., N`.
pub fn transposed(table: &CashflowTable, sig_figs: Option<u32>) -> TabularExport {
    let mut headers = Vec::with_capacity(table.len() + 1);
    headers.push(TRANSPOSED_LABEL.to_string());
    headers.extend(table.rows().iter().map(|r| r.period.to_string()));

    let values: Vec<[Decimal; 19]> = table.rows().iter().map(|r| r.values()).collect();
    let rows = COLUMNS
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let mut line = Vec::with_capacity(values.len() + 1);
            line.push(column.to_string());
            line.extend(values.iter().map(|v| cell(column, v[idx], sig_figs)));
            line
        })
        .collect();

    TabularExport { headers, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::RawAssumptions;
    use crate::cashflow::{simulate, IrrHandling};
    use rust_decimal_macros::dec;

    fn table() -> CashflowTable {
        let a = RawAssumptions {
            capacity_mw: Some(dec!(10)),
            capacity_factor: Some(dec!(0.2)),
            capital_expenditure_per_kw: Some(dec!(800)),
            o_m_cost_pct_of_capital_cost: Some(dec!(0.015)),
            debt_pct_of_capital_cost: Some(dec!(0.7)),
            equity_pct_of_capital_cost: Some(dec!(0.3)),
            cost_of_debt: Some(dec!(0.06)),
            cost_of_equity: Some(dec!(0.12)),
            tax_rate: Some(dec!(0.25)),
            project_lifetime_years: Some(6),
            ..Default::default()
        }
        .validate()
        .unwrap();
        simulate(&a, dec!(90), IrrHandling::Lenient).unwrap().table
    }

    #[test]
    fn test_significant_figures() {
        assert_eq!(format_significant(dec!(123456.789), Some(3)), dec!(123000));
        assert_eq!(format_significant(dec!(0.0012345), Some(2)), dec!(0.0012));
        assert_eq!(format_significant(dec!(1.50), None).to_string(), "1.5");
    }

    #[test]
    fn test_row_major_shape() {
        let out = row_major(&table(), Some(5));
        assert_eq!(out.headers.len(), 19);
        assert_eq!(out.headers[0], "Period");
        assert_eq!(out.rows.len(), 7);
        assert!(out.rows.iter().all(|r| r.len() == 19));
        assert_eq!(out.rows[6][0], "6");
    }

    #[test]
    fn test_transposed_shape() {
        let out = transposed(&table(), None);
        assert_eq!(out.headers, vec!["Column", "0", "1", "2", "3", "4", "5", "6"]);
        assert_eq!(out.rows.len(), 19);
        assert_eq!(out.rows[0][0], "Period");
        assert_eq!(out.rows[18][0], "Post_Tax_Net_Equity_Cashflow");
        // Generation: 10 MW x 0.2 x 8760 h
        assert_eq!(out.rows[4][2], "17520");
    }
}
