pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use lcoe_core::cashflow::CashflowTable;
use lcoe_core::export::{self, TabularExport};
use serde_json::Value;

use crate::OutputFormat;

/// How cashflow tables are laid out and rounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Periods as columns instead of rows
    pub transpose: bool,
    /// Significant figures for table and CSV cells; `None` prints raw values
    pub sig_figs: Option<u32>,
}

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value, options: &RenderOptions) {
    match format {
        OutputFormat::Json => json::print_json(value, options),
        OutputFormat::Table => table::print_table(value, options),
        OutputFormat::Csv => csv_out::print_csv(value, options),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// The `result` object of a computation envelope, if there is one.
fn result_object(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    value.get("result").and_then(Value::as_object)
}

/// Lay out the `cashflow` member of a result, if present.
fn cashflow_export(
    result: &serde_json::Map<String, Value>,
    sig_figs: Option<u32>,
    transpose: bool,
) -> Option<TabularExport> {
    let table: CashflowTable = serde_json::from_value(result.get("cashflow")?.clone()).ok()?;
    Some(if transpose {
        export::transposed(&table, sig_figs)
    } else {
        export::row_major(&table, sig_figs)
    })
}
