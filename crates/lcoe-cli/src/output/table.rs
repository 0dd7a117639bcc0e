use serde_json::Value;
use tabled::{builder::Builder, Table};

use lcoe_core::export::TabularExport;

use super::{cashflow_export, result_object, RenderOptions};

/// Members of a result printed as their own tables rather than as fields.
const TABULAR_KEYS: [&str; 2] = ["cashflow", "points"];

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value, options: &RenderOptions) {
    let Some(result) = result_object(value) else {
        match value {
            Value::Object(_) => print_flat_object(value),
            Value::Array(arr) => print_array_table(arr),
            _ => println!("{}", value),
        }
        return;
    };

    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in result {
        if !TABULAR_KEYS.contains(&key.as_str()) {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
    }
    println!("{}", Table::from(builder));

    if let Some(grid) = cashflow_export(result, options.sig_figs, options.transpose) {
        println!("\nCashflow:");
        print_grid(&grid);
    }

    if let Some(Value::Array(points)) = result.get("points") {
        println!("\nSensitivity:");
        print_array_table(points);
    }

    if let Some(Value::Array(warnings)) = value.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = value.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_grid(grid: &TabularExport) {
    let mut builder = Builder::default();
    builder.push_record(&grid.headers);
    for row in &grid.rows {
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}

fn print_flat_object(value: &Value) {
    if let Value::Object(map) = value {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in map {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("{}", Table::from(builder));
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
