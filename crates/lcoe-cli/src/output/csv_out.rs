use serde_json::Value;
use std::io;

use super::{cashflow_export, result_object, RenderOptions};

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout.
///
/// A cashflow result is written as the cashflow grid alone; sensitivity
/// results as one line per point; anything else as field/value pairs.
pub fn print_csv(value: &Value, options: &RenderOptions) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match result_object(value) {
        Some(result) => {
            if let Some(grid) = cashflow_export(result, options.sig_figs, options.transpose) {
                let _ = wtr.write_record(&grid.headers);
                for row in &grid.rows {
                    let _ = wtr.write_record(row);
                }
            } else if let Some(Value::Array(points)) = result.get("points") {
                write_array_csv(&mut wtr, points);
            } else {
                write_fields(&mut wtr, result);
            }
        }
        None => match value {
            Value::Object(map) => write_fields(&mut wtr, map),
            Value::Array(arr) => write_array_csv(&mut wtr, arr),
            _ => {
                let _ = wtr.write_record([&format_csv_value(value)]);
            }
        },
    }

    let _ = wtr.flush();
}

fn write_fields(wtr: &mut StdoutWriter<'_>, map: &serde_json::Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in map {
        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
    }
}

fn write_array_csv(wtr: &mut StdoutWriter<'_>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
