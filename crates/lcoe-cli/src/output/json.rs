use serde_json::Value;

use super::{cashflow_export, RenderOptions};

/// Pretty-print JSON to stdout. Values are never rounded; `--transpose`
/// replaces the cashflow rows with the column-per-period layout.
pub fn print_json(value: &Value, options: &RenderOptions) {
    let mut value = value.clone();
    if options.transpose {
        let transposed = value
            .get("result")
            .and_then(Value::as_object)
            .and_then(|result| cashflow_export(result, None, true));
        if let (Some(grid), Some(result)) = (
            transposed,
            value.get_mut("result").and_then(Value::as_object_mut),
        ) {
            match serde_json::to_value(grid) {
                Ok(grid) => {
                    result.insert("cashflow".into(), grid);
                }
                Err(e) => eprintln!("JSON serialization error: {}", e),
            }
        }
    }

    match serde_json::to_string_pretty(&value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}
