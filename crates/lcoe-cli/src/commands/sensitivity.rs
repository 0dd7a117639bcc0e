use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use lcoe_core::sensitivity::{self, LcoeSensitivityInput};
use lcoe_core::types::SensitivityVariable;

use crate::commands::lcoe::{build_request, AssumptionArgs, SolverArgs};

/// Arguments for a one-way LCOE sensitivity sweep
#[derive(Args)]
pub struct SensitivityArgs {
    /// Assumption to sweep in format name:min:max:step
    /// (e.g. "capacity_factor:0.10:0.25:0.05")
    #[arg(long)]
    pub var: String,

    #[command(flatten)]
    pub assumptions: AssumptionArgs,

    #[command(flatten)]
    pub solver: SolverArgs,
}

fn parse_sens_var(arg: &str) -> Result<SensitivityVariable, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = arg.split(':').collect();
    if parts.len() != 4 {
        return Err(format!(
            "Sensitivity variable must be name:min:max:step, got '{}'",
            arg
        )
        .into());
    }
    let number = |s: &str| -> Result<Decimal, Box<dyn std::error::Error>> {
        s.trim()
            .parse::<Decimal>()
            .map_err(|e| format!("'{}' in '{}': {}", s, arg, e).into())
    };
    Ok(SensitivityVariable {
        name: parts[0].trim().to_string(),
        min: number(parts[1])?,
        max: number(parts[2])?,
        step: number(parts[3])?,
    })
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let variable = parse_sens_var(&args.var)?;
    let mut request = build_request(&args.assumptions, &args.solver)?;
    request.insert("variable".into(), serde_json::to_value(&variable)?);

    let sens_input: LcoeSensitivityInput = serde_json::from_value(Value::Object(request))?;
    let result = sensitivity::lcoe_sensitivity(&sens_input)?;
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_sens_var() {
        let v = parse_sens_var("capacity_factor:0.1:0.2:0.05").unwrap();
        assert_eq!(v.name, "capacity_factor");
        assert_eq!(v.min, dec!(0.1));
        assert_eq!(v.max, dec!(0.2));
        assert_eq!(v.step, dec!(0.05));
    }

    #[test]
    fn test_parse_sens_var_rejects_bad_shape() {
        assert!(parse_sens_var("capacity_factor:0.1:0.2").is_err());
        assert!(parse_sens_var("capacity_factor:a:0.2:0.1").is_err());
    }
}
