use clap::Args;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use lcoe_core::engine::{self, CashflowInput, LcoeInput};

use crate::input;

/// Project assumptions. Flags override the same fields read from `--input`
/// or piped stdin.
#[derive(Args, Debug, Default)]
#[command(allow_hyphen_values = true)]
pub struct AssumptionArgs {
    /// Path to a JSON or YAML request file
    #[arg(long)]
    pub input: Option<String>,

    /// Nameplate capacity in MW
    #[arg(long)]
    pub capacity_mw: Option<Decimal>,

    /// Year-1 capacity factor (e.g. 0.18)
    #[arg(long)]
    pub capacity_factor: Option<Decimal>,

    /// Capital expenditure per kW
    #[arg(long, alias = "capex")]
    pub capex_per_kw: Option<Decimal>,

    /// Annual O&M cost as a fraction of capital cost
    #[arg(long)]
    pub o_m_pct: Option<Decimal>,

    /// Debt fraction of capital cost (manual split)
    #[arg(long)]
    pub debt_pct: Option<Decimal>,

    /// Equity fraction of capital cost (manual split)
    #[arg(long)]
    pub equity_pct: Option<Decimal>,

    /// Pre-tax cost of debt
    #[arg(long)]
    pub cost_of_debt: Option<Decimal>,

    /// Required return on equity
    #[arg(long)]
    pub cost_of_equity: Option<Decimal>,

    /// Corporate tax rate
    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Project lifetime in years
    #[arg(long)]
    pub lifetime: Option<u32>,

    /// Loan tenor in years (defaults to the lifetime)
    #[arg(long)]
    pub tenor: Option<u32>,

    /// Annual generation degradation (e.g. 0.005)
    #[arg(long)]
    pub degradation: Option<Decimal>,

    /// Target DSCR when sizing debt to coverage
    #[arg(long)]
    pub dscr: Option<Decimal>,

    /// Size debt to the DSCR target (true) or use the debt/equity split (false)
    #[arg(long)]
    pub targeting_dscr: Option<bool>,
}

impl AssumptionArgs {
    fn overrides(&self) -> Vec<(&'static str, Value)> {
        let decimals = [
            ("capacity_mw", self.capacity_mw),
            ("capacity_factor", self.capacity_factor),
            ("capital_expenditure_per_kw", self.capex_per_kw),
            ("o_m_cost_pct_of_capital_cost", self.o_m_pct),
            ("debt_pct_of_capital_cost", self.debt_pct),
            ("equity_pct_of_capital_cost", self.equity_pct),
            ("cost_of_debt", self.cost_of_debt),
            ("cost_of_equity", self.cost_of_equity),
            ("tax_rate", self.tax_rate),
            ("degradation_rate", self.degradation),
            ("dscr", self.dscr),
        ];
        let years = [
            ("project_lifetime_years", self.lifetime),
            ("loan_tenor_years", self.tenor),
        ];

        let mut out: Vec<(&'static str, Value)> = decimals
            .into_iter()
            .filter_map(|(field, v)| v.map(|d| (field, Value::String(d.to_string()))))
            .collect();
        out.extend(
            years
                .into_iter()
                .filter_map(|(field, v)| v.map(|y| (field, Value::from(y)))),
        );
        if let Some(flag) = self.targeting_dscr {
            out.push(("targeting_dscr", Value::Bool(flag)));
        }
        out
    }
}

/// Solver tunables exposed on the command line.
#[derive(Args, Debug, Default)]
pub struct SolverArgs {
    /// First tariff the breakeven search tries
    #[arg(long)]
    pub initial_guess: Option<Decimal>,

    /// Cap on bracketing evaluations
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

/// Arguments for the breakeven LCOE solve
#[derive(Args)]
pub struct LcoeArgs {
    #[command(flatten)]
    pub assumptions: AssumptionArgs,

    #[command(flatten)]
    pub solver: SolverArgs,
}

/// Arguments for a cashflow run
#[derive(Args)]
pub struct CashflowArgs {
    #[command(flatten)]
    pub assumptions: AssumptionArgs,

    #[command(flatten)]
    pub solver: SolverArgs,

    /// Tariff per MWh; the breakeven tariff is used when omitted
    #[arg(long)]
    pub tariff: Option<Decimal>,

    /// Report a missing equity IRR as null instead of failing
    #[arg(long)]
    pub lenient: bool,
}

fn object_entry<'a>(
    request: &'a mut Map<String, Value>,
    key: &str,
) -> Result<&'a mut Map<String, Value>, Box<dyn std::error::Error>> {
    request
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| format!("'{}' must be an object", key).into())
}

/// Load the request from file or stdin and apply command-line overrides.
///
/// A bare assumptions object is accepted in place of a full request.
pub fn build_request(
    assumptions: &AssumptionArgs,
    solver: &SolverArgs,
) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    let loaded = if let Some(ref path) = assumptions.input {
        input::file::read_value(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        Value::Object(Map::new())
    };
    merge_request(loaded, assumptions, solver)
}

/// Flags win over loaded fields; untouched fields pass through.
fn merge_request(
    loaded: Value,
    assumptions: &AssumptionArgs,
    solver: &SolverArgs,
) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    let mut request = match loaded {
        Value::Object(map) if map.contains_key("assumptions") => map,
        Value::Object(map) => {
            let mut wrapped = Map::new();
            wrapped.insert("assumptions".into(), Value::Object(map));
            wrapped
        }
        _ => return Err("input must be a JSON or YAML object".into()),
    };

    let fields = object_entry(&mut request, "assumptions")?;
    for (field, value) in assumptions.overrides() {
        fields.insert(field.to_string(), value);
    }

    if solver.initial_guess.is_some() || solver.max_attempts.is_some() {
        let config = object_entry(&mut request, "solver")?;
        if let Some(guess) = solver.initial_guess {
            config.insert("initial_guess".into(), Value::String(guess.to_string()));
        }
        if let Some(attempts) = solver.max_attempts {
            config.insert("max_attempts".into(), Value::from(attempts));
        }
    }

    Ok(request)
}

pub fn run_lcoe(args: LcoeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = build_request(&args.assumptions, &args.solver)?;
    let lcoe_input: LcoeInput = serde_json::from_value(Value::Object(request))?;
    let result = engine::calculate_lcoe(&lcoe_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_cashflow(args: CashflowArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request = build_request(&args.assumptions, &args.solver)?;
    if let Some(tariff) = args.tariff {
        request.insert("tariff".into(), Value::String(tariff.to_string()));
    }
    if args.lenient {
        request.insert("irr_handling".into(), Value::String("lenient".into()));
    }

    let cashflow_input: CashflowInput = serde_json::from_value(Value::Object(request))?;
    let result = engine::model_cashflow(&cashflow_input)?;
    Ok(serde_json::to_value(result)?)
}
