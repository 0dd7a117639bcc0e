use napi::Result as NapiResult;
use napi_derive::napi;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// LCOE
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_lcoe(input_json: String) -> NapiResult<String> {
    let input: lcoe_core::engine::LcoeInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = lcoe_core::engine::calculate_lcoe(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn model_cashflow(input_json: String) -> NapiResult<String> {
    let input: lcoe_core::engine::CashflowInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = lcoe_core::engine::model_cashflow(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Sensitivity
// ---------------------------------------------------------------------------

#[napi]
pub fn lcoe_sensitivity(input_json: String) -> NapiResult<String> {
    let input: lcoe_core::sensitivity::LcoeSensitivityInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = lcoe_core::sensitivity::lcoe_sensitivity(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
