use serde_json::Value;
use std::io::{self, Read};

/// Read a piped LCOE or cashflow request.
///
/// The payload is either a full request (`assumptions`, optional `solver`,
/// `tariff`, `irr_handling`) or a bare assumptions object, which
/// `build_request` wraps. JSON is tried first, then YAML. Returns `None`
/// when stdin is a terminal or the pipe is empty.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_request(&buffer)
}

fn parse_request(text: &str) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(Some(value)),
        Err(json_err) => serde_yaml::from_str::<Value>(trimmed)
            .map(Some)
            .map_err(|yaml_err| {
                format!("stdin is neither JSON ({json_err}) nor YAML ({yaml_err})").into()
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_request() {
        let value = parse_request(r#"{"assumptions": {"capacity_mw": 30}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(value["assumptions"]["capacity_mw"], 30);
    }

    #[test]
    fn test_yaml_request() {
        let value = parse_request("capacity_mw: 30\ntargeting_dscr: true\n")
            .unwrap()
            .unwrap();
        assert_eq!(value["capacity_mw"], 30);
        assert_eq!(value["targeting_dscr"], true);
    }

    #[test]
    fn test_blank_pipe_is_no_request() {
        assert!(parse_request("  \n").unwrap().is_none());
    }

    #[test]
    fn test_malformed_request_rejected() {
        assert!(parse_request("{\"capacity_mw\": ").is_err());
    }
}
