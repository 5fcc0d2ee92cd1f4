use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

/// Field name to value, as found in the provider's JSON objects
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A loosely typed JSON value from the provider response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<FieldValue>),
    Object(FieldMap),
}

impl FieldValue {
    /// Look up a key when this value is an object
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        match self {
            FieldValue::Object(map) => map.get(key),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    /// Render the value the way the host's templating runtime stringifies it:
    /// integral floats drop their fractional part, lists are comma-joined with
    /// nulls left blank, objects render as compact JSON.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => f.write_str(&format_number(n)),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !matches!(item, FieldValue::Null) {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            FieldValue::Object(map) => {
                let json = serde_json::to_string(map).map_err(|_| std::fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

/// Format a number the way the host's templating runtime prints it.
///
/// Integral values drop the fraction (`20.0` -> `20`). Values below `1e-6` or
/// at least `1e21` switch to exponent form (`1e-7`, `1.5e+21`).
pub fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(v) if v == 0.0 => "0".to_string(),
        Some(v) if v.is_finite() => format_float(v),
        _ => n.to_string(),
    }
}

fn format_float(v: f64) -> String {
    let sign = if v < 0.0 { "-" } else { "" };

    // `{:e}` yields the shortest round-trip digits, e.g. "1.2345e3".
    let sci = format!("{:e}", v.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    // Position of the decimal point relative to the digit string
    let point = exp + 1;

    let body = if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{}.{}", int, frac)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let exp_sign = if point - 1 < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", first, exp_sign, (point - 1).abs())
        } else {
            format!("{}.{}e{}{}", first, rest, exp_sign, (point - 1).abs())
        }
    };

    format!("{}{}", sign, body)
}

/// Body of a `current.json` response.
///
/// Only `location` and `current` are required; any other top-level keys are
/// kept so the cached payload matches what the provider sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub location: FieldMap,
    pub current: FieldMap,
    #[serde(flatten)]
    pub extra: FieldMap,
}

impl WeatherResponse {
    /// Parse and validate a response body.
    pub fn parse(body: &str) -> Result<Self, WeatherError> {
        let response: WeatherResponse = serde_json::from_str(body)
            .map_err(|e| WeatherError::MalformedResponse(e.to_string()))?;
        response.validate()?;
        Ok(response)
    }

    /// Check the parts macro derivation relies on.
    pub fn validate(&self) -> Result<(), WeatherError> {
        if self.current.is_empty() {
            return Err(WeatherError::MalformedResponse(
                "`current` is empty".to_string(),
            ));
        }
        if self.location.is_empty() {
            return Err(WeatherError::MalformedResponse(
                "`location` is empty".to_string(),
            ));
        }
        if self.condition_text().is_none() {
            return Err(WeatherError::MalformedResponse(
                "`current.condition.text` is missing".to_string(),
            ));
        }
        Ok(())
    }

    /// `current.condition.text`
    pub fn condition_text(&self) -> Option<&FieldValue> {
        self.current.get("condition").and_then(|c| c.get("text"))
    }

    /// A `current` field rendered as text, empty when absent
    pub fn current_field(&self, key: &str) -> String {
        self.current.get(key).map(ToString::to_string).unwrap_or_default()
    }

    /// A `location` field rendered as text, empty when absent
    pub fn location_field(&self, key: &str) -> String {
        self.location.get(key).map(ToString::to_string).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(v: serde_json::Value) -> FieldValue {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(value(json!(20)).to_string(), "20");
        assert_eq!(value(json!(20.0)).to_string(), "20");
        assert_eq!(value(json!(20.5)).to_string(), "20.5");
        assert_eq!(value(json!(-3.2)).to_string(), "-3.2");
        assert_eq!(value(json!(-0.0)).to_string(), "0");
        assert_eq!(value(json!(1_700_000_000u64)).to_string(), "1700000000");
    }

    #[test]
    fn test_extreme_numbers_use_exponent_form() {
        assert_eq!(value(json!(1e-7)).to_string(), "1e-7");
        assert_eq!(value(json!(1.5e-10)).to_string(), "1.5e-10");
        assert_eq!(value(json!(0.000001)).to_string(), "0.000001");
        assert_eq!(value(json!(0.0125)).to_string(), "0.0125");
        assert_eq!(value(json!(1e21)).to_string(), "1e+21");
        assert_eq!(value(json!(-2.5e22)).to_string(), "-2.5e+22");
        assert_eq!(value(json!(1e20)).to_string(), "100000000000000000000");
        assert_eq!(value(json!(1013.25)).to_string(), "1013.25");
    }

    #[test]
    fn test_scalar_formatting() {
        assert_eq!(value(json!(true)).to_string(), "true");
        assert_eq!(value(json!(false)).to_string(), "false");
        assert_eq!(value(json!(null)).to_string(), "null");
        assert_eq!(value(json!("Partly cloudy")).to_string(), "Partly cloudy");
    }

    #[test]
    fn test_composite_formatting() {
        assert_eq!(value(json!([1, null, "a"])).to_string(), "1,,a");
        assert_eq!(value(json!({"b": 1, "a": "x"})).to_string(), r#"{"a":"x","b":1}"#);
    }

    #[test]
    fn test_parse_keeps_extra_fields() {
        let body = json!({
            "location": {"name": "Paris", "region": "Ile-de-France"},
            "current": {"temp_c": 20, "condition": {"text": "Clear", "code": 1000}},
            "alerts": {"alert": []}
        })
        .to_string();

        let response = WeatherResponse::parse(&body).unwrap();
        assert_eq!(response.location_field("name"), "Paris");
        assert_eq!(response.current_field("temp_c"), "20");
        assert!(response.extra.contains_key("alerts"));

        let round_trip = serde_json::to_value(&response).unwrap();
        assert_eq!(round_trip["alerts"], json!({"alert": []}));
        assert_eq!(round_trip["current"]["condition"]["code"], json!(1000));
    }

    #[test]
    fn test_parse_missing_current() {
        let body = json!({"location": {"name": "Paris"}}).to_string();
        let err = WeatherResponse::parse(&body).unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse(msg) if msg.contains("current")));
    }

    #[test]
    fn test_parse_missing_condition_text() {
        let body = json!({
            "location": {"name": "Paris"},
            "current": {"temp_c": 20, "condition": {"code": 1000}}
        })
        .to_string();
        assert!(matches!(
            WeatherResponse::parse(&body),
            Err(WeatherError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_object_sections() {
        let body = json!({"location": "Paris", "current": {}}).to_string();
        assert!(WeatherResponse::parse(&body).is_err());
        assert!(WeatherResponse::parse("not json").is_err());
    }
}
