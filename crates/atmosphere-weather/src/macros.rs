//! Flattening of a weather response into named text macros.

use std::collections::BTreeMap;

use crate::types::{FieldValue, WeatherResponse};

/// Prefix shared by every macro this extension exposes
pub const MACRO_PREFIX: &str = "atmo_";

/// A derived macro value and the response fields it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedMacro {
    pub value: String,
    pub source: String,
}

/// Macro name to derived value, one derivation cycle's worth
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroSet {
    entries: BTreeMap<String, DerivedMacro>,
}

impl MacroSet {
    fn insert(&mut self, name: String, value: String, source: String) {
        self.entries.insert(name, DerivedMacro { value, source });
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|m| m.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DerivedMacro)> {
        self.entries.iter().map(|(name, m)| (name.as_str(), m))
    }
}

/// `"It is currently 20°C and Clear in Paris, Ile-de-France."`
pub fn conditions_sentence(temperature: &str, unit: char, condition: &str, place: &str) -> String {
    format!("It is currently {temperature}°{unit} and {condition} in {place}.")
}

/// Derive every macro for `response`.
///
/// Expects a response that passed [`WeatherResponse::validate`]; missing
/// fields render as empty text.
pub fn derive_macros(response: &WeatherResponse) -> MacroSet {
    let mut macros = MacroSet::default();

    let place = format!(
        "{}, {}",
        response.location_field("name"),
        response.location_field("region")
    );
    let condition = response
        .condition_text()
        .map(ToString::to_string)
        .unwrap_or_default();

    macros.insert(
        format!("{MACRO_PREFIX}location"),
        place.clone(),
        "location.name + location.region".to_string(),
    );
    macros.insert(
        format!("{MACRO_PREFIX}conditionsf"),
        conditions_sentence(&response.current_field("temp_f"), 'F', &condition, &place),
        "current.temp_f + current.condition.text".to_string(),
    );
    macros.insert(
        format!("{MACRO_PREFIX}conditionsc"),
        conditions_sentence(&response.current_field("temp_c"), 'C', &condition, &place),
        "current.temp_c + current.condition.text".to_string(),
    );

    for (key, value) in &response.current {
        // Only the condition text is exposed; its code and icon are dropped.
        let (value, source) = match (key.as_str(), value) {
            ("condition", FieldValue::Object(_)) => {
                (condition.clone(), format!("current.{key}.text"))
            }
            _ => (value.to_string(), format!("current.{key}")),
        };
        macros.insert(format!("{MACRO_PREFIX}cond_{key}"), value, source);
    }

    for (key, value) in &response.location {
        macros.insert(
            format!("{MACRO_PREFIX}loc_{key}"),
            value.to_string(),
            format!("location.{key}"),
        );
    }

    macros
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> WeatherResponse {
        serde_json::from_value(value).unwrap()
    }

    fn paris() -> WeatherResponse {
        response(json!({
            "current": {"temp_c": 20, "temp_f": 68, "condition": {"text": "Clear"}},
            "location": {"name": "Paris", "region": "Ile-de-France"}
        }))
    }

    #[test]
    fn test_paris_scenario() {
        let macros = derive_macros(&paris());

        assert_eq!(macros.get("atmo_location"), Some("Paris, Ile-de-France"));
        assert_eq!(
            macros.get("atmo_conditionsc"),
            Some("It is currently 20°C and Clear in Paris, Ile-de-France.")
        );
        assert_eq!(
            macros.get("atmo_conditionsf"),
            Some("It is currently 68°F and Clear in Paris, Ile-de-France.")
        );
        assert_eq!(macros.get("atmo_cond_condition"), Some("Clear"));
        assert_eq!(macros.get("atmo_cond_temp_c"), Some("20"));
        assert_eq!(macros.get("atmo_cond_temp_f"), Some("68"));
        assert_eq!(macros.get("atmo_loc_name"), Some("Paris"));
        assert_eq!(macros.get("atmo_loc_region"), Some("Ile-de-France"));
        assert_eq!(macros.len(), 8);
    }

    #[test]
    fn test_condition_sub_fields_are_not_exposed() {
        let macros = derive_macros(&response(json!({
            "current": {
                "temp_c": 11.5,
                "temp_f": 52.7,
                "condition": {"text": "Light rain", "icon": "//cdn/296.png", "code": 1183}
            },
            "location": {"name": "Bergen", "region": "Hordaland"}
        })));

        assert_eq!(macros.get("atmo_cond_condition"), Some("Light rain"));
        assert!(macros.iter().all(|(_, m)| !m.value.contains("296.png")));
        assert!(!macros.contains("atmo_cond_condition_code"));
        assert_eq!(macros.get("atmo_cond_temp_c"), Some("11.5"));
    }

    #[test]
    fn test_every_field_is_forwarded() {
        let macros = derive_macros(&response(json!({
            "current": {
                "temp_c": 20.0,
                "temp_f": 68.0,
                "is_day": 1,
                "wind_dir": "WSW",
                "gust_kph": null,
                "condition": {"text": "Sunny"}
            },
            "location": {"name": "Nice", "region": "Provence", "lat": 43.7, "tz_id": "Europe/Paris"}
        })));

        assert_eq!(macros.get("atmo_cond_temp_c"), Some("20"));
        assert_eq!(macros.get("atmo_cond_is_day"), Some("1"));
        assert_eq!(macros.get("atmo_cond_wind_dir"), Some("WSW"));
        assert_eq!(macros.get("atmo_cond_gust_kph"), Some("null"));
        assert_eq!(macros.get("atmo_loc_lat"), Some("43.7"));
        assert_eq!(macros.get("atmo_loc_tz_id"), Some("Europe/Paris"));
        assert!(macros.iter().all(|(name, _)| name.starts_with(MACRO_PREFIX)));
    }

    #[test]
    fn test_sources_are_recorded() {
        let macros = derive_macros(&paris());
        let sources: BTreeMap<&str, &str> = macros
            .iter()
            .map(|(name, m)| (name, m.source.as_str()))
            .collect();

        assert_eq!(sources["atmo_location"], "location.name + location.region");
        assert_eq!(sources["atmo_cond_condition"], "current.condition.text");
        assert_eq!(sources["atmo_cond_temp_c"], "current.temp_c");
        assert_eq!(sources["atmo_loc_name"], "location.name");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let response = paris();
        let first = derive_macros(&response);
        let second = derive_macros(&response);
        assert_eq!(first, second);
        assert_eq!(first.len(), second.len());
    }
}
