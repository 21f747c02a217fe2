//! File-based assumption loading
//!
//! Assumptions come from a JSON document (any omitted field keeps the base-plan
//! value) and, optionally, a `key,value` CSV of dotted-path overrides.

use super::Assumptions;
use crate::error::{ModelError, ModelResult};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default path to the assumptions file
pub const DEFAULT_ASSUMPTIONS_PATH: &str = "data/assumptions.json";

/// Load and validate assumptions from a JSON file
pub fn load_assumptions(path: &Path) -> ModelResult<Assumptions> {
    let file = File::open(path)?;
    load_assumptions_from_reader(file)
}

/// Load and validate assumptions from any reader
pub fn load_assumptions_from_reader<R: Read>(reader: R) -> ModelResult<Assumptions> {
    let assumptions: Assumptions = serde_json::from_reader(reader)?;
    assumptions.validate()?;
    log::info!(
        "Loaded assumptions for {}-{}",
        assumptions.projection.first_year,
        assumptions.projection.last_year
    );
    Ok(assumptions)
}

/// Read `key,value` override rows (header required)
pub fn load_overrides<R: Read>(reader: R) -> ModelResult<Vec<(String, f64)>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut overrides = Vec::new();

    for result in csv_reader.records() {
        let record = result?;
        let key = record.get(0).unwrap_or_default().to_string();
        let raw = record.get(1).unwrap_or_default();
        let value: f64 = raw.parse().map_err(|_| ModelError::InvalidOverride {
            path: key.clone(),
            reason: format!("'{}' is not a number", raw),
        })?;
        overrides.push((key, value));
    }

    Ok(overrides)
}

/// Apply an overrides CSV file on top of `base`
pub fn apply_overrides_file(base: &Assumptions, path: &Path) -> ModelResult<Assumptions> {
    let overrides = load_overrides(File::open(path)?)?;
    log::info!("Applying {} assumption overrides from {}", overrides.len(), path.display());
    base.with_overrides(overrides.iter().map(|(k, v)| (k.as_str(), *v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "tax_rate": 0.25, "exit": { "exit_year": 2029, "valuation_basis": "arr", "arr_multiple": 7.0, "ebitda_multiple": 18.0 } }"#;
        let loaded = load_assumptions_from_reader(json.as_bytes()).unwrap();
        assert_eq!(loaded.tax_rate, 0.25);
        assert_eq!(loaded.exit.exit_year, 2029);
        assert_eq!(loaded.revenue_growth, Assumptions::default_plan().revenue_growth);
    }

    #[test]
    fn test_invalid_json_values_rejected_at_load() {
        let json = r#"{ "tax_rate": 1.5 }"#;
        let result = load_assumptions_from_reader(json.as_bytes());
        assert!(matches!(result, Err(ModelError::InvalidAssumption { .. })));
    }

    #[test]
    fn test_load_overrides_csv() {
        let csv = "key,value\nrevenue_growth.rates.2025, 0.45\nexit.ebitda_multiple,25\n";
        let overrides = load_overrides(csv.as_bytes()).unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[0], ("revenue_growth.rates.2025".to_string(), 0.45));

        let applied = Assumptions::default_plan()
            .with_overrides(overrides.iter().map(|(k, v)| (k.as_str(), *v)))
            .unwrap();
        assert_eq!(applied.exit.ebitda_multiple, 25.0);
    }

    #[test]
    fn test_non_numeric_override_rejected() {
        let csv = "key,value\ntax_rate,high\n";
        assert!(matches!(load_overrides(csv.as_bytes()), Err(ModelError::InvalidOverride { .. })));
    }
}
