//! Cache poisoning guard
//!
//! A submission may only replace a cached record when its high-value counters
//! agree with the last trusted record for the same player. With nothing trusted
//! to compare against, the submission is refused.

use serde_json::{Map, Value};

use crate::prelude::*;
use crate::validation::extract_stats;

/// Fields that must agree between the trusted record and a submission
pub const CRITICAL_FIELDS: [&str; 7] = [
	"bedwars_experience",
	"Experience",
	"experience",
	"kills_bedwars",
	"wins_bedwars",
	"final_kills_bedwars",
	"final_deaths_bedwars",
];

fn numeric(value: &Value) -> Option<f64> {
	match value {
		Value::Number(n) => n.as_f64(),
		Value::String(s) => s.trim().parse::<f64>().ok(),
		_ => None,
	}
	.filter(|n| n.is_finite())
}

fn present<'a>(stats: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
	stats.get(field).filter(|v| !v.is_null())
}

/// Compare critical fields of two stats objects.
///
/// Every critical field present in `source` must be present in `submitted`
/// with the same numeric value. A source without any critical field matches
/// nothing.
#[allow(clippy::float_cmp)]
pub fn matches_critical_fields(source: &Map<String, Value>, submitted: &Map<String, Value>) -> bool {
	let mut compared = 0;
	for field in CRITICAL_FIELDS {
		let Some(expected) = present(source, field) else {
			continue;
		};
		compared += 1;
		let Some(actual) = present(submitted, field) else {
			return false;
		};
		match (numeric(expected), numeric(actual)) {
			(Some(a), Some(b)) if a == b => {}
			_ => return false,
		}
	}
	compared > 0
}

/// Corroborate a submission against the trusted record of the same player
pub fn corroborate(trusted: Option<&Value>, submitted: &Value) -> ClResult<()> {
	let Some(source) = trusted.and_then(extract_stats) else {
		return Err(Error::Unverified("No trusted record to corroborate the submission against.".into()));
	};
	let Some(stats) = extract_stats(submitted) else {
		return Err(Error::Unverified("Submission does not contain a stats object.".into()));
	};

	if !matches_critical_fields(source, stats) {
		return Err(Error::Unverified(
			"Submitted stats do not match the trusted record for this player.".into(),
		));
	}

	if let (Some(Value::String(expected)), Some(Value::String(actual))) =
		(present(source, "displayname"), present(stats, "displayname"))
	{
		if expected.trim() != actual.trim() {
			return Err(Error::Unverified("Displayname mismatch.".into()));
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn obj(value: Value) -> Map<String, Value> {
		value.as_object().cloned().unwrap()
	}

	#[test]
	fn test_equal_values_match() {
		let source = obj(json!({ "final_kills_bedwars": 50 }));
		assert!(matches_critical_fields(&source, &obj(json!({ "final_kills_bedwars": 50 }))));
		assert!(matches_critical_fields(&source, &obj(json!({ "final_kills_bedwars": 50.0 }))));
	}

	#[test]
	fn test_changed_value_rejects() {
		let source = obj(json!({ "final_kills_bedwars": 50 }));
		assert!(!matches_critical_fields(&source, &obj(json!({ "final_kills_bedwars": 51 }))));
	}

	#[test]
	fn test_omitted_field_rejects() {
		let source = obj(json!({ "final_kills_bedwars": 50 }));
		assert!(!matches_critical_fields(&source, &obj(json!({ "kills_bedwars": 3 }))));
		assert!(!matches_critical_fields(&source, &obj(json!({ "final_kills_bedwars": null }))));
	}

	#[test]
	fn test_source_without_critical_fields_rejects() {
		let source = obj(json!({ "displayname": "Steve", "coins": 10 }));
		let submitted = obj(json!({ "final_kills_bedwars": 50, "bedwars_experience": 1000 }));
		assert!(!matches_critical_fields(&source, &submitted));
		assert!(!matches_critical_fields(&Map::new(), &Map::new()));
	}

	#[test]
	fn test_numeric_strings_compare_numerically() {
		let source = obj(json!({ "wins_bedwars": "12" }));
		assert!(matches_critical_fields(&source, &obj(json!({ "wins_bedwars": 12 }))));
		let source = obj(json!({ "wins_bedwars": "twelve" }));
		assert!(!matches_critical_fields(&source, &obj(json!({ "wins_bedwars": "twelve" }))));
	}

	#[test]
	fn test_extra_submitted_fields_are_ignored() {
		let source = obj(json!({ "Experience": 100 }));
		let submitted = obj(json!({ "Experience": 100, "kills_bedwars": 999 }));
		assert!(matches_critical_fields(&source, &submitted));
	}

	#[test]
	fn test_corroborate_uses_shape_extraction() {
		let trusted = json!({ "player": { "stats": { "Bedwars": { "Experience": 500, "wins_bedwars": 7 } } } });
		let submitted = json!({ "bedwars": { "Experience": 500, "wins_bedwars": 7, "coins": 1 } });
		assert!(corroborate(Some(&trusted), &submitted).is_ok());
	}

	#[test]
	fn test_corroborate_without_trusted_record() {
		let err = corroborate(None, &json!({ "Experience": 1 })).unwrap_err();
		assert_eq!(err.code(), "UNVERIFIED_SUBMISSION");
	}

	#[test]
	fn test_displayname_must_match() {
		let trusted = json!({ "Experience": 1, "displayname": "Steve" });
		assert!(corroborate(Some(&trusted), &json!({ "Experience": 1, "displayname": " Steve " })).is_ok());
		let err = corroborate(Some(&trusted), &json!({ "Experience": 1, "displayname": "Alex" }))
			.unwrap_err();
		assert_eq!(err.code(), "UNVERIFIED_SUBMISSION");
	}
}

// vim: ts=4
