//! Submission validation
//!
//! Three stages run in a fixed order: serialized size, nesting depth, then the
//! schema of the stats object. Size and depth stop at the first failure, so the
//! schema walk never sees an oversized or deeply nested payload. Schema errors
//! are collected for every known field.

use serde_json::{Map, Value};

use crate::prelude::*;

/// Largest accepted serialized payload (inclusive)
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;
/// Deepest accepted object nesting (inclusive)
pub const MAX_OBJECT_DEPTH: usize = 10;

/// Field names accepted as the experience value, in lookup order
pub const EXPERIENCE_FIELDS: [&str; 3] = ["bedwars_experience", "Experience", "experience"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
	Number,
	String,
	Boolean,
	Object,
}

impl FieldType {
	fn name(self) -> &'static str {
		match self {
			FieldType::Number => "number",
			FieldType::String => "string",
			FieldType::Boolean => "boolean",
			FieldType::Object => "object",
		}
	}

	fn matches(self, value: &Value) -> bool {
		match self {
			FieldType::Number => value.as_f64().is_some_and(f64::is_finite),
			FieldType::String => value.is_string(),
			FieldType::Boolean => value.is_boolean(),
			FieldType::Object => value.is_object(),
		}
	}
}

/// Known Bedwars stats fields and their types. Other fields pass unchecked.
pub const KNOWN_FIELDS: &[(&str, FieldType)] = &[
	("bedwars_experience", FieldType::Number),
	("Experience", FieldType::Number),
	("experience", FieldType::Number),
	("kills_bedwars", FieldType::Number),
	("deaths_bedwars", FieldType::Number),
	("final_kills_bedwars", FieldType::Number),
	("final_deaths_bedwars", FieldType::Number),
	("wins_bedwars", FieldType::Number),
	("losses_bedwars", FieldType::Number),
	("games_played_bedwars", FieldType::Number),
	("beds_broken_bedwars", FieldType::Number),
	("beds_lost_bedwars", FieldType::Number),
	("fkdr", FieldType::Number),
	("winstreak", FieldType::Number),
	("coins", FieldType::Number),
	("bedwars_level", FieldType::Number),
	("items_purchased_bedwars", FieldType::Number),
	("resources_collected_bedwars", FieldType::Number),
	("displayname", FieldType::String),
	("display", FieldType::String),
	("activeProjectileTrail", FieldType::String),
	("activeDeathCry", FieldType::String),
	("activeGlyph", FieldType::String),
	("activeVictoryDance", FieldType::String),
	("activeSprays", FieldType::String),
	("activeKillEffect", FieldType::String),
	("activeIslandTopper", FieldType::String),
	("nicked", FieldType::Boolean),
	("eight_one_", FieldType::Object),
	("eight_two_", FieldType::Object),
	("four_three_", FieldType::Object),
	("four_four_", FieldType::Object),
	("two_four_", FieldType::Object),
	("castle_", FieldType::Object),
];

fn type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

fn has_experience(stats: &Map<String, Value>) -> bool {
	EXPERIENCE_FIELDS
		.iter()
		.any(|field| stats.get(*field).and_then(Value::as_f64).is_some_and(f64::is_finite))
}

fn nested_object<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Map<String, Value>> {
	path.iter().try_fold(value, |current, key| current.get(key))?.as_object()
}

/// Locate the stats object inside a payload.
///
/// Shapes are tried in order: the payload itself when it directly carries an
/// experience field, `{bedwars}`, `{data: {bedwars}}`, Hypixel's
/// `{player: {stats: {Bedwars}}}`, and finally the payload as a whole.
pub fn extract_stats(payload: &Value) -> Option<&Map<String, Value>> {
	let root = payload.as_object()?;
	if has_experience(root) {
		return Some(root);
	}
	nested_object(payload, &["bedwars"])
		.or_else(|| nested_object(payload, &["data", "bedwars"]))
		.or_else(|| nested_object(payload, &["player", "stats", "Bedwars"]))
		.or(Some(root))
}

/// Maximum object nesting, not descending into arrays.
///
/// Stops counting once `limit` is exceeded.
pub fn object_depth(value: &Value, limit: usize) -> usize {
	fn walk(value: &Value, depth: usize, limit: usize) -> usize {
		if depth > limit {
			return depth;
		}
		let Value::Object(map) = value else {
			return depth;
		};
		let mut max = depth;
		for child in map.values() {
			max = max.max(walk(child, depth + 1, limit));
			if max > limit {
				break;
			}
		}
		max
	}
	walk(value, 0, limit)
}

// ValidationResult //
//******************//
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
	pub errors: Vec<FieldError>,
}

impl ValidationResult {
	pub fn ok() -> Self {
		Self::default()
	}

	fn single(field: &str, message: String) -> Self {
		Self { errors: vec![FieldError::new(field, message)] }
	}

	pub fn is_valid(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn into_result(self) -> ClResult<()> {
		if self.is_valid() {
			Ok(())
		} else {
			Err(Error::ValidationFailed(self.errors))
		}
	}
}

// SubmissionValidator //
//*********************//
#[derive(Debug, Clone, Copy)]
pub struct SubmissionValidator {
	pub max_payload_bytes: usize,
	pub max_depth: usize,
}

impl Default for SubmissionValidator {
	fn default() -> Self {
		Self { max_payload_bytes: MAX_PAYLOAD_BYTES, max_depth: MAX_OBJECT_DEPTH }
	}
}

impl SubmissionValidator {
	pub fn check_size(&self, size: usize) -> ValidationResult {
		if size > self.max_payload_bytes {
			return ValidationResult::single(
				"_payload",
				format!(
					"Payload size ({} bytes) exceeds maximum allowed ({} bytes)",
					size, self.max_payload_bytes
				),
			);
		}
		ValidationResult::ok()
	}

	pub fn check_depth(&self, payload: &Value) -> ValidationResult {
		let depth = object_depth(payload, self.max_depth);
		if depth > self.max_depth {
			return ValidationResult::single(
				"_structure",
				format!(
					"Object nesting depth ({}) exceeds maximum allowed ({})",
					depth, self.max_depth
				),
			);
		}
		ValidationResult::ok()
	}

	pub fn check_schema(&self, payload: &Value) -> ValidationResult {
		let Some(stats) = extract_stats(payload) else {
			return ValidationResult::single("data", "Data must be a non-null object".into());
		};

		let mut errors = Vec::new();
		for (field, expected) in KNOWN_FIELDS {
			let Some(value) = stats.get(*field).filter(|v| !v.is_null()) else {
				continue;
			};
			if !expected.matches(value) {
				errors.push(FieldError::new(
					*field,
					format!(
						"Field '{}' must be of type {}, got {}",
						field,
						expected.name(),
						type_name(value)
					),
				));
			} else if value.as_f64().is_some_and(|n| n < 0.0) {
				errors.push(FieldError::new(
					*field,
					format!("Field '{}' must be non-negative, got {}", field, value),
				));
			}
		}

		if !has_experience(stats) {
			errors.push(FieldError::new(
				"bedwars_experience",
				"At least one of bedwars_experience, Experience or experience must be present and valid",
			));
		}

		ValidationResult { errors }
	}

	/// Run all stages on a payload whose serialized form is `size` bytes
	pub fn validate_sized(&self, size: usize, payload: &Value) -> ValidationResult {
		let size_check = self.check_size(size);
		if !size_check.is_valid() {
			return size_check;
		}
		let depth_check = self.check_depth(payload);
		if !depth_check.is_valid() {
			return depth_check;
		}
		self.check_schema(payload)
	}

	pub fn validate(&self, payload: &Value) -> ClResult<ValidationResult> {
		let size = serde_json::to_vec(payload)?.len();
		Ok(self.validate_sized(size, payload))
	}
}


// vim: ts=4
