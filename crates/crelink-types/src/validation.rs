//! Validation types for configuration tables and user input.
//!
//! Bridge implementations and storage backends receive raw TOML tables and
//! check them against a [`Schema`] before construction. The same error type
//! reports malformed addresses, amounts and hex strings coming from callers.

use crate::utils::{parse_address, without_0x_prefix};
use thiserror::Error;

/// Errors that can occur during configuration or input validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
	/// A required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// A field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// A field has the wrong type.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	/// A string is not a 20-byte hex address.
	#[error("Invalid address: {0}")]
	InvalidAddress(String),
	/// A string is not a valid non-negative amount.
	#[error("Invalid amount: {0}")]
	InvalidAmount(String),
	/// A string is not valid hex.
	#[error("Invalid hex: {0}")]
	InvalidHex(String),
}

/// The type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer with optional inclusive bounds.
	Integer {
		min: Option<i64>,
		max: Option<i64>,
	},
	/// Floating point number; integers are accepted too.
	Float,
	Boolean,
	/// A `0x`-prefixed 20-byte address string.
	Address,
	/// An `http://` or `https://` URL string.
	Url,
	Array(Box<FieldType>),
	Table(Schema),
}

/// Custom validator run after type checking.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a [`Schema`].
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Attaches a custom validator to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}
}

/// Required and optional fields of a TOML table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// Required fields must be present; every present field is type checked,
	/// custom validators run afterwards and nested tables recurse with the
	/// field path prefixed onto error messages.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			check_field(field, value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				check_field(field, value)?;
			}
		}

		Ok(())
	}
}

fn check_field(field: &Field, value: &toml::Value) -> Result<(), ValidationError> {
	validate_field_type(&field.name, value, &field.field_type)?;
	if let Some(validator) = &field.validator {
		validator(value).map_err(|message| ValidationError::InvalidValue {
			field: field.name.clone(),
			message,
		})?;
	}
	Ok(())
}

fn mismatch(field_name: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String => {
			value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "string", value))?;
		},
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| mismatch(field_name, "integer", value))?;
			if let Some(min_val) = min {
				if int_val < *min_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is less than minimum {}", int_val, min_val),
					});
				}
			}
			if let Some(max_val) = max {
				if int_val > *max_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is greater than maximum {}", int_val, max_val),
					});
				}
			}
		},
		FieldType::Float => {
			if !(value.is_float() || value.is_integer()) {
				return Err(mismatch(field_name, "float", value));
			}
		},
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(mismatch(field_name, "boolean", value));
			}
		},
		FieldType::Address => {
			let s = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "address string", value))?;
			parse_address(s).map_err(|_| ValidationError::InvalidValue {
				field: field_name.to_string(),
				message: format!("'{}' is not a valid address", s),
			})?;
		},
		FieldType::Url => {
			let s = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "url string", value))?;
			if !(s.starts_with("http://") || s.starts_with("https://")) {
				return Err(ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("'{}' must start with http:// or https://", s),
				});
			}
		},
		FieldType::Array(inner_type) => {
			let array = value
				.as_array()
				.ok_or_else(|| mismatch(field_name, "array", value))?;
			for (i, item) in array.iter().enumerate() {
				validate_field_type(&format!("{}[{}]", field_name, i), item, inner_type)?;
			}
		},
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| match e {
				ValidationError::MissingField(f) => {
					ValidationError::MissingField(format!("{}.{}", field_name, f))
				},
				ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
					field: format!("{}.{}", field_name, field),
					message,
				},
				ValidationError::TypeMismatch {
					field,
					expected,
					actual,
				} => ValidationError::TypeMismatch {
					field: format!("{}.{}", field_name, field),
					expected,
					actual,
				},
				other => other,
			})?;
		},
	}

	Ok(())
}

/// Validates that a string is `0x`-prefixed hex with an even number of digits.
pub fn validate_hex(value: &str) -> Result<(), ValidationError> {
	if !value.starts_with("0x") && !value.starts_with("0X") {
		return Err(ValidationError::InvalidHex(value.to_string()));
	}
	let digits = without_0x_prefix(value);
	if digits.len() % 2 != 0 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
		return Err(ValidationError::InvalidHex(value.to_string()));
	}
	Ok(())
}

/// A configuration schema that can validate TOML values.
///
/// Implemented by every pluggable component so its table can be checked
/// before the component is constructed.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn relayer_schema() -> Schema {
		Schema::new(
			vec![
				Field::new("relayer_url", FieldType::Url),
				Field::new("bridge_address", FieldType::Address),
			],
			vec![
				Field::new(
					"fee_bps",
					FieldType::Integer {
						min: Some(0),
						max: Some(10_000),
					},
				),
				Field::new(
					"limits",
					FieldType::Table(Schema::new(vec![Field::new("max", FieldType::Float)], vec![])),
				),
			],
		)
	}

	#[test]
	fn test_valid_table_passes() {
		let config: toml::Value = toml::from_str(
			r#"
			relayer_url = "https://relayer.example"
			bridge_address = "0x5fbdb2315678afecb367f032d93f642f64180aa3"
			fee_bps = 30
			[limits]
			max = 1000
			"#,
		)
		.unwrap();
		relayer_schema().validate(&config).unwrap();
	}

	#[test]
	fn test_missing_and_mistyped_fields() {
		let missing: toml::Value = toml::from_str(r#"relayer_url = "https://x""#).unwrap();
		assert_eq!(
			relayer_schema().validate(&missing).unwrap_err(),
			ValidationError::MissingField("bridge_address".into())
		);

		let bad_url: toml::Value = toml::from_str(
			r#"
			relayer_url = "ftp://x"
			bridge_address = "0x5fbdb2315678afecb367f032d93f642f64180aa3"
			"#,
		)
		.unwrap();
		assert!(matches!(
			relayer_schema().validate(&bad_url),
			Err(ValidationError::InvalidValue { .. })
		));
	}

	#[test]
	fn test_nested_errors_carry_path() {
		let config: toml::Value = toml::from_str(
			r#"
			relayer_url = "https://x"
			bridge_address = "0x5fbdb2315678afecb367f032d93f642f64180aa3"
			[limits]
			"#,
		)
		.unwrap();
		assert_eq!(
			relayer_schema().validate(&config).unwrap_err(),
			ValidationError::MissingField("limits.max".into())
		);
	}

	#[test]
	fn test_custom_validator_and_bounds() {
		let schema = Schema::new(
			vec![Field::new("name", FieldType::String).with_validator(|v| {
				if v.as_str().is_some_and(|s| s.is_empty()) {
					Err("must not be empty".into())
				} else {
					Ok(())
				}
			})],
			vec![Field::new(
				"fee_bps",
				FieldType::Integer {
					min: Some(0),
					max: Some(100),
				},
			)],
		);
		let empty: toml::Value = toml::from_str(r#"name = """#).unwrap();
		assert!(schema.validate(&empty).is_err());
		let too_big: toml::Value = toml::from_str("name = \"a\"\nfee_bps = 101").unwrap();
		assert!(schema.validate(&too_big).is_err());
	}

	#[test]
	fn test_validate_hex() {
		assert!(validate_hex("0xdeadbeef").is_ok());
		assert!(validate_hex("deadbeef").is_err());
		assert!(validate_hex("0xabc").is_err());
		assert!(validate_hex("0xzz").is_err());
	}
}
