//! Caller input validation — presence and defaults only.
//!
//! Type tags on flow inputs are informational in this release; nothing is
//! coerced or checked beyond presence.

use serde_json::{Map, Value};

use crate::errors::EngineError;
use crate::types::FlowInput;

/// Check declared inputs against the caller payload, in declaration order.
///
/// A missing required input fails with [`EngineError::InputMissing`]; a
/// missing optional input takes its default when one is declared and stays
/// absent otherwise. Undeclared caller keys pass through untouched.
pub fn apply_declarations(
    declared: &[FlowInput],
    supplied: &Map<String, Value>,
) -> Result<Map<String, Value>, EngineError> {
    let mut resolved = supplied.clone();
    for input in declared {
        if resolved.contains_key(&input.name) {
            continue;
        }
        if input.required {
            return Err(EngineError::InputMissing {
                name: input.name.clone(),
            });
        }
        if let Some(default) = &input.default {
            resolved.insert(input.name.clone(), default.clone());
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;
    use serde_json::json;

    fn input(name: &str, required: bool, default: Option<Value>) -> FlowInput {
        FlowInput {
            name: name.into(),
            value_type: ValueType::String,
            required,
            default,
            location: None,
        }
    }

    fn payload(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn missing_required_fails() {
        let declared = vec![input("msg", true, None)];
        let err = apply_declarations(&declared, &Map::new()).unwrap_err();
        assert_eq!(err.to_string(), "Missing required input: msg");
    }

    #[test]
    fn default_substituted_when_absent() {
        let declared = vec![input("limit", false, Some(json!(10)))];
        let resolved = apply_declarations(&declared, &Map::new()).unwrap();
        assert_eq!(resolved["limit"], json!(10));
    }

    #[test]
    fn supplied_value_beats_default() {
        let declared = vec![input("limit", false, Some(json!(10)))];
        let resolved = apply_declarations(&declared, &payload(&[("limit", json!(25))])).unwrap();
        assert_eq!(resolved["limit"], json!(25));
    }

    #[test]
    fn optional_without_default_stays_absent() {
        let declared = vec![input("note", false, None)];
        let resolved = apply_declarations(&declared, &Map::new()).unwrap();
        assert!(!resolved.contains_key("note"));
    }

    #[test]
    fn no_type_coercion() {
        // A number supplied for a string-typed input passes through as-is.
        let declared = vec![input("msg", true, None)];
        let resolved = apply_declarations(&declared, &payload(&[("msg", json!(42))])).unwrap();
        assert_eq!(resolved["msg"], json!(42));
    }

    #[test]
    fn undeclared_keys_pass_through() {
        let resolved = apply_declarations(&[], &payload(&[("extra", json!(true))])).unwrap();
        assert_eq!(resolved["extra"], json!(true));
    }
}
