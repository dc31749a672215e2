use serde_json::{Map, Value};

use crate::tools::ToolError;

/// JSON type a tool parameter accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Boolean,
}

impl ParamKind {
    pub fn schema_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// Declared shape of one tool parameter. Every tool carries an explicit
/// table of these; arguments are checked against it before the handler runs.
#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            description,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            description,
        }
    }

    pub fn with_default(
        name: &'static str,
        kind: ParamKind,
        description: &'static str,
        default: Value,
    ) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
            description,
        }
    }
}

/// Validate raw arguments against a parameter table: type-check each field,
/// fill defaults, and reject fields the table does not declare. Explicit
/// `null` is treated the same as absent.
pub fn validate(specs: &[ParamSpec], args: &Value) -> Result<Map<String, Value>, ToolError> {
    let supplied = match args {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        other => {
            return Err(ToolError::InvalidArguments(format!(
                "arguments must be an object, got {other}"
            )))
        }
    };

    for key in supplied.keys() {
        if !specs.iter().any(|s| s.name == key) {
            return Err(ToolError::InvalidArguments(format!("unknown field `{key}`")));
        }
    }

    let mut validated = Map::new();
    for spec in specs {
        match supplied.get(spec.name) {
            Some(Value::Null) | None => {
                if spec.required {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required parameter: {}",
                        spec.name
                    )));
                }
                if let Some(default) = &spec.default {
                    validated.insert(spec.name.to_string(), default.clone());
                }
            }
            Some(value) => {
                if !spec.kind.matches(value) {
                    return Err(ToolError::InvalidArguments(format!(
                        "`{}` must be a {}",
                        spec.name,
                        spec.kind.schema_type()
                    )));
                }
                validated.insert(spec.name.to_string(), value.clone());
            }
        }
    }

    Ok(validated)
}

/// Render a parameter table as the JSON-Schema object advertised over
/// `tools/list`.
pub fn json_schema(specs: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for spec in specs {
        let mut prop = Map::new();
        prop.insert("type".into(), Value::String(spec.kind.schema_type().into()));
        prop.insert("description".into(), Value::String(spec.description.into()));
        if let Some(default) = &spec.default {
            prop.insert("default".into(), default.clone());
        }
        properties.insert(spec.name.to_string(), Value::Object(prop));
        if spec.required {
            required.push(Value::String(spec.name.to_string()));
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("id", ParamKind::String, "Lifelog entry ID"),
            ParamSpec::optional("isStarred", ParamKind::Boolean, "Only starred entries"),
            ParamSpec::with_default(
                "limit",
                ParamKind::Integer,
                "Maximum results",
                serde_json::json!(10),
            ),
        ]
    }

    #[test]
    fn accepts_valid_arguments() {
        let args = serde_json::json!({"id": "ll_1", "limit": 5});
        let validated = validate(&specs(), &args).unwrap();
        assert_eq!(validated["id"], "ll_1");
        assert_eq!(validated["limit"], 5);
        assert!(!validated.contains_key("isStarred"));
    }

    #[test]
    fn fills_defaults() {
        let args = serde_json::json!({"id": "ll_1"});
        let validated = validate(&specs(), &args).unwrap();
        assert_eq!(validated["limit"], 10);
    }

    #[test]
    fn rejects_missing_required() {
        let err = validate(&specs(), &serde_json::json!({})).unwrap_err();
        assert!(err.to_string().contains("missing required parameter: id"));
    }

    #[test]
    fn rejects_unknown_field() {
        let args = serde_json::json!({"id": "ll_1", "bogus": true});
        let err = validate(&specs(), &args).unwrap_err();
        assert!(err.to_string().contains("unknown field `bogus`"));
    }

    #[test]
    fn rejects_type_mismatch() {
        let args = serde_json::json!({"id": 42});
        let err = validate(&specs(), &args).unwrap_err();
        assert!(err.to_string().contains("`id` must be a string"));

        let args = serde_json::json!({"id": "ll_1", "limit": "ten"});
        let err = validate(&specs(), &args).unwrap_err();
        assert!(err.to_string().contains("`limit` must be a integer"));
    }

    #[test]
    fn null_treated_as_absent() {
        let args = serde_json::json!({"id": "ll_1", "isStarred": null});
        let validated = validate(&specs(), &args).unwrap();
        assert!(!validated.contains_key("isStarred"));
        assert_eq!(validated["limit"], 10);
    }

    #[test]
    fn null_arguments_need_only_defaults() {
        let table = vec![ParamSpec::with_default(
            "limit",
            ParamKind::Integer,
            "Maximum results",
            serde_json::json!(10),
        )];
        let validated = validate(&table, &Value::Null).unwrap();
        assert_eq!(validated["limit"], 10);
    }

    #[test]
    fn non_object_arguments_rejected() {
        let err = validate(&specs(), &serde_json::json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("must be an object"));
    }

    #[test]
    fn schema_shape() {
        let schema = json_schema(&specs());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["id"]["type"], "string");
        assert_eq!(schema["properties"]["limit"]["default"], 10);
        assert_eq!(schema["required"], serde_json::json!(["id"]));
    }
}
