use serde_json::{Map, Number, Value};

/// A metric submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSubmission {
    pub name: String,
    pub value: i64,
    pub trace_id: String,
    pub observation_id: Option<String>,
}

impl MetricSubmission {
    /// Validate a request body according to its `Content-Type`.
    ///
    /// Only `application/json` bodies are decoded; any other or missing
    /// content type leaves the body as text, which is not an object.
    pub fn from_body(content_type: Option<&str>, body: &[u8]) -> Result<Self, String> {
        if !is_json_content_type(content_type) {
            return Err("body: Expected object, received string".to_string());
        }
        Self::from_json(body)
    }

    /// Parse and validate a raw JSON body.
    ///
    /// Every field is checked before failing so the error lists all problems,
    /// formatted as `"<field>: <problem>"` joined with `"; "`.
    pub fn from_json(body: &[u8]) -> Result<Self, String> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|error| format!("body: Invalid JSON ({error})"))?;

        let Value::Object(fields) = payload else {
            return Err(format!(
                "body: Expected object, received {}",
                json_type_name(&payload)
            ));
        };

        let mut issues = Vec::new();

        let name = required_string(&fields, "name", &mut issues);
        if matches!(name.as_deref(), Some("")) {
            issues.push("name: String must contain at least 1 character(s)".to_string());
        }
        let value = required_integer(&fields, "value", &mut issues);
        let trace_id = required_string(&fields, "traceId", &mut issues);
        let observation_id = optional_string(&fields, "observationId", &mut issues);

        match (name, value, trace_id) {
            (Some(name), Some(value), Some(trace_id)) if issues.is_empty() => Ok(Self {
                name,
                value,
                trace_id,
                observation_id,
            }),
            _ => Err(issues.join("; ")),
        }
    }
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

fn required_string(
    fields: &Map<String, Value>,
    key: &str,
    issues: &mut Vec<String>,
) -> Option<String> {
    match fields.get(key) {
        None => {
            issues.push(format!("{key}: Required"));
            None
        }
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => {
            issues.push(format!(
                "{key}: Expected string, received {}",
                json_type_name(other)
            ));
            None
        }
    }
}

fn optional_string(
    fields: &Map<String, Value>,
    key: &str,
    issues: &mut Vec<String>,
) -> Option<String> {
    match fields.get(key) {
        None => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => {
            issues.push(format!(
                "{key}: Expected string, received {}",
                json_type_name(other)
            ));
            None
        }
    }
}

fn required_integer(
    fields: &Map<String, Value>,
    key: &str,
    issues: &mut Vec<String>,
) -> Option<i64> {
    match fields.get(key) {
        None => {
            issues.push(format!("{key}: Required"));
            None
        }
        Some(Value::Number(number)) => match whole_number(number) {
            Ok(value) => Some(value),
            Err(problem) => {
                issues.push(format!("{key}: {problem}"));
                None
            }
        },
        Some(other) => {
            issues.push(format!(
                "{key}: Expected number, received {}",
                json_type_name(other)
            ));
            None
        }
    }
}

// `120` and `120.0` are both whole numbers; `120.5` is not.
fn whole_number(number: &Number) -> Result<i64, &'static str> {
    if let Some(value) = number.as_i64() {
        return Ok(value);
    }
    if number.is_u64() {
        return Err("Number must be less than or equal to 9223372036854775807");
    }

    let value = number.as_f64().ok_or("Expected number, received nan")?;
    if value.fract() != 0.0 {
        return Err("Expected integer, received float");
    }
    if value <= i64::MIN as f64 || value >= i64::MAX as f64 {
        return Err("Number must fit in a signed 64-bit integer");
    }
    Ok(value as i64)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
