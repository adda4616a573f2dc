use serde_json::Value;
use std::collections::BTreeMap;
use unitbus_core::{ErrorCode, UnitError};

/// The evaluation context an `${path}` expression is resolved against.
pub struct EvalContext<'a> {
    pub input: &'a Value,
    pub config: &'a Value,
    /// Outputs of steps that have completed so far; a path referencing a
    /// step id not present here is a dangling reference.
    pub steps: &'a BTreeMap<String, Value>,
}

/// Recursively interpolates every `${path}` leaf string in `template`.
pub fn interpolate(template: &Value, ctx: &EvalContext) -> Result<Value, UnitError> {
    match template {
        Value::String(s) => interpolate_string(s, ctx),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(interpolate(item, ctx)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), interpolate(v, ctx)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn interpolate_string(s: &str, ctx: &EvalContext) -> Result<Value, UnitError> {
    let expressions = find_expressions(s);
    if expressions.is_empty() {
        return Ok(Value::String(s.to_string()));
    }

    if expressions.len() == 1 {
        let (start, end, path) = &expressions[0];
        if *start == 0 && *end == s.len() {
            return resolve_path(path, ctx);
        }
    }

    let mut result = String::with_capacity(s.len());
    let mut cursor = 0;
    for (start, end, path) in &expressions {
        result.push_str(&s[cursor..*start]);
        let value = resolve_path(path, ctx)?;
        result.push_str(&stringify(&value));
        cursor = *end;
    }
    result.push_str(&s[cursor..]);
    Ok(Value::String(result))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Finds every `${...}` occurrence, returning `(byte_start, byte_end, path)`.
fn find_expressions(s: &str) -> Vec<(usize, usize, String)> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'$' && bytes[i + 1] == b'{' {
            if let Some(rel_end) = s[i + 2..].find('}') {
                let end = i + 2 + rel_end + 1;
                let path = s[i + 2..i + 2 + rel_end].trim().to_string();
                out.push((i, end, path));
                i = end;
                continue;
            }
        }
        i += 1;
    }
    out
}

fn resolve_path(path: &str, ctx: &EvalContext) -> Result<Value, UnitError> {
    let mut segments = path.split('.');
    let root = segments.next().unwrap_or("");

    match root {
        "input" => Ok(walk(ctx.input, segments).unwrap_or(Value::Null)),
        "config" => Ok(walk(ctx.config, segments).unwrap_or(Value::Null)),
        "steps" => {
            let step_id = segments.next().ok_or_else(|| dangling(path))?;
            let output = ctx.steps.get(step_id).ok_or_else(|| dangling(path))?;
            // `output` is an optional, purely cosmetic segment: both
            // `steps.id.output.field` and `steps.id.field` resolve the same way.
            let mut rest = segments.peekable();
            if rest.peek() == Some(&"output") {
                rest.next();
            }
            Ok(walk(output, rest).unwrap_or(Value::Null))
        }
        _ => Ok(Value::Null),
    }
}

fn dangling(path: &str) -> UnitError {
    UnitError::from_code(
        ErrorCode::DanglingReference,
        format!("'${{{path}}}' references a step that has not completed"),
    )
}

fn walk<'a>(root: &Value, segments: impl Iterator<Item = &'a str>) -> Option<Value> {
    let mut current = root.clone();
    for segment in segments {
        current = match current {
            Value::Object(mut map) => map.remove(segment)?,
            Value::Array(vec) => {
                let idx: usize = segment.parse().ok()?;
                vec.into_iter().nth(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx<'a>(input: &'a Value, config: &'a Value, steps: &'a BTreeMap<String, Value>) -> EvalContext<'a> {
        EvalContext { input, config, steps }
    }

    #[test]
    fn whole_string_expression_preserves_native_type() {
        let input = json!({"count": 3});
        let config = json!({});
        let steps = BTreeMap::new();
        let result = interpolate(&json!("${input.count}"), &ctx(&input, &config, &steps)).unwrap();
        assert_eq!(result, json!(3));
    }

    #[test]
    fn embedded_expression_is_stringified_and_concatenated() {
        let input = json!({"name": "world"});
        let config = json!({});
        let steps = BTreeMap::new();
        let result = interpolate(&json!("hello ${input.name}!"), &ctx(&input, &config, &steps)).unwrap();
        assert_eq!(result, json!("hello world!"));
    }

    #[test]
    fn unresolved_input_path_yields_null_or_empty_string() {
        let input = json!({});
        let config = json!({});
        let steps = BTreeMap::new();
        assert_eq!(
            interpolate(&json!("${input.missing}"), &ctx(&input, &config, &steps)).unwrap(),
            Value::Null
        );
        assert_eq!(
            interpolate(&json!("x${input.missing}y"), &ctx(&input, &config, &steps)).unwrap(),
            json!("xy")
        );
    }

    #[test]
    fn referencing_an_incomplete_step_is_a_dangling_reference() {
        let input = Value::Null;
        let config = Value::Null;
        let steps = BTreeMap::new();
        let err = interpolate(&json!("${steps.step1.output.value}"), &ctx(&input, &config, &steps))
            .unwrap_err();
        assert_eq!(err.code, "dangling_reference");
    }

    #[test]
    fn completed_step_output_is_resolved_by_path() {
        let input = Value::Null;
        let config = Value::Null;
        let mut steps = BTreeMap::new();
        steps.insert("step1".to_string(), json!({"value": 42}));
        let result = interpolate(
            &json!("${steps.step1.output.value}"),
            &ctx(&input, &config, &steps),
        )
        .unwrap();
        assert_eq!(result, json!(42));
    }

    #[test]
    fn nested_object_and_array_templates_interpolate_recursively() {
        let input = json!({"a": 1, "b": 2});
        let config = json!({});
        let steps = BTreeMap::new();
        let template = json!({"sum_inputs": ["${input.a}", "${input.b}"]});
        let result = interpolate(&template, &ctx(&input, &config, &steps)).unwrap();
        assert_eq!(result, json!({"sum_inputs": [1, 2]}));
    }
}
