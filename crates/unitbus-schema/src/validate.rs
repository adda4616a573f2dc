use crate::{pattern_cache, PathSegment, Schema, SchemaType, Violation, ViolationCode};
use serde_json::Value;

/// Validate `value` against `schema`, returning every violation found.
///
/// Pure and side-effect-free: the only mutation anywhere in this
/// call graph is populating the process-wide compiled-pattern cache, which is
/// purely a memoization of `Regex::new` and has no bearing on the result.
/// Violations are returned in a stable pre-order traversal: the schema's own
/// constraints are checked before its children's.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();
    validate_node(schema, value, &mut Vec::new(), &mut violations);
    violations
}

fn validate_node(
    schema: &Schema,
    value: &Value,
    path: &mut Vec<PathSegment>,
    out: &mut Vec<Violation>,
) {
    // Null is only valid for a `null`-typed schema; absence of an optional
    // property is handled by the caller and never reaches this function.
    if value.is_null() && schema.ty != SchemaType::Null {
        out.push(Violation::new(
            path.clone(),
            ViolationCode::TypeMismatch,
            format!("expected {}, got null", schema.ty.as_str()),
        ));
        return;
    }

    match schema.ty {
        SchemaType::Null => {
            if !value.is_null() {
                out.push(type_mismatch(schema, value, path));
            }
        }
        SchemaType::String => {
            let Some(s) = value.as_str() else {
                out.push(type_mismatch(schema, value, path));
                return;
            };
            let len = s.chars().count();
            if let Some(min) = schema.min_length {
                if len < min {
                    out.push(Violation::new(
                        path.clone(),
                        ViolationCode::LengthViolation,
                        format!("length {len} is shorter than minLength {min}"),
                    ));
                }
            }
            if let Some(max) = schema.max_length {
                if len > max {
                    out.push(Violation::new(
                        path.clone(),
                        ViolationCode::LengthViolation,
                        format!("length {len} is longer than maxLength {max}"),
                    ));
                }
            }
            if let Some(pattern) = &schema.pattern {
                match pattern_cache::compile(pattern) {
                    Ok(re) if !re.is_match(s) => {
                        out.push(Violation::new(
                            path.clone(),
                            ViolationCode::PatternMismatch,
                            format!("'{s}' does not match pattern {pattern}"),
                        ));
                    }
                    Ok(_) => {}
                    Err(e) => out.push(Violation::new(
                        path.clone(),
                        ViolationCode::PatternMismatch,
                        format!("pattern '{pattern}' is invalid: {e}"),
                    )),
                }
            }
            check_enum(schema, value, path, out);
        }
        SchemaType::Number => {
            let Some(n) = value.as_f64() else {
                out.push(type_mismatch(schema, value, path));
                return;
            };
            check_numeric_bounds(schema, n, path, out);
            check_enum(schema, value, path, out);
        }
        SchemaType::Integer => {
            if !value.is_i64() && !value.is_u64() {
                out.push(type_mismatch(schema, value, path));
                return;
            }
            let n = value.as_f64().unwrap();
            check_numeric_bounds(schema, n, path, out);
            check_enum(schema, value, path, out);
        }
        SchemaType::Boolean => {
            if !value.is_boolean() {
                out.push(type_mismatch(schema, value, path));
                return;
            }
            check_enum(schema, value, path, out);
        }
        SchemaType::Object => {
            let Some(obj) = value.as_object() else {
                out.push(type_mismatch(schema, value, path));
                return;
            };
            for name in &schema.required {
                if !obj.contains_key(name) {
                    let mut p = path.clone();
                    p.push(PathSegment::Key(name.clone()));
                    out.push(Violation::new(
                        p,
                        ViolationCode::MissingRequired,
                        format!("missing required property '{name}'"),
                    ));
                }
            }
            for (key, val) in obj {
                path.push(PathSegment::Key(key.clone()));
                match schema.properties.get(key) {
                    Some(prop_schema) => validate_node(prop_schema, val, path, out),
                    None if !schema.additional_properties => out.push(Violation::new(
                        path.clone(),
                        ViolationCode::UnknownPropertyRejected,
                        format!("property '{key}' is not declared and additionalProperties is false"),
                    )),
                    None => {}
                }
                path.pop();
            }
            check_enum(schema, value, path, out);
        }
        SchemaType::Array => {
            let Some(arr) = value.as_array() else {
                out.push(type_mismatch(schema, value, path));
                return;
            };
            if let Some(items) = &schema.items {
                for (i, elem) in arr.iter().enumerate() {
                    path.push(PathSegment::Index(i));
                    validate_node(items, elem, path, out);
                    path.pop();
                }
            }
            check_enum(schema, value, path, out);
        }
    }
}

fn type_mismatch(schema: &Schema, value: &Value, path: &[PathSegment]) -> Violation {
    Violation::new(
        path.to_vec(),
        ViolationCode::TypeMismatch,
        format!(
            "expected {}, got {}",
            schema.ty.as_str(),
            SchemaType::of(value)
        ),
    )
}

fn check_numeric_bounds(schema: &Schema, n: f64, path: &[PathSegment], out: &mut Vec<Violation>) {
    if let Some(min) = schema.min {
        if n < min {
            out.push(Violation::new(
                path.to_vec(),
                ViolationCode::OutOfRange,
                format!("{n} is less than minimum {min}"),
            ));
        }
    }
    if let Some(max) = schema.max {
        if n > max {
            out.push(Violation::new(
                path.to_vec(),
                ViolationCode::OutOfRange,
                format!("{n} is greater than maximum {max}"),
            ));
        }
    }
}

fn check_enum(schema: &Schema, value: &Value, path: &[PathSegment], out: &mut Vec<Violation>) {
    if let Some(values) = &schema.enum_values {
        if !values.iter().any(|v| v == value) {
            out.push(Violation::new(
                path.to_vec(),
                ViolationCode::EnumViolation,
                format!("{value} is not one of the allowed enum values"),
            ));
        }
    }
}
