//! Per-field validation rules. Every failing rule yields one violation; nothing short-circuits.

use super::Field;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One failed rule: what went wrong and on which field path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub message: String,
    pub path: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            message: message.into(),
            path: path.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Email,
    Uuid,
}

#[derive(Clone, Debug, Default)]
pub struct ValidationRule {
    pub required: bool,
    pub format: Option<Format>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub allowed: Option<Vec<Value>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl ValidationRule {
    pub fn new() -> Self {
        ValidationRule::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn pattern(mut self, re: Regex) -> Self {
        self.pattern = Some(re);
        self
    }

    pub fn allowed(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.allowed = Some(values.into_iter().collect());
        self
    }

    pub fn minimum(mut self, n: f64) -> Self {
        self.minimum = Some(n);
        self
    }

    pub fn maximum(mut self, n: f64) -> Self {
        self.maximum = Some(n);
        self
    }

    /// Violations of this rule by a present value. Null passes every rule except `required`.
    pub fn check(&self, path: &str, v: &Value, out: &mut Vec<Violation>) {
        if v.is_null() {
            if self.required {
                out.push(Violation::new(path, format!("{} is required", path)));
            }
            return;
        }
        if let Some(format) = self.format {
            check_format(path, v, format, out);
        }
        if let Some(s) = v.as_str() {
            let len = s.chars().count();
            if let Some(max) = self.max_length {
                if len > max {
                    out.push(Violation::new(
                        path,
                        format!("{} must be at most {} characters", path, max),
                    ));
                }
            }
            if let Some(min) = self.min_length {
                if len < min {
                    out.push(Violation::new(
                        path,
                        format!("{} must be at least {} characters", path, min),
                    ));
                }
            }
            if let Some(re) = &self.pattern {
                if !re.is_match(s) {
                    out.push(Violation::new(
                        path,
                        format!("{} does not match required pattern", path),
                    ));
                }
            }
        }
        if let Some(allowed) = &self.allowed {
            if !allowed.iter().any(|a| value_eq(v, a)) {
                out.push(Violation::new(
                    path,
                    format!(
                        "{} must be one of: {:?}",
                        path,
                        allowed.iter().take(5).collect::<Vec<_>>()
                    ),
                ));
            }
        }
        if let Some(n) = v.as_f64() {
            if let Some(min) = self.minimum {
                if n < min {
                    out.push(Violation::new(path, format!("{} must be at least {}", path, min)));
                }
            }
            if let Some(max) = self.maximum {
                if n > max {
                    out.push(Violation::new(path, format!("{} must be at most {}", path, max)));
                }
            }
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(path: &str, v: &Value, format: Format, out: &mut Vec<Violation>) {
    let Some(s) = v.as_str() else { return };
    match format {
        Format::Email => {
            if !s.contains('@') || s.len() < 3 {
                out.push(Violation::new(path, format!("{} must be a valid email", path)));
            }
        }
        Format::Uuid => {
            if uuid::Uuid::parse_str(s).is_err() {
                out.push(Violation::new(path, format!("{} must be a valid UUID", path)));
            }
        }
    }
}

/// Validate the writable fields present in `input` (partial update).
pub fn validate_present<M>(fields: &[Field<M>], input: &Map<String, Value>) -> Vec<Violation> {
    let mut out = Vec::new();
    for field in fields.iter().filter(|f| f.is_writable()) {
        if let (Some(rule), Some(v)) = (field.validation_rule(), input.get(field.name())) {
            rule.check(field.name(), v, &mut out);
        }
    }
    out
}

/// Required fields missing from `data` (creation).
pub fn validate_required<M>(fields: &[Field<M>], data: &Map<String, Value>) -> Vec<Violation> {
    fields
        .iter()
        .filter(|f| f.validation_rule().map(|r| r.required).unwrap_or(false))
        .filter(|f| data.get(f.name()).map(Value::is_null).unwrap_or(true))
        .map(|f| Violation::new(f.name(), format!("{} is required", f.name())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn violations(rule: &ValidationRule, v: Value) -> Vec<Violation> {
        let mut out = Vec::new();
        rule.check("field", &v, &mut out);
        out
    }

    #[test]
    fn every_failing_rule_is_reported() {
        let rule = ValidationRule::new()
            .format(Format::Email)
            .min_length(10)
            .pattern(Regex::new("^[a-z]+$").unwrap());
        let out = violations(&rule, json!("X1"));
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| v.path == "field"));
    }

    #[test]
    fn null_only_fails_required() {
        let rule = ValidationRule::new().min_length(3);
        assert!(violations(&rule, Value::Null).is_empty());
        let rule = rule.required();
        assert_eq!(violations(&rule, Value::Null).len(), 1);
    }

    #[test]
    fn numeric_bounds_and_allowed_values() {
        let rule = ValidationRule::new().minimum(1.0).maximum(5.0);
        assert!(violations(&rule, json!(3)).is_empty());
        assert_eq!(violations(&rule, json!(9))[0].message, "field must be at most 5");
        let rule = ValidationRule::new().allowed([json!("a"), json!(2)]);
        assert!(violations(&rule, json!(2.0)).is_empty());
        assert_eq!(violations(&rule, json!("b")).len(), 1);
    }

    #[test]
    fn uuid_format() {
        let rule = ValidationRule::new().format(Format::Uuid);
        assert!(violations(&rule, json!(uuid::Uuid::new_v4().to_string())).is_empty());
        assert_eq!(violations(&rule, json!("nope")).len(), 1);
    }
}
