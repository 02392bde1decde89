pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Scalar fields of a (possibly nested) object as `parent.child` keys.
/// Arrays are skipped; the schedule and IRR lists get their own tables.
pub(crate) fn flatten_scalars(map: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_into(None, map, &mut out);
    out
}

fn flatten_into(prefix: Option<&str>, map: &Map<String, Value>, out: &mut Vec<(String, Value)>) {
    for (key, val) in map {
        let name = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.clone(),
        };
        match val {
            Value::Object(inner) => flatten_into(Some(&name), inner, out),
            Value::Array(_) => {}
            _ => out.push((name, val.clone())),
        }
    }
}

pub(crate) fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_and_skip_arrays() {
        let value = json!({
            "all_in_margin": "0.0157",
            "breakdown": { "spread": "0.0158", "reserve_impact": null },
            "schedule": [ { "period": 0 } ]
        });
        let flat = flatten_scalars(value.as_object().unwrap());
        let keys: Vec<&str> = flat.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["all_in_margin", "breakdown.spread", "breakdown.reserve_impact"]);
    }

    #[test]
    fn test_null_formats_empty() {
        assert_eq!(format_scalar(&Value::Null), "");
        assert_eq!(format_scalar(&json!(true)), "true");
    }
}
