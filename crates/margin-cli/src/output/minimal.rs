use serde_json::Value;

use super::format_scalar;

/// Print only the headline number: the all-in margin for a calculation,
/// the annualised IRR for a raw cash-flow list.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Array(rows) = result {
        println!("{} periods", rows.len());
        return;
    }

    let priority_keys = ["all_in_margin", "irr", "wal_years", "periodic_irr"];
    if let Value::Object(map) = result {
        for key in priority_keys {
            match map.get(key) {
                Some(Value::Null) => {
                    println!("{key}: undefined");
                    return;
                }
                Some(val) => {
                    println!("{}", format_scalar(val));
                    return;
                }
                None => {}
            }
        }
        if let Some((key, val)) = map.iter().next() {
            println!("{key}: {}", format_scalar(val));
            return;
        }
    }

    println!("{}", format_scalar(result));
}
