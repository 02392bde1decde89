use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{flatten_scalars, format_scalar};

/// Render the calculation summary, IRR list and schedule as tables.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => print_envelope(result, map),
            _ => print_fields(map),
        },
        Value::Array(rows) => print_rows(rows),
        _ => println!("{value}"),
    }
}

fn print_envelope(result: &Map<String, Value>, envelope: &Map<String, Value>) {
    print_fields(result);

    if let Some(Value::Array(irrs)) = result.get("irrs") {
        println!("\nCash-flow IRRs:");
        print_rows(irrs);
    }
    if let Some(Value::Array(schedule)) = result.get("schedule") {
        println!("\nSchedule:");
        print_rows(schedule);
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {w}");
            }
        }
    }
    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {meth}");
    }
}

fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in flatten_scalars(map) {
        builder.push_record([key, format_scalar(&val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        println!("(empty)");
        return;
    };
    let headers: Vec<String> = flatten_scalars(first).into_iter().map(|(k, _)| k).collect();
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for row in rows.iter().filter_map(Value::as_object) {
        let flat = flatten_scalars(row);
        let cells: Vec<String> = headers
            .iter()
            .map(|h| {
                flat.iter()
                    .find(|(k, _)| k == h)
                    .map(|(_, v)| format_scalar(v))
                    .unwrap_or_default()
            })
            .collect();
        builder.push_record(cells);
    }
    println!("{}", Table::from(builder));
}
