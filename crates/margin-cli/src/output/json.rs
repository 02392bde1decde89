use serde_json::Value;

/// Pretty-print the calculation output as JSON.
pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => log::error!("Could not render JSON output: {e}"),
    }
}
