use serde_json::{Map, Value};
use std::io;

use super::{flatten_scalars, format_scalar};

/// Write output as CSV to stdout. Schedules become one row per period
/// using the export column headers; summaries become field/value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let written = match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => write_fields(&mut wtr, result),
            _ => write_fields(&mut wtr, map),
        },
        Value::Array(rows) => write_rows(&mut wtr, rows),
        _ => wtr.write_record([format_scalar(value)]),
    };

    if let Err(e) = written.and_then(|_| wtr.flush().map_err(csv::Error::from)) {
        log::error!("Could not write CSV output: {e}");
    }
}

fn write_fields<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    map: &Map<String, Value>,
) -> csv::Result<()> {
    wtr.write_record(["field", "value"])?;
    for (key, val) in flatten_scalars(map) {
        wtr.write_record([key, format_scalar(&val)])?;
    }
    Ok(())
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) -> csv::Result<()> {
    let Some(Value::Object(first)) = rows.first() else {
        return Ok(());
    };
    let headers: Vec<&String> = first.keys().collect();
    wtr.write_record(&headers)?;
    for row in rows.iter().filter_map(Value::as_object) {
        wtr.write_record(
            headers
                .iter()
                .map(|h| row.get(h.as_str()).map(format_scalar).unwrap_or_default()),
        )?;
    }
    Ok(())
}
