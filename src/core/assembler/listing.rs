// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Symbol listing output.

use std::io::{self, Write};

use serde_json::{json, Value as Json};

use crate::core::scope::ExportedSymbol;
use crate::core::value::Value;

fn format_value(value: &Value) -> String {
    match value {
        Value::Integer(n) if *n >= 0 => format!("${n:04X}"),
        Value::String(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}

/// Write `name = $XXXX ; kind` lines, one per symbol.
pub fn write_symbols<W: Write>(out: &mut W, symbols: &[ExportedSymbol]) -> io::Result<()> {
    let width = symbols.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for symbol in symbols {
        writeln!(
            out,
            "{:<width$} = {} ; {}",
            symbol.name,
            format_value(&symbol.value),
            symbol.kind
        )?;
    }
    Ok(())
}

fn value_json(value: &Value) -> Json {
    match value {
        Value::Undefined => Json::Null,
        Value::Integer(n) => json!(n),
        Value::Float(f) => json!(f),
        Value::Boolean(b) => json!(b),
        Value::Char(c) => json!(c.to_string()),
        Value::String(s) => json!(s.as_ref()),
        Value::Array(items) => Json::Array(items.iter().map(value_json).collect()),
        Value::Dictionary(entries) => Json::Array(
            entries
                .iter()
                .map(|(k, v)| json!([value_json(k), value_json(v)]))
                .collect(),
        ),
        Value::Callable(_) => Json::Null,
    }
}

/// Listing as a JSON array of `{name, kind, value, address, bank}` objects.
pub fn symbols_json(symbols: &[ExportedSymbol]) -> Json {
    let entries = symbols
        .iter()
        .map(|symbol| {
            let address = match (&symbol.value, symbol.bank) {
                (Value::Integer(n), Some(_)) => json!(n),
                _ => Json::Null,
            };
            json!({
                "name": symbol.name,
                "kind": symbol.kind,
                "value": value_json(&symbol.value),
                "address": address,
                "bank": symbol.bank,
            })
        })
        .collect();
    Json::Array(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<ExportedSymbol> {
        vec![
            ExportedSymbol {
                name: "main".to_string(),
                kind: "label",
                value: Value::Integer(0x1000),
                bank: Some(0),
            },
            ExportedSymbol {
                name: "greeting".to_string(),
                kind: "constant",
                value: Value::string("hi"),
                bank: None,
            },
        ]
    }

    #[test]
    fn text_listing_pads_names() {
        let mut out = Vec::new();
        write_symbols(&mut out, &sample()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("main     = $1000 ; label"));
        assert!(text.contains("greeting = "));
    }

    #[test]
    fn json_listing_marks_addresses() {
        let json = symbols_json(&sample());
        assert_eq!(json[0]["address"], json!(0x1000));
        assert_eq!(json[0]["bank"], json!(0));
        assert_eq!(json[1]["address"], Json::Null);
        assert_eq!(json[1]["value"], json!("hi"));
    }
}
