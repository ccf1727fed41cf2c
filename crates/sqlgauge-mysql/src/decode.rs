//! Cell decoding for MySQL result rows.
//!
//! Statements run over the text protocol, so every non-NULL cell arrives
//! as text. The column type decides how that text is interpreted.

use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use sqlgauge_core::{Row, Value};

/// How a column's text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Signed,
    Unsigned,
    Float,
    Decimal,
    Text,
}

/// Map a MySQL type name (as reported by sqlx) to a [`ColumnKind`].
pub fn column_kind(type_name: &str) -> ColumnKind {
    let upper = type_name.to_ascii_uppercase();
    let (base, unsigned) = match upper.strip_suffix(" UNSIGNED") {
        Some(base) => (base, true),
        None => (upper.as_str(), false),
    };

    match base {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "BOOLEAN" | "YEAR" => {
            if unsigned {
                ColumnKind::Unsigned
            } else {
                ColumnKind::Signed
            }
        }
        "FLOAT" | "DOUBLE" => ColumnKind::Float,
        "DECIMAL" => ColumnKind::Decimal,
        _ => ColumnKind::Text,
    }
}

/// Interpret a cell's text. Numbers that fail to parse stay text, so the
/// parser will treat them as labels or skip them.
pub fn decode_text(kind: ColumnKind, text: String) -> Value {
    match kind {
        ColumnKind::Signed => match text.parse() {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Text(text),
        },
        ColumnKind::Unsigned => match text.parse() {
            Ok(v) => Value::UInt(v),
            Err(_) => Value::Text(text),
        },
        ColumnKind::Float => match text.parse() {
            Ok(v) => Value::Float(v),
            Err(_) => Value::Text(text),
        },
        ColumnKind::Decimal => Value::Decimal(text),
        ColumnKind::Text => Value::Text(text),
    }
}

/// Decode a full row in column order.
pub fn decode_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), decode_cell(row, column.ordinal())))
        .collect()
}

fn decode_cell(row: &MySqlRow, index: usize) -> Value {
    let kind = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => column_kind(raw.type_info().name()),
        Err(_) => return Value::Null,
    };

    let text = match row.try_get_unchecked::<String, _>(index) {
        Ok(text) => text,
        Err(_) => match row.try_get_unchecked::<Vec<u8>, _>(index) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => return Value::Null,
        },
    };
    decode_text(kind, text)
}
