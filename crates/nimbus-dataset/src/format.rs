//! File format codecs for dataset content.
//!
//! Four formats round-trip through the table engine: JSON arrays, JSON
//! Lines (optionally nested one level to carry grouped records), CSV, and
//! raw newline-delimited text. Parsing tolerates a UTF-8 BOM.

use crate::error::{DatasetError, DatasetResult};
use crate::table::{Row, Table, PACK_COLUMN};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Dataset file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FormatType {
    /// A single JSON array of records (or of record groups).
    Json,
    /// One JSON record (or record group) per line.
    Jsonl,
    /// Comma-separated values with a header row.
    Csv,
    /// Raw text, one record per line.
    Text,
}

impl FormatType {
    /// The canonical file extension for this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Jsonl => "jsonl",
            Self::Csv => "csv",
            Self::Text => "txt",
        }
    }

    /// Infers a format from a file extension.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" => Some(Self::Jsonl),
            "csv" => Some(Self::Csv),
            "txt" | "text" => Some(Self::Text),
            _ => None,
        }
    }

    /// Infers a format from a file path's suffix.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|ext| ext.to_str()).and_then(Self::from_extension)
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Parsed file content, either flat rows or one level of grouping.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedContent {
    /// Ungrouped records.
    Flat(Vec<Row>),
    /// Records grouped one level deep (conversation-style data).
    Grouped(Vec<Vec<Row>>),
}

impl ParsedContent {
    /// Total number of leaf records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        match self {
            Self::Flat(rows) => rows.len(),
            Self::Grouped(groups) => groups.iter().map(Vec::len).sum(),
        }
    }
}

fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

fn value_to_row(value: Value) -> DatasetResult<Row> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(DatasetError::Format(format!("expected a JSON object, got {other}"))),
    }
}

fn value_to_group(value: Value) -> DatasetResult<Vec<Row>> {
    match value {
        Value::Array(records) => records.into_iter().map(value_to_row).collect(),
        other => Err(DatasetError::Format(format!("expected a JSON array, got {other}"))),
    }
}

/// Parses raw content into records per the given format.
pub fn parse(format: FormatType, content: &str) -> DatasetResult<ParsedContent> {
    let content = strip_bom(content);
    match format {
        FormatType::Json => parse_json(content),
        FormatType::Jsonl => parse_jsonl(content),
        FormatType::Csv => parse_csv(content),
        FormatType::Text => Ok(parse_text(content)),
    }
}

fn parse_json(content: &str) -> DatasetResult<ParsedContent> {
    let value: Value = serde_json::from_str(content)?;
    match value {
        Value::Object(fields) => Ok(ParsedContent::Flat(vec![fields])),
        Value::Array(items) => {
            if items.iter().all(|item| item.is_array()) && !items.is_empty() {
                let groups =
                    items.into_iter().map(value_to_group).collect::<DatasetResult<Vec<_>>>()?;
                Ok(ParsedContent::Grouped(groups))
            } else {
                let rows =
                    items.into_iter().map(value_to_row).collect::<DatasetResult<Vec<_>>>()?;
                Ok(ParsedContent::Flat(rows))
            }
        }
        other => Err(DatasetError::Format(format!(
            "json content must be an object or an array, got {other}"
        ))),
    }
}

fn parse_jsonl(content: &str) -> DatasetResult<ParsedContent> {
    let mut lines = content.lines().map(str::trim).filter(|line| !line.is_empty()).peekable();
    let grouped = matches!(lines.peek(), Some(first) if first.starts_with('['));
    if grouped {
        let mut groups = Vec::new();
        for line in lines {
            groups.push(value_to_group(serde_json::from_str(line)?)?);
        }
        Ok(ParsedContent::Grouped(groups))
    } else {
        let mut rows = Vec::new();
        for line in lines {
            rows.push(value_to_row(serde_json::from_str(line)?)?);
        }
        Ok(ParsedContent::Flat(rows))
    }
}

fn parse_csv(content: &str) -> DatasetResult<ParsedContent> {
    let mut reader = csv::ReaderBuilder::new().from_reader(content.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Row::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            row.insert(header.clone(), Value::String(field.to_string()));
        }
        rows.push(row);
    }
    Ok(ParsedContent::Flat(rows))
}

fn parse_text(content: &str) -> ParsedContent {
    let rows = content
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut row = Row::new();
            row.insert("text".to_string(), Value::String(line.to_string()));
            row
        })
        .collect();
    ParsedContent::Flat(rows)
}

/// Serializes a table per the given format.
///
/// Grouped tables serialize through their packed representation for JSON
/// and JSON Lines, producing one array per group; CSV and text reject
/// packed payloads.
pub fn serialize(table: &Table, format: FormatType) -> DatasetResult<String> {
    match format {
        FormatType::Json => serialize_json(table),
        FormatType::Jsonl => serialize_jsonl(table),
        FormatType::Csv => serialize_csv(table),
        FormatType::Text => serialize_text(table),
    }
}

fn group_cells(table: &Table) -> DatasetResult<Option<Vec<Value>>> {
    if table.is_packed() {
        let cells = table
            .column(PACK_COLUMN)
            .ok_or_else(|| DatasetError::ColumnNotFound(PACK_COLUMN.to_string()))?;
        return Ok(Some(cells.values().to_vec()));
    }
    if table.is_grouped() {
        let mut packed = table.clone();
        if !packed.pack() {
            return Err(DatasetError::Format(
                "grouped table could not be packed for serialization".to_string(),
            ));
        }
        return group_cells(&packed);
    }
    Ok(None)
}

fn serialize_json(table: &Table) -> DatasetResult<String> {
    let value = match group_cells(table)? {
        Some(groups) => Value::Array(groups),
        None => Value::Array(table.rows().map(Value::Object).collect()),
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

fn serialize_jsonl(table: &Table) -> DatasetResult<String> {
    let values: Vec<Value> = match group_cells(table)? {
        Some(groups) => groups,
        None => table.rows().map(Value::Object).collect(),
    };
    let mut lines = Vec::with_capacity(values.len());
    for value in values {
        lines.push(serde_json::to_string(&value)?);
    }
    Ok(lines.join("\n"))
}

fn serialize_csv(table: &Table) -> DatasetResult<String> {
    if table.is_packed() || table.is_grouped() {
        return Err(DatasetError::Format(
            "grouped or packed tables cannot serialize to csv".to_string(),
        ));
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.column_names())?;
    for row in table.rows() {
        let record: Vec<String> = table
            .column_names()
            .iter()
            .map(|name| match row.get(*name) {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        writer.write_record(&record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| DatasetError::Format(format!("csv writer flush failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| DatasetError::Format(e.to_string()))
}

fn serialize_text(table: &Table) -> DatasetResult<String> {
    if table.column_count() != 1 || table.is_packed() {
        return Err(DatasetError::Format(
            "text serialization requires exactly one plain column".to_string(),
        ));
    }
    let name = table.column_names()[0].to_string();
    let lines: Vec<String> = table
        .rows()
        .map(|row| match row.get(&name) {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        })
        .collect();
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_inference() {
        assert_eq!(FormatType::from_extension("JSONL"), Some(FormatType::Jsonl));
        assert_eq!(FormatType::from_path(Path::new("data/set.csv")), Some(FormatType::Csv));
        assert_eq!(FormatType::from_extension("parquet"), None);
    }

    #[test]
    fn test_parse_json_array() {
        let parsed = parse(FormatType::Json, r#"[{"a": 1}, {"a": 2}]"#).unwrap();
        match parsed {
            ParsedContent::Flat(rows) => assert_eq!(rows.len(), 2),
            ParsedContent::Grouped(_) => panic!("expected flat content"),
        }
    }

    #[test]
    fn test_parse_json_nested_groups() {
        let parsed = parse(FormatType::Json, r#"[[{"a": 1}, {"a": 2}], [{"a": 3}]]"#).unwrap();
        match parsed {
            ParsedContent::Grouped(groups) => {
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0].len(), 2);
            }
            ParsedContent::Flat(_) => panic!("expected grouped content"),
        }
    }

    #[test]
    fn test_parse_jsonl_flat_and_grouped() {
        let flat = parse(FormatType::Jsonl, "{\"a\": 1}\n{\"a\": 2}\n").unwrap();
        assert_eq!(flat.record_count(), 2);

        let grouped = parse(FormatType::Jsonl, "[{\"a\": 1}, {\"a\": 2}]\n[{\"a\": 3}]").unwrap();
        match grouped {
            ParsedContent::Grouped(groups) => assert_eq!(groups.len(), 2),
            ParsedContent::Flat(_) => panic!("expected grouped content"),
        }
    }

    #[test]
    fn test_parse_csv_with_bom() {
        let parsed = parse(FormatType::Csv, "\u{feff}a,b\n1,x\n2,y\n").unwrap();
        match parsed {
            ParsedContent::Flat(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0]["a"], json!("1"));
                assert_eq!(rows[1]["b"], json!("y"));
            }
            ParsedContent::Grouped(_) => panic!("expected flat content"),
        }
    }

    #[test]
    fn test_parse_text_one_column() {
        let parsed = parse(FormatType::Text, "first\nsecond\n").unwrap();
        match parsed {
            ParsedContent::Flat(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0]["text"], json!("first"));
            }
            ParsedContent::Grouped(_) => panic!("expected flat content"),
        }
    }

    #[test]
    fn test_serialize_jsonl_round_trip() {
        let table = Table::from_columns(vec![(
            "a".to_string(),
            vec![json!(1), json!(2)],
        )])
        .unwrap();
        let text = serialize(&table, FormatType::Jsonl).unwrap();
        let parsed = parse(FormatType::Jsonl, &text).unwrap();
        assert_eq!(parsed.record_count(), 2);
    }

    #[test]
    fn test_serialize_grouped_as_nested_jsonl() {
        let table = Table::from_columns(vec![
            ("_group".to_string(), vec![json!(0), json!(0), json!(1)]),
            ("x".to_string(), vec![json!("a"), json!("b"), json!("c")]),
        ])
        .unwrap();
        let text = serialize(&table, FormatType::Jsonl).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
    }

    #[test]
    fn test_serialize_csv_rejects_grouped() {
        let table = Table::from_columns(vec![
            ("_group".to_string(), vec![json!(0)]),
            ("x".to_string(), vec![json!("a")]),
        ])
        .unwrap();
        assert!(serialize(&table, FormatType::Csv).is_err());
    }

    #[test]
    fn test_serialize_csv_round_trip() {
        let table = Table::from_columns(vec![
            ("a".to_string(), vec![json!("1"), json!("2")]),
            ("b".to_string(), vec![json!("x"), json!("y")]),
        ])
        .unwrap();
        let text = serialize(&table, FormatType::Csv).unwrap();
        let parsed = parse(FormatType::Csv, &text).unwrap();
        assert_eq!(parsed.record_count(), 2);
    }
}
