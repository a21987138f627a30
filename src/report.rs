//! Provenance report artifact.
//!
//! One CSV-like file per report name inside a mutant directory, opened in
//! append mode. Rows have no header:
//!
//! ```text
//! nab_1,12,"nab_0","c","z"
//! nab_0,12,"a","b","NULL"
//! ```
//!
//! With [`ReportLayout::OperandsWithOpcode`] a quoted opcode column sits
//! between the two operands. Text fields are quoted, embedded quotes doubled.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ReportError;
use crate::mutators::ledger::{MutationRecord, Operand};

const NULL: &str = "NULL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLayout {
    /// `id,line,"op1","op2","result"`
    Operands,
    /// `id,line,"op1","opcode","op2","result"`
    OperandsWithOpcode,
}

pub fn report_path(dir: &Path, report_name: &str) -> PathBuf {
    dir.join(format!("{report_name}.csv"))
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn operand_field(operand: Option<&Operand>) -> String {
    quote(operand.map_or(NULL, Operand::display))
}

pub fn format_row(record: &MutationRecord, layout: ReportLayout) -> String {
    let mut row = format!("{},{},{},", record.id, record.line, operand_field(record.lhs.as_ref()));
    if layout == ReportLayout::OperandsWithOpcode {
        let opcode = record.opcode.map_or(NULL, |op| op.symbol());
        row.push_str(&quote(opcode));
        row.push(',');
    }
    row.push_str(&operand_field(record.rhs.as_ref()));
    row.push(',');
    row.push_str(&quote(record.result.as_deref().unwrap_or(NULL)));
    row.push('\n');
    row
}

/// Appends `records` to the report, newest first.
pub fn append(dir: &Path, report_name: &str, layout: ReportLayout, records: &[MutationRecord]) -> Result<(), ReportError> {
    let path = report_path(dir, report_name);
    let io_err = |source| ReportError::Io {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(dir).map_err(io_err)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_err)?;

    let body: String = records.iter().rev().map(|r| format_row(r, layout)).collect();
    file.write_all(body.as_bytes()).map_err(io_err)?;
    debug!(path = %path.display(), rows = records.len(), "report written");
    Ok(())
}

/// A parsed report row. Absent values read back as `NULL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub id: String,
    pub line: u32,
    pub lhs: String,
    pub opcode: Option<String>,
    pub rhs: String,
    pub result: String,
}

impl ReportRow {
    pub fn result(&self) -> Option<&str> {
        (self.result != NULL).then_some(self.result.as_str())
    }
}

pub fn read_report(path: &Path) -> Result<Vec<ReportRow>, ReportError> {
    let content = fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_report(&content)
}

pub fn parse_report(content: &str) -> Result<Vec<ReportRow>, ReportError> {
    split_rows(content)?
        .into_iter()
        .enumerate()
        .map(|(row, fields)| row_from_fields(row, fields))
        .collect()
}

fn row_from_fields(row: usize, mut fields: Vec<String>) -> Result<ReportRow, ReportError> {
    let opcode = match fields.len() {
        5 => None,
        6 => Some(fields.remove(3)),
        n => {
            return Err(ReportError::Malformed {
                row,
                reason: format!("expected 5 or 6 fields, found {n}"),
            })
        }
    };
    let mut it = fields.into_iter();
    let mut next = || it.next().unwrap_or_default();
    let id = next();
    let line_text = next();
    let line = line_text.parse().map_err(|_| ReportError::Malformed {
        row,
        reason: format!("line `{line_text}` is not a number"),
    })?;
    Ok(ReportRow {
        id,
        line,
        lhs: next(),
        opcode,
        rhs: next(),
        result: next(),
    })
}

/// Splits content into rows of fields. Quoted fields may span lines.
fn split_rows(content: &str) -> Result<Vec<Vec<String>>, ReportError> {
    let mut rows = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\n' => {
                fields.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut fields));
            }
            '\r' => {}
            _ => field.push(ch),
        }
    }
    if in_quotes {
        return Err(ReportError::Malformed {
            row: rows.len(),
            reason: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        rows.push(fields);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::BinaryOpcode;

    fn sample() -> Vec<MutationRecord> {
        let mut second = MutationRecord::binary(
            "nab_1",
            3,
            Operand::chain_link("a + b", BinaryOpcode::Add),
            BinaryOpcode::Add,
            Operand::leaf("s.len(\"x\")"),
        );
        second.lhs.as_mut().unwrap().resolve_to("nab_0");
        second.result = Some("z".into());
        vec![
            MutationRecord::binary("nab_0", 3, Operand::leaf("a"), BinaryOpcode::Add, Operand::leaf("b")),
            second,
            MutationRecord::bare("base_0", 1),
        ]
    }

    #[test]
    fn rows_are_written_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        append(dir.path(), "inax1_report", ReportLayout::Operands, &sample()).unwrap();
        let text = fs::read_to_string(report_path(dir.path(), "inax1_report")).unwrap();
        assert_eq!(
            text,
            "base_0,1,\"NULL\",\"NULL\",\"NULL\"\n\
             nab_1,3,\"nab_0\",\"s.len(\"\"x\"\")\",\"z\"\n\
             nab_0,3,\"a\",\"b\",\"NULL\"\n"
        );
    }

    #[test]
    fn round_trip_preserves_tuples_in_reverse_order() {
        let dir = tempfile::tempdir().unwrap();
        let records = sample();
        append(dir.path(), "r", ReportLayout::OperandsWithOpcode, &records).unwrap();
        let rows = read_report(&report_path(dir.path(), "r")).unwrap();

        let expected: Vec<_> = records
            .iter()
            .rev()
            .map(|r| {
                (
                    r.id.clone(),
                    r.line,
                    r.lhs.as_ref().map_or(NULL, Operand::display).to_string(),
                    r.rhs.as_ref().map_or(NULL, Operand::display).to_string(),
                    r.result.clone(),
                )
            })
            .collect();
        let got: Vec<_> = rows
            .iter()
            .map(|r| (r.id.clone(), r.line, r.lhs.clone(), r.rhs.clone(), r.result().map(str::to_string)))
            .collect();
        assert_eq!(got, expected);
        assert_eq!(rows[1].opcode.as_deref(), Some("+"));
    }

    #[test]
    fn appends_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let one = vec![MutationRecord::bare("base_0", 1)];
        append(dir.path(), "r", ReportLayout::Operands, &one).unwrap();
        append(dir.path(), "r", ReportLayout::Operands, &one).unwrap();
        assert_eq!(read_report(&report_path(dir.path(), "r")).unwrap().len(), 2);
    }

    #[test]
    fn multi_line_operands_survive() {
        let row = "nab_0,7,\"a\n    + b\",\"c\",\"NULL\"\n";
        let rows = parse_report(row).unwrap();
        assert_eq!(rows[0].lhs, "a\n    + b");
        assert_eq!(rows[0].result(), None);
    }

    #[test]
    fn malformed_rows_are_rejected() {
        assert!(parse_report("nab_0,x,\"a\",\"b\",\"NULL\"\n").is_err());
        assert!(parse_report("nab_0,1,\"a\"\n").is_err());
        assert!(parse_report("nab_0,1,\"a,\"b\",\"c\",\"d\"\n").is_err());
    }
}
