//! Source-list import from JSON, CSV and XLSX files.
//!
//! Each format is first decoded into records (column name → cell text), then
//! every record is mapped onto a [`SourceCandidate`] through the declarative
//! alias table [`SOURCE_COLUMNS`]. Records without a URL are dropped. Any
//! decoding failure aborts the whole import.
//!
//! XLSX decoding reads the lowest-numbered worksheet directly from the OOXML
//! package; legacy `.xls` workbooks go through `calamine` and use the first
//! sheet. In both, the first non-blank row is the header.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use calamine::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use crate::models::Source;

/// Maximum cells read from a worksheet; larger sheets are rejected.
const XLSX_MAX_CELLS: usize = 100_000;
/// Columns in a worksheet (`A` ..= `XFD`).
const XLSX_MAX_COLUMNS: usize = 16_384;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
const SHARED_STRINGS: &str = "xl/sharedStrings.xml";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unsupported file type: {0} (expected .json, .csv, .xlsx or .xls)")]
    UnsupportedFormat(String),
    #[error("JSON import failed: {0}")]
    Json(String),
    #[error("CSV import failed: {0}")]
    Csv(String),
    #[error("XLSX import failed: {0}")]
    Xlsx(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Json,
    Csv,
    Xlsx,
    /// Legacy binary Excel (BIFF).
    Xls,
}

impl ImportFormat {
    /// Pick the format from the file extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Result<Self, ImportError> {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            "xls" => Ok(Self::Xls),
            _ => Err(ImportError::UnsupportedFormat(name.to_string())),
        }
    }
}

/// One decoded row: column name → trimmed cell text.
pub type Record = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceField {
    Name,
    Url,
    Target,
}

/// Column names accepted for a field, tried in order, and the value used
/// when none of them holds a non-empty value.
#[derive(Debug)]
pub struct ColumnAlias {
    pub field: SourceField,
    pub aliases: &'static [&'static str],
    pub fallback: &'static str,
}

pub const SOURCE_COLUMNS: &[ColumnAlias] = &[
    ColumnAlias {
        field: SourceField::Name,
        aliases: &["name", "名称", "Name"],
        fallback: "未命名",
    },
    ColumnAlias {
        field: SourceField::Url,
        aliases: &["url", "网址", "URL"],
        fallback: "",
    },
    ColumnAlias {
        field: SourceField::Target,
        aliases: &["target", "目标", "检索目标", "Target"],
        fallback: "",
    },
];

/// A `{name, url, target}` triple extracted from an import file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate {
    pub name: String,
    pub url: String,
    pub target: String,
}

impl SourceCandidate {
    /// Turn the candidate into a new enabled source with a fresh id.
    pub fn into_source(self) -> Source {
        Source {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            url: self.url,
            target: self.target,
            enabled: true,
        }
    }
}

fn resolve_field(record: &Record, field: SourceField) -> String {
    let Some(alias) = SOURCE_COLUMNS.iter().find(|c| c.field == field) else {
        return String::new();
    };
    alias
        .aliases
        .iter()
        .filter_map(|a| record.get(*a))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .unwrap_or(alias.fallback)
        .to_string()
}

/// Map a record through [`SOURCE_COLUMNS`]. `None` when it has no URL.
pub fn map_record(record: &Record) -> Option<SourceCandidate> {
    let url = resolve_field(record, SourceField::Url);
    if url.is_empty() {
        return None;
    }
    Some(SourceCandidate {
        name: resolve_field(record, SourceField::Name),
        url,
        target: resolve_field(record, SourceField::Target),
    })
}

/// Decode `bytes` according to the extension of `file_name` and extract
/// source candidates.
pub fn parse_sources(file_name: &str, bytes: &[u8]) -> Result<Vec<SourceCandidate>, ImportError> {
    let records = match ImportFormat::from_file_name(file_name)? {
        ImportFormat::Json => json_records(bytes)?,
        ImportFormat::Csv => table_records(csv_rows(bytes)?),
        ImportFormat::Xlsx => table_records(xlsx_rows(bytes)?),
        ImportFormat::Xls => table_records(xls_rows(bytes)?),
    };
    Ok(records.iter().filter_map(map_record).collect())
}

// ============ JSON ============

fn json_records(bytes: &[u8]) -> Result<Vec<Record>, ImportError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| ImportError::Json(e.to_string()))?;
    let items = value
        .as_array()
        .ok_or_else(|| ImportError::Json("top-level value must be an array".to_string()))?;

    Ok(items
        .iter()
        .map(|item| {
            item.as_object()
                .map(|obj| {
                    obj.iter()
                        .filter_map(|(k, v)| scalar_text(v).map(|s| (k.clone(), s)))
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect())
}

fn scalar_text(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ============ Tables (CSV / XLSX) ============

/// First non-blank row is the header; later non-blank rows become records.
fn table_records(rows: Vec<Vec<String>>) -> Vec<Record> {
    let mut rows = rows
        .into_iter()
        .filter(|r| r.iter().any(|c| !c.trim().is_empty()));
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let header: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();

    rows.map(|row| {
        header
            .iter()
            .zip(row)
            .filter(|(h, _)| !h.is_empty())
            .map(|(h, v)| (h.clone(), v.trim().to_string()))
            .collect()
    })
    .collect()
}

/// RFC 4180 CSV: comma separated, `"` quoting with `""` escapes, CRLF or LF
/// line endings. A leading UTF-8 BOM is ignored.
fn csv_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, ImportError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ImportError::Csv(e.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ImportError::Csv("unterminated quoted field".to_string()));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

// ============ XLSX ============

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ImportError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ImportError::Xlsx(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ImportError::Xlsx(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ImportError::Xlsx(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn xlsx_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, ImportError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ImportError::Xlsx(e.to_string()))?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let shared_strings = if names.iter().any(|n| n == SHARED_STRINGS) {
        let xml = read_zip_entry_bounded(&mut archive, SHARED_STRINGS, MAX_XML_ENTRY_BYTES)?;
        read_shared_strings(&xml)?
    } else {
        Vec::new()
    };

    let sheet = first_worksheet(&names)
        .ok_or_else(|| ImportError::Xlsx("workbook has no worksheets".to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, &sheet, MAX_XML_ENTRY_BYTES)?;
    read_sheet_rows(&xml, &shared_strings)
}

fn first_worksheet(names: &[String]) -> Option<String> {
    names
        .iter()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .min_by_key(|name| {
            name.trim_start_matches("xl/worksheets/sheet")
                .trim_end_matches(".xml")
                .parse::<u32>()
                .unwrap_or(u32::MAX)
        })
        .cloned()
}

/// Shared string table; rich-text runs of one `<si>` are concatenated and
/// phonetic (`<rPh>`) runs are skipped.
fn read_shared_strings(xml: &[u8]) -> Result<Vec<String>, ImportError> {
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" => in_t = !in_phonetic,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                let text = te.unescape().map_err(|e| ImportError::Xlsx(e.to_string()))?;
                if let Some(s) = current.as_mut() {
                    s.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ImportError::Xlsx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    SharedString,
    Other,
}

struct Cell {
    col: usize,
    kind: CellKind,
    value: String,
}

/// Zero-based column index from a cell reference such as `AB12`. `None`
/// when the reference has no column letters or lies past column `XFD`.
fn column_index(reference: &str) -> Option<usize> {
    let mut n = 0usize;
    let mut letters = 0;
    for c in reference.chars().take_while(|c| c.is_ascii_alphabetic()) {
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        n = n.checked_mul(26)?.checked_add(digit)?;
        if n > XLSX_MAX_COLUMNS {
            return None;
        }
        letters += 1;
    }
    (letters > 0).then(|| n - 1)
}

fn cell_attrs(e: &BytesStart<'_>, next_col: usize) -> Result<(usize, CellKind), ImportError> {
    let mut col = next_col;
    let mut kind = CellKind::Other;
    for attr in e.attributes().flatten() {
        let value = std::str::from_utf8(&attr.value).unwrap_or_default();
        match attr.key.as_ref() {
            b"r" => {
                col = column_index(value).ok_or_else(|| {
                    ImportError::Xlsx(format!("invalid cell reference '{}'", value))
                })?
            }
            b"t" if value == "s" => kind = CellKind::SharedString,
            _ => {}
        }
    }
    if col >= XLSX_MAX_COLUMNS {
        return Err(ImportError::Xlsx(format!(
            "worksheet has more than {} columns",
            XLSX_MAX_COLUMNS
        )));
    }
    Ok((col, kind))
}

fn read_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>, ImportError> {
    let mut rows = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut row: Option<Vec<String>> = None;
    let mut cell: Option<Cell> = None;
    let mut in_value = false;
    let mut next_col = 0usize;
    let mut cell_count = 0usize;

    loop {
        if cell_count > XLSX_MAX_CELLS {
            return Err(too_many_cells());
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row = Some(Vec::new());
                    next_col = 0;
                }
                b"c" => {
                    let (col, kind) = cell_attrs(&e, next_col)?;
                    cell = Some(Cell {
                        col,
                        kind,
                        value: String::new(),
                    });
                }
                // `<v>` holds the value; `<is><t>` holds an inline string.
                b"v" | b"t" => in_value = cell.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"c" {
                    let (col, _) = cell_attrs(&e, next_col)?;
                    next_col = col + 1;
                }
            }
            Ok(Event::Text(te)) if in_value => {
                let text = te.unescape().map_err(|e| ImportError::Xlsx(e.to_string()))?;
                if let Some(c) = cell.as_mut() {
                    c.value.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(c) = cell.take() {
                        next_col = c.col + 1;
                        cell_count += 1;
                        let text = match c.kind {
                            CellKind::SharedString => c
                                .value
                                .trim()
                                .parse::<usize>()
                                .ok()
                                .and_then(|i| shared_strings.get(i))
                                .cloned()
                                .unwrap_or_default(),
                            CellKind::Other => c.value,
                        };
                        if let Some(r) = row.as_mut() {
                            if r.len() <= c.col {
                                r.resize(c.col + 1, String::new());
                            }
                            r[c.col] = text;
                        }
                    }
                }
                b"row" => {
                    if let Some(r) = row.take() {
                        rows.push(r);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ImportError::Xlsx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

fn too_many_cells() -> ImportError {
    ImportError::Xlsx(format!("worksheet has more than {} cells", XLSX_MAX_CELLS))
}

// ============ XLS ============

/// First sheet of a legacy workbook. The container is sniffed, so a
/// mislabelled OOXML or ODS file still reads.
fn xls_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, ImportError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ImportError::Xlsx(format!("failed to open spreadsheet: {}", e)))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ImportError::Xlsx("workbook has no worksheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ImportError::Xlsx(format!("failed to read sheet '{}': {}", sheet, e)))?;

    let (height, width) = range.get_size();
    if height.saturating_mul(width) > XLSX_MAX_CELLS {
        return Err(too_many_cells());
    }
    Ok(range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect())
}
