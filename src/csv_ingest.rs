//! Client-side CSV intake: extension check and preview parsing.
//!
//! The preview only shows what the file contains. Column names are not checked
//! against the feature set; the classifier rejects files it cannot use.

use crate::model::SourceFile;
use std::io::BufRead;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Maximum number of data rows kept for the preview.
pub const PREVIEW_ROW_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("Invalid file type '{name}'. Please upload a CSV file.")]
    NotCsv { name: String },
    #[error("Please select a valid CSV file before initiating analysis.")]
    NoFile,
    #[error("CSV header row is empty")]
    EmptyHeader,
    #[error("Failed to read file: {0}")]
    Io(String),
    #[error("{parser} parser failed: {message}")]
    Parse {
        parser: &'static str,
        message: String,
    },
}

/// Whether a file name ends in `.csv`, ignoring case.
pub fn is_csv_name(name: &str) -> bool {
    lazy_static! {
        static ref CSV_NAME: Regex = Regex::new(r"(?i)\.csv$").unwrap();
    }
    CSV_NAME.is_match(name)
}

/// Reject anything that is not named like a CSV file.
pub fn validate_name(name: &str) -> Result<(), IngestError> {
    if is_csv_name(name) {
        Ok(())
    } else {
        Err(IngestError::NotCsv {
            name: name.to_string(),
        })
    }
}

/// One preview row, positionally aligned to the header.
///
/// Cells past the end of a short line are `None`, not empty strings.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRow {
    cells: Vec<Option<String>>,
}

impl PreviewRow {
    fn from_fields<'a>(fields: impl Iterator<Item = &'a str>, width: usize) -> Self {
        let mut cells: Vec<Option<String>> = fields.take(width).map(|f| Some(f.to_string())).collect();
        cells.resize(width, None);
        PreviewRow { cells }
    }

    pub fn cells(&self) -> &[Option<String>] {
        &self.cells
    }
}

/// Header plus rows produced by one parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub rows: Vec<PreviewRow>,
}

/// Normalized preview of a selected file.
#[derive(Debug, Clone)]
pub struct CsvPreview {
    pub columns: Vec<String>,
    pub rows: Vec<PreviewRow>,
    pub source: SourceFile,
    /// Name of the parser that produced this preview
    pub parser: &'static str,
}

impl CsvPreview {
    pub fn total_rows_in_preview(&self) -> usize {
        self.rows.len()
    }

    /// Cell of `row` under `column`.
    ///
    /// With duplicate column names the last position wins, the same way a keyed
    /// row map keeps the last value written.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let pos = self.columns.iter().rposition(|c| c == column)?;
        self.rows.get(row)?.cells.get(pos)?.as_deref()
    }
}

/// A preview parsing strategy.
pub trait PreviewParser: Send + Sync {
    fn name(&self) -> &'static str;

    /// Parse the header and at most `cap` data rows from `reader`.
    ///
    /// Parsing stops once `cap` rows are kept; later lines are never validated.
    fn parse(&self, reader: &mut dyn BufRead, cap: usize) -> Result<ParsedTable, IngestError>;
}

fn header_columns<'a>(fields: impl Iterator<Item = &'a str>) -> Vec<String> {
    fields.map(|f| f.trim().to_string()).collect()
}

/// Quote-aware parser backed by the `csv` crate. Requires valid UTF-8.
pub struct StructuredParser;

impl PreviewParser for StructuredParser {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn parse(&self, reader: &mut dyn BufRead, cap: usize) -> Result<ParsedTable, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let to_err = |e: csv::Error| IngestError::Parse {
            parser: "structured",
            message: e.to_string(),
        };
        let is_blank =
            |r: &csv::StringRecord| r.len() <= 1 && r.get(0).map_or(true, |f| f.trim().is_empty());

        let mut columns: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        let mut record = csv::StringRecord::new();
        loop {
            if columns.is_some() && rows.len() >= cap {
                break;
            }
            if !reader.read_record(&mut record).map_err(to_err)? {
                break;
            }
            if is_blank(&record) {
                continue;
            }
            match &columns {
                None => columns = Some(header_columns(record.iter())),
                Some(cols) => rows.push(PreviewRow::from_fields(record.iter(), cols.len())),
            }
        }

        let columns = columns.ok_or(IngestError::EmptyHeader)?;
        Ok(ParsedTable { columns, rows })
    }
}

/// Raw line splitter used when the structured parser fails.
///
/// Splits on commas with no quote or escape handling, so a quoted field that
/// contains a comma is split in two. Invalid UTF-8 is replaced line by line.
pub struct LineSplitParser;

impl LineSplitParser {
    /// Next non-blank line without its terminator, or `None` at end of input.
    fn next_line(reader: &mut dyn BufRead, buf: &mut Vec<u8>) -> Result<Option<String>, IngestError> {
        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', buf)
                .map_err(|e| IngestError::Io(e.to_string()))?;
            if n == 0 {
                return Ok(None);
            }
            let line = String::from_utf8_lossy(buf);
            let line = line.strip_suffix('\n').unwrap_or(&line);
            let line = line.strip_suffix('\r').unwrap_or(line);
            if !line.trim().is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
    }
}

impl PreviewParser for LineSplitParser {
    fn name(&self) -> &'static str {
        "line-split"
    }

    fn parse(&self, reader: &mut dyn BufRead, cap: usize) -> Result<ParsedTable, IngestError> {
        let mut buf = Vec::new();
        let header = LineSplitParser::next_line(reader, &mut buf)?.ok_or(IngestError::EmptyHeader)?;
        let columns = header_columns(header.split(','));

        let mut rows = Vec::new();
        while rows.len() < cap {
            match LineSplitParser::next_line(reader, &mut buf)? {
                Some(line) => rows.push(PreviewRow::from_fields(line.split(','), columns.len())),
                None => break,
            }
        }

        Ok(ParsedTable { columns, rows })
    }
}

/// Preview parser chain, tried in priority order.
pub struct CsvIngest {
    parsers: Vec<Box<dyn PreviewParser>>,
    row_cap: usize,
}

impl Default for CsvIngest {
    fn default() -> Self {
        CsvIngest::with_parsers(vec![Box::new(StructuredParser), Box::new(LineSplitParser)])
    }
}

impl CsvIngest {
    pub fn with_parsers(parsers: Vec<Box<dyn PreviewParser>>) -> Self {
        CsvIngest {
            parsers,
            row_cap: PREVIEW_ROW_CAP,
        }
    }

    /// Build the preview of `file`, streaming only as much as the preview needs.
    ///
    /// The source is reopened for every parser in the chain.
    pub fn parse(&self, file: &SourceFile) -> Result<CsvPreview, IngestError> {
        self.run_chain(file.clone(), || {
            file.open_blocking()
                .map_err(|e| IngestError::Io(e.to_string()))
        })
    }

    /// Build a preview from an already-loaded buffer.
    pub fn parse_bytes(&self, source: SourceFile, bytes: &[u8]) -> Result<CsvPreview, IngestError> {
        self.run_chain(source, || Ok(Box::new(bytes) as Box<dyn BufRead + Send + '_>))
    }

    fn run_chain<'a, F>(&self, source: SourceFile, open: F) -> Result<CsvPreview, IngestError>
    where
        F: Fn() -> Result<Box<dyn BufRead + Send + 'a>, IngestError>,
    {
        let mut last_err = None;
        for parser in &self.parsers {
            let mut reader = open()?;
            match parser.parse(&mut *reader, self.row_cap) {
                Ok(table) => {
                    log::info!(
                        "Preview of {} parsed by {} parser: {} columns, {} rows",
                        source.name(),
                        parser.name(),
                        table.columns.len(),
                        table.rows.len()
                    );
                    return Ok(CsvPreview {
                        columns: table.columns,
                        rows: table.rows,
                        source,
                        parser: parser.name(),
                    });
                }
                Err(e) => {
                    log::warn!("{}: {}", source.name(), e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(IngestError::Parse {
            parser: "none",
            message: "no parser configured".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preview(text: &[u8]) -> CsvPreview {
        CsvIngest::default()
            .parse_bytes(SourceFile::from_bytes("flows.csv", text.to_vec()), text)
            .unwrap()
    }

    struct Unavailable;

    impl PreviewParser for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }
        fn parse(&self, _reader: &mut dyn BufRead, _cap: usize) -> Result<ParsedTable, IngestError> {
            Err(IngestError::Parse {
                parser: "unavailable",
                message: "not loaded".to_string(),
            })
        }
    }

    #[test]
    fn test_csv_name_check() {
        assert!(is_csv_name("flows.csv"));
        assert!(is_csv_name("FLOWS.CSV"));
        assert!(is_csv_name("a.b.Csv"));
        assert!(!is_csv_name("flows.txt"));
        assert!(!is_csv_name("flows.csv.txt"));
        assert!(!is_csv_name("csv"));
        assert_eq!(
            validate_name("notes.txt"),
            Err(IngestError::NotCsv {
                name: "notes.txt".to_string()
            })
        );
    }

    #[test]
    fn test_header_and_rows() {
        let p = preview(b" Destination Port , Flow Bytes/s\n80,1.5\n443,2.0\n");
        assert_eq!(p.columns, vec!["Destination Port", "Flow Bytes/s"]);
        assert_eq!(p.total_rows_in_preview(), 2);
        assert_eq!(p.cell(1, "Destination Port"), Some("443"));
        assert_eq!(p.parser, "structured");
    }

    #[test]
    fn test_short_and_long_rows() {
        let p = preview(b"a,b,c\n1\n1,2,3,4,5\n");
        assert_eq!(p.rows[0].cells(), &[Some("1".to_string()), None, None]);
        assert_eq!(p.rows[1].cells().len(), 3);
        assert_eq!(p.cell(1, "c"), Some("3"));
        assert_eq!(p.cell(0, "b"), None);
    }

    #[test]
    fn test_duplicate_columns_kept_positionally() {
        let p = preview(b"x,x,y\n1,2,3\n");
        assert_eq!(p.columns, vec!["x", "x", "y"]);
        assert_eq!(p.rows[0].cells()[0].as_deref(), Some("1"));
        assert_eq!(p.cell(0, "x"), Some("2"));
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let p = preview(b"a,b\r\n\r\n1,2\r\n   \r\n3,4\r\n");
        assert_eq!(p.total_rows_in_preview(), 2);
        assert_eq!(p.cell(1, "b"), Some("4"));
    }

    #[test]
    fn test_row_cap() {
        let mut text = String::from("n\n");
        for i in 0..120 {
            text.push_str(&format!("{}\n", i));
        }
        let p = preview(text.as_bytes());
        assert_eq!(p.total_rows_in_preview(), PREVIEW_ROW_CAP);
        assert_eq!(p.cell(49, "n"), Some("49"));
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_line_split() {
        let p = preview(b"a,b\n1,\xff\n");
        assert_eq!(p.parser, "line-split");
        assert_eq!(p.cell(0, "b"), Some("\u{fffd}"));
    }

    #[test]
    fn test_unavailable_parser_falls_back() {
        let ingest = CsvIngest::with_parsers(vec![Box::new(Unavailable), Box::new(LineSplitParser)]);
        let text = b"a,b\n\"x,y\",z\n";
        let p = ingest
            .parse_bytes(SourceFile::from_bytes("q.csv", text.to_vec()), text)
            .unwrap();
        assert_eq!(p.parser, "line-split");
        // No quote handling: the quoted comma splits the field.
        assert_eq!(p.cell(0, "a"), Some("\"x"));
        assert_eq!(p.cell(0, "b"), Some("y\""));
    }

    #[test]
    fn test_structured_parser_honours_quotes() {
        let p = preview(b"a,b\n\"x,y\",z\n");
        assert_eq!(p.cell(0, "a"), Some("x,y"));
        assert_eq!(p.cell(0, "b"), Some("z"));
    }

    #[test]
    fn test_empty_file_abandons_ingest() {
        let text = b"\n  \n";
        let err = CsvIngest::default()
            .parse_bytes(SourceFile::from_bytes("empty.csv", text.to_vec()), text)
            .unwrap_err();
        assert_eq!(err, IngestError::EmptyHeader);
    }

    #[test]
    fn test_rows_past_cap_are_not_validated() {
        let mut text = b"a,b\n".to_vec();
        for _ in 0..PREVIEW_ROW_CAP {
            text.extend_from_slice(b"\"x,y\",z\n");
        }
        text.extend_from_slice(b"1,\xff\n");
        let p = preview(&text);
        assert_eq!(p.parser, "structured");
        assert_eq!(p.total_rows_in_preview(), PREVIEW_ROW_CAP);
        assert_eq!(p.cell(0, "a"), Some("x,y"));
    }

    /// Fails every read, standing in for data nobody should touch.
    struct Untouchable;

    impl std::io::Read for Untouchable {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "read past preview"))
        }
    }

    impl BufRead for Untouchable {
        fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "read past preview"))
        }
        fn consume(&mut self, _amt: usize) {}
    }

    #[test]
    fn test_line_split_stops_at_cap() {
        use std::io::Read;
        let mut reader = (&b"a,b\n1,2\n\n3,4\n"[..]).chain(Untouchable);
        let table = LineSplitParser.parse(&mut reader, 2).unwrap();
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].cells()[1].as_deref(), Some("4"));
    }

    #[test]
    fn test_parse_streams_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.csv");
        let mut text = String::from("Destination Port,Label\n");
        for i in 0..5000 {
            text.push_str(&format!("{},BENIGN\n", i));
        }
        std::fs::write(&path, text).unwrap();

        let p = CsvIngest::default().parse(&SourceFile::from_path(&path)).unwrap();
        assert_eq!(p.parser, "structured");
        assert_eq!(p.total_rows_in_preview(), PREVIEW_ROW_CAP);
        assert_eq!(p.cell(49, "Destination Port"), Some("49"));
        assert_eq!(p.source.name(), "big.csv");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = CsvIngest::default()
            .parse(&SourceFile::from_path("/nonexistent/dir/flows.csv"))
            .unwrap_err();
        assert!(matches!(err, IngestError::Io(_)));
    }
}
