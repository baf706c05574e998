use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use csv::{ByteRecord, Position, ReaderBuilder, Terminator};

use super::model::{ColumnPair, Datum, Descriptor};
use crate::config::Limits;
use crate::error::{Error, RangeKind, Result};

// ---------------------------------------------------------------------------
// Session bookkeeping
// ---------------------------------------------------------------------------

/// Counters describing how often a session went back to the start of its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Header scans performed while resolving columns.
    pub header_scans: usize,
    /// Cursor resets to the first data row.
    pub rewinds: usize,
}

/// The series currently being walked.
#[derive(Debug, Clone)]
struct Selection {
    descriptor: Descriptor,
    columns: ColumnPair,
}

/// What a single data row produced.
enum Row {
    Datum(Datum),
    Empty,
    Eof,
}

// ---------------------------------------------------------------------------
// DataSource – one open table
// ---------------------------------------------------------------------------

/// A streaming session over one comma-delimited sensor export.
///
/// The header is expected to name every series `Data Set {run}:{field}` and to
/// carry a `Data Set {run}:Time(s)` column for each run. Rows are read on
/// demand; nothing beyond the current row is held in memory.
///
/// The session remembers one selection at a time. Asking for the same
/// descriptor again continues where the last call stopped; asking for another
/// one (or calling [`DataSource::stop`]) restarts from the first data row.
pub struct DataSource<R = File> {
    label: String,
    reader: csv::Reader<R>,
    limits: Limits,
    /// Total input length in bytes.
    len: u64,
    /// Whether the input ends with a row terminator.
    terminated: bool,
    data_start: Position,
    selection: Option<Selection>,
    record: ByteRecord,
    rows_scanned: usize,
    stats: ScanStats,
}

impl DataSource<File> {
    /// Open a CSV file on disk.
    pub fn open(path: &Path, limits: Limits) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(path.display().to_string(), file, limits)
    }
}

impl<R: Read + Seek> DataSource<R> {
    /// Start a session over any seekable input.
    pub fn from_reader(label: impl Into<String>, mut input: R, limits: Limits) -> Result<Self> {
        let label = label.into();
        let len = input.seek(SeekFrom::End(0))?;
        let terminated = if len == 0 {
            true
        } else {
            let mut last = [0u8; 1];
            input.seek(SeekFrom::End(-1))?;
            input.read_exact(&mut last)?;
            last[0] == b'\n'
        };
        input.seek(SeekFrom::Start(0))?;

        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .terminator(Terminator::Any(b'\n'))
            .from_reader(input);

        log::info!("opened {label} ({len} bytes)");

        Ok(Self {
            label,
            reader,
            limits,
            len,
            terminated,
            data_start: Position::new(),
            selection: None,
            record: ByteRecord::new(),
            rows_scanned: 0,
            stats: ScanStats::default(),
        })
    }

    /// End the session and release the input.
    pub fn close(self) {
        log::info!(
            "closing {} ({} header scans, {} rewinds)",
            self.label,
            self.stats.header_scans,
            self.stats.rewinds
        );
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Columns of the active selection, if any.
    pub fn columns(&self) -> Option<ColumnPair> {
        self.selection.as_ref().map(|s| s.columns)
    }

    // -----------------------------------------------------------------------
    // Column resolution
    // -----------------------------------------------------------------------

    /// Scan the header for the series' value column and its run's time column.
    ///
    /// The read cursor is left where it was before the call.
    pub fn resolve_columns(&mut self, descriptor: &Descriptor) -> Result<ColumnPair> {
        let saved = self.reader.position().clone();
        self.seek(Position::new())?;
        let scanned = self.scan_header(descriptor);
        self.seek(saved)?;
        let columns = scanned?;

        log::debug!(
            "resolved {descriptor}: time column {}, value column {}",
            columns.time,
            columns.value
        );
        Ok(columns)
    }

    fn scan_header(&mut self, descriptor: &Descriptor) -> Result<ColumnPair> {
        self.stats.header_scans += 1;

        if !self.read_record()? {
            return Err(Error::UnexpectedEof { offset: 0 });
        }
        if self.at_unterminated_tail() {
            return Err(Error::MissingTerminator { offset: self.len });
        }
        self.check_record()?;

        let time_name = descriptor.time().column_name();
        let value_name = descriptor.column_name();
        let mut time = None;
        let mut value = None;

        for col in 0..self.record.len() {
            let cell = self.field(col).unwrap_or_default();
            if time.is_none() && cell == time_name.as_bytes() {
                time = Some(col);
            }
            if value.is_none() && cell == value_name.as_bytes() {
                value = Some(col);
            }
        }

        let time = time.ok_or(Error::ColumnNotFound(time_name))?;
        let value = value.ok_or(Error::ColumnNotFound(value_name))?;
        if time >= value {
            return Err(Error::ColumnOrder {
                descriptor: descriptor.clone(),
                time,
                value,
            });
        }

        self.data_start = self.reader.position().clone();
        Ok(ColumnPair { time, value })
    }

    /// Make `descriptor` the active selection.
    ///
    /// Returns `true` on a cache hit, in which case neither the header nor the
    /// cursor is touched. On a miss the columns are re-resolved and the cursor
    /// goes back to the first data row.
    pub fn select(&mut self, descriptor: &Descriptor) -> Result<bool> {
        self.activate(descriptor).map(|(hit, _)| hit)
    }

    fn activate(&mut self, descriptor: &Descriptor) -> Result<(bool, ColumnPair)> {
        if let Some(selection) = &self.selection {
            if &selection.descriptor == descriptor {
                return Ok((true, selection.columns));
            }
        }

        self.selection = None;
        let columns = self.resolve_columns(descriptor)?;
        self.seek(self.data_start.clone())?;
        self.rows_scanned = 0;
        self.stats.rewinds += 1;
        self.selection = Some(Selection {
            descriptor: descriptor.clone(),
            columns,
        });
        Ok((false, columns))
    }

    // -----------------------------------------------------------------------
    // Iteration
    // -----------------------------------------------------------------------

    /// Next (timestamp, value) pair of the series, in file order.
    ///
    /// Rows where either cell is empty are skipped. `None` marks the end of the
    /// input; the selection is dropped so the following call starts over.
    pub fn next(&mut self, descriptor: &Descriptor) -> Result<Option<Datum>> {
        let (_, columns) = self.activate(descriptor)?;

        loop {
            match self.read_row(columns)? {
                Row::Datum(datum) => return Ok(Some(datum)),
                Row::Empty => continue,
                Row::Eof => {
                    log::debug!("end of {descriptor} after {} rows", self.rows_scanned);
                    self.selection = None;
                    return Ok(None);
                }
            }
        }
    }

    /// Forget the active selection. The next [`DataSource::next`] call, for any
    /// descriptor, rewinds and resolves again.
    pub fn stop(&mut self) {
        if let Some(selection) = self.selection.take() {
            log::debug!("stopped scan of {}", selection.descriptor);
        }
    }

    fn read_row(&mut self, columns: ColumnPair) -> Result<Row> {
        if !self.read_record()? {
            return Ok(Row::Eof);
        }
        self.rows_scanned += 1;
        if self.rows_scanned > self.limits.max_rows {
            return Err(Error::RowBudgetExceeded {
                limit: self.limits.max_rows,
            });
        }

        if self.at_unterminated_tail() {
            return Err(Error::UnexpectedEof { offset: self.len });
        }
        self.check_record()?;

        let timestamp = self.cell(columns.time)?;
        let value = self.cell(columns.value)?;

        match (timestamp, value) {
            (Some(timestamp), Some(_)) if timestamp < 0.0 => Err(Error::BadCell {
                cell: timestamp.to_string(),
                offset: self.cell_offset(columns.time),
                reason: "negative timestamp",
            }),
            (Some(timestamp), Some(value)) => Ok(Row::Datum(Datum { timestamp, value })),
            _ => {
                log::trace!("skipping row {} (empty cell)", self.current_line());
                Ok(Row::Empty)
            }
        }
    }

    fn cell(&self, col: usize) -> Result<Option<f64>> {
        let raw = self.field(col).ok_or(Error::ShortRow {
            line: self.current_line(),
            column: col,
            width: self.record.len(),
        })?;
        parse_cell(raw, self.cell_offset(col))
    }

    /// Limits and framing checks applied to every record, selected columns or
    /// not.
    fn check_record(&self) -> Result<()> {
        if self.record.len() > self.limits.max_columns {
            return Err(Error::TooManyColumns {
                found: self.record.len(),
                limit: self.limits.max_columns,
            });
        }
        for col in 0..self.record.len() {
            let cell = self.field(col).unwrap_or_default();
            if cell.len() > self.limits.max_field_len {
                return Err(self.field_too_large(col));
            }
            if cell.contains(&b'\r') {
                return Err(Error::BadCell {
                    cell: String::from_utf8_lossy(cell).into_owned(),
                    offset: self.cell_offset(col),
                    reason: "carriage return without line feed",
                });
            }
        }
        Ok(())
    }

    /// Cell `col` of the current record. Rows end at `\n`; the `\r` of a
    /// CRLF ending is dropped from the last cell.
    fn field(&self, col: usize) -> Option<&[u8]> {
        let cell = self.record.get(col)?;
        if col + 1 == self.record.len() {
            Some(cell.strip_suffix(b"\r").unwrap_or(cell))
        } else {
            Some(cell)
        }
    }

    // -----------------------------------------------------------------------
    // Low-level helpers
    // -----------------------------------------------------------------------

    fn read_record(&mut self) -> Result<bool> {
        self.reader
            .read_byte_record(&mut self.record)
            .map_err(|source| Error::Read {
                offset: self.reader.position().byte(),
                source,
            })
    }

    fn seek(&mut self, pos: Position) -> Result<()> {
        let offset = pos.byte();
        self.reader
            .seek(pos)
            .map_err(|source| Error::Read { offset, source })
    }

    /// True when the record just read ran into end of input with no terminator.
    fn at_unterminated_tail(&self) -> bool {
        !self.terminated && self.reader.position().byte() == self.len
    }

    fn current_line(&self) -> u64 {
        self.record.position().map(|p| p.line()).unwrap_or(0)
    }

    /// Approximate byte offset of a cell: record start plus preceding cells and
    /// their delimiters.
    fn cell_offset(&self, col: usize) -> u64 {
        let start = self.record.position().map(|p| p.byte()).unwrap_or(0);
        let within = self.record.range(col).map(|r| r.start).unwrap_or(0);
        start + (within + col) as u64
    }

    fn field_too_large(&self, col: usize) -> Error {
        Error::FieldTooLarge {
            offset: self.cell_offset(col),
            len: self.record.get(col).map(|c| c.len()).unwrap_or(0),
            capacity: self.limits.max_field_len,
        }
    }
}

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

/// Parse one numeric cell. Empty (or all-blank) cells are `None`.
pub fn parse_cell(raw: &[u8], offset: u64) -> Result<Option<f64>> {
    let bad = |cell: &str, reason| Error::BadCell {
        cell: cell.to_string(),
        offset,
        reason,
    };

    let text = std::str::from_utf8(raw)
        .map_err(|_| bad(&String::from_utf8_lossy(raw), "not utf-8"))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }

    let value: f64 = text.parse().map_err(|_| bad(text, "not a number"))?;

    // `str::parse` saturates instead of failing, so range errors are detected
    // from the result and the literal text.
    let literal = text
        .bytes()
        .any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E');
    if !value.is_finite() {
        if literal {
            return Err(bad(text, "not a finite number"));
        }
        return Err(Error::CellOutOfRange {
            cell: text.to_string(),
            offset,
            kind: RangeKind::Huge,
        });
    }

    let mantissa = text.split(['e', 'E']).next().unwrap_or("");
    if value == 0.0 && mantissa.bytes().any(|b| (b'1'..=b'9').contains(&b)) {
        return Err(Error::CellOutOfRange {
            cell: text.to_string(),
            offset,
            kind: RangeKind::Tiny,
        });
    }

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const TABLE: &str = "\
Data Set 3:Time(s),Data Set 3:Force(N),Data Set 3:Hang Time(s),Data Set 4:Time(s),Data Set 4:Force(N),\r
0.0,10.0,,0.0,1.0,\r
0.5,,,0.5,2.0,\r
1.0,30.0,0.9,1.0,3.0,\r
1.5,40.0,,,,\r
";

    fn session(text: &str) -> DataSource<Cursor<Vec<u8>>> {
        DataSource::from_reader("test", Cursor::new(text.as_bytes().to_vec()), Limits::default())
            .unwrap()
    }

    fn desc(run: i64, field: &str) -> Descriptor {
        Descriptor::new(run, field).unwrap()
    }

    fn drain(src: &mut DataSource<Cursor<Vec<u8>>>, d: &Descriptor) -> Vec<(f64, f64)> {
        let mut out = Vec::new();
        while let Some(datum) = src.next(d).unwrap() {
            out.push((datum.timestamp, datum.value));
        }
        out
    }

    #[test]
    fn time_column_precedes_value_column() {
        let mut src = session(TABLE);
        let cols = src.resolve_columns(&desc(3, "Force(N)")).unwrap();
        assert_eq!(cols, ColumnPair { time: 0, value: 1 });
        assert!(cols.value > cols.time);

        let cols = src.resolve_columns(&desc(4, "Force(N)")).unwrap();
        assert_eq!(cols, ColumnPair { time: 3, value: 4 });
    }

    #[test]
    fn empty_cells_are_skipped_not_eof() {
        let mut src = session(TABLE);
        assert_eq!(
            drain(&mut src, &desc(3, "Force(N)")),
            vec![(0.0, 10.0), (1.0, 30.0), (1.5, 40.0)]
        );
        // Row 4 has both cells empty for run 4.
        assert_eq!(
            drain(&mut src, &desc(4, "Force(N)")),
            vec![(0.0, 1.0), (0.5, 2.0), (1.0, 3.0)]
        );
        assert_eq!(drain(&mut src, &desc(3, "Hang Time(s)")), vec![(1.0, 0.9)]);
    }

    #[test]
    fn repeated_selection_does_not_rescan() {
        let mut src = session(TABLE);
        let d = desc(3, "Force(N)");
        src.next(&d).unwrap();
        src.next(&d).unwrap();
        src.next(&d).unwrap();
        assert_eq!(
            src.stats(),
            ScanStats {
                header_scans: 1,
                rewinds: 1
            }
        );
        assert!(src.select(&d).unwrap());
    }

    #[test]
    fn switching_descriptors_restarts_series() {
        let mut src = session(TABLE);
        let force = desc(3, "Force(N)");
        let other = desc(4, "Force(N)");

        assert_eq!(src.next(&force).unwrap(), Some(Datum::new(0.0, 10.0)));
        assert_eq!(src.next(&force).unwrap(), Some(Datum::new(1.0, 30.0)));
        assert_eq!(src.next(&other).unwrap(), Some(Datum::new(0.0, 1.0)));
        assert_eq!(src.next(&force).unwrap(), Some(Datum::new(0.0, 10.0)));
        assert_eq!(src.stats().rewinds, 3);
    }

    #[test]
    fn stop_forces_restart() {
        let mut src = session(TABLE);
        let d = desc(3, "Force(N)");
        src.next(&d).unwrap();
        src.stop();
        assert!(src.columns().is_none());
        assert_eq!(src.next(&d).unwrap(), Some(Datum::new(0.0, 10.0)));
    }

    #[test]
    fn end_of_stream_restarts_on_next_call() {
        let mut src = session(TABLE);
        let d = desc(3, "Hang Time(s)");
        assert_eq!(src.next(&d).unwrap(), Some(Datum::new(1.0, 0.9)));
        assert_eq!(src.next(&d).unwrap(), None);
        assert_eq!(src.next(&d).unwrap(), Some(Datum::new(1.0, 0.9)));
    }

    #[test]
    fn resolution_restores_cursor() {
        let mut src = session(TABLE);
        let d = desc(3, "Force(N)");
        src.next(&d).unwrap();
        src.resolve_columns(&desc(4, "Force(N)")).unwrap();
        assert_eq!(src.next(&d).unwrap(), Some(Datum::new(1.0, 30.0)));
    }

    #[test]
    fn missing_column_is_lookup_error() {
        let mut src = session(TABLE);
        let err = src.next(&desc(3, "Velocity(m/s)")).unwrap_err();
        assert!(
            matches!(&err, Error::ColumnNotFound(name) if name == "Data Set 3:Velocity(m/s)")
        );
        assert!(matches!(
            src.next(&desc(9, "Force(N)")).unwrap_err(),
            Error::ColumnNotFound(_)
        ));
    }

    #[test]
    fn non_numeric_cell_is_format_error() {
        let mut src = session("Data Set 1:Time(s),Data Set 1:Force(N)\n0.0,1.0\n0.1,abc\n");
        let d = desc(1, "Force(N)");
        assert!(src.next(&d).unwrap().is_some());
        assert!(matches!(
            src.next(&d).unwrap_err(),
            Error::BadCell { reason: "not a number", .. }
        ));
    }

    #[test]
    fn oversized_cell_is_rejected() {
        let text = format!(
            "Data Set 1:Time(s),Data Set 1:Force(N)\n0.0,1{}\n",
            "0".repeat(64)
        );
        let limits = Limits {
            max_field_len: 32,
            ..Limits::default()
        };
        let mut src =
            DataSource::from_reader("test", Cursor::new(text.into_bytes()), limits).unwrap();
        assert!(matches!(
            src.next(&desc(1, "Force(N)")).unwrap_err(),
            Error::FieldTooLarge { capacity: 32, .. }
        ));
    }

    #[test]
    fn oversized_cell_in_unselected_column_is_rejected() {
        let text = format!(
            "Data Set 1:Time(s),Data Set 1:Force(N),Data Set 2:Time(s)\n0.0,1.0,{}\n",
            "9".repeat(100)
        );
        let limits = Limits {
            max_field_len: 32,
            ..Limits::default()
        };
        let mut src =
            DataSource::from_reader("test", Cursor::new(text.into_bytes()), limits).unwrap();
        assert!(matches!(
            src.next(&desc(1, "Force(N)")).unwrap_err(),
            Error::FieldTooLarge {
                len: 100,
                capacity: 32,
                ..
            }
        ));
    }

    #[test]
    fn wide_data_row_is_rejected() {
        let limits = Limits {
            max_columns: 3,
            ..Limits::default()
        };
        let text = "Data Set 1:Time(s),Data Set 1:Force(N)\n0.0,1.0,,,,\n";
        let mut src =
            DataSource::from_reader("test", Cursor::new(text.as_bytes().to_vec()), limits)
                .unwrap();
        assert!(matches!(
            src.next(&desc(1, "Force(N)")).unwrap_err(),
            Error::TooManyColumns { found: 6, limit: 3 }
        ));
    }

    #[test]
    fn truncated_final_row_is_unexpected_eof() {
        let mut src = session("Data Set 1:Time(s),Data Set 1:Force(N),x\n0.0,1.0,\n0.1,2");
        let d = desc(1, "Force(N)");
        assert!(src.next(&d).unwrap().is_some());
        assert!(matches!(
            src.next(&d).unwrap_err(),
            Error::UnexpectedEof { .. }
        ));
    }

    #[test]
    fn complete_looking_unterminated_row_is_unexpected_eof() {
        // `2.0` may be the first bytes of `2.05`.
        let mut src = session("Data Set 1:Time(s),Data Set 1:Force(N)\n0.0,1.0\n0.1,2.0");
        let d = desc(1, "Force(N)");
        assert_eq!(src.next(&d).unwrap(), Some(Datum::new(0.0, 1.0)));
        assert!(matches!(
            src.next(&d).unwrap_err(),
            Error::UnexpectedEof { offset: 54 }
        ));
    }

    #[test]
    fn lone_carriage_return_is_not_a_row_end() {
        let mut src = session("Data Set 1:Time(s),Data Set 1:Force(N)\r\n0.0\r1.0,2.0\r\n");
        assert!(matches!(
            src.next(&desc(1, "Force(N)")).unwrap_err(),
            Error::BadCell {
                reason: "carriage return without line feed",
                ..
            }
        ));
    }

    #[test]
    fn crlf_and_lf_rows_read_the_same() {
        let lf = "Data Set 1:Time(s),Data Set 1:Force(N)\n0.0,1.0\n0.5,2.0\n";
        let crlf = lf.replace('\n', "\r\n");
        let d = desc(1, "Force(N)");
        assert_eq!(drain(&mut session(lf), &d), drain(&mut session(&crlf), &d));
        assert_eq!(drain(&mut session(&crlf), &d), vec![(0.0, 1.0), (0.5, 2.0)]);
    }

    #[test]
    fn unterminated_header_is_rejected() {
        let mut src = session("Data Set 1:Time(s),Data Set 1:Force(N)");
        assert!(matches!(
            src.next(&desc(1, "Force(N)")).unwrap_err(),
            Error::MissingTerminator { .. }
        ));
    }

    #[test]
    fn short_row_is_rejected() {
        let mut src = session("Data Set 1:Time(s),Data Set 1:Force(N)\n0.0\n");
        assert!(matches!(
            src.next(&desc(1, "Force(N)")).unwrap_err(),
            Error::ShortRow { column: 1, .. }
        ));
    }

    #[test]
    fn reversed_columns_are_rejected() {
        let mut src = session("Data Set 1:Force(N),Data Set 1:Time(s)\n1.0,0.0\n");
        assert!(matches!(
            src.next(&desc(1, "Force(N)")).unwrap_err(),
            Error::ColumnOrder { time: 1, value: 0, .. }
        ));
    }

    #[test]
    fn row_budget_is_enforced() {
        let mut text = String::from("Data Set 1:Time(s),Data Set 1:Force(N)\n");
        for i in 0..10 {
            text.push_str(&format!("{i},\n"));
        }
        let limits = Limits {
            max_rows: 5,
            ..Limits::default()
        };
        let mut src =
            DataSource::from_reader("test", Cursor::new(text.into_bytes()), limits).unwrap();
        assert!(matches!(
            src.next(&desc(1, "Force(N)")).unwrap_err(),
            Error::RowBudgetExceeded { limit: 5 }
        ));
    }

    #[test]
    fn series_filling_the_row_budget_ends_cleanly() {
        let mut text = String::from("Data Set 1:Time(s),Data Set 1:Force(N)\n");
        for i in 0..5 {
            text.push_str(&format!("{i},{i}\n"));
        }
        let limits = Limits {
            max_rows: 5,
            ..Limits::default()
        };
        let mut src =
            DataSource::from_reader("test", Cursor::new(text.into_bytes()), limits).unwrap();
        let d = desc(1, "Force(N)");
        assert_eq!(drain(&mut src, &d).len(), 5);
        // The budget starts over with the next scan.
        assert_eq!(drain(&mut src, &d).len(), 5);
    }

    #[test]
    fn parse_cell_classifies_input() {
        assert_eq!(parse_cell(b"", 0).unwrap(), None);
        assert_eq!(parse_cell(b"  ", 0).unwrap(), None);
        assert_eq!(parse_cell(b"-2.5", 0).unwrap(), Some(-2.5));
        assert_eq!(parse_cell(b"1e3", 0).unwrap(), Some(1000.0));
        assert_eq!(parse_cell(b"0.000", 0).unwrap(), Some(0.0));
        assert!(matches!(
            parse_cell(b"1e999", 7),
            Err(Error::CellOutOfRange {
                kind: RangeKind::Huge,
                offset: 7,
                ..
            })
        ));
        assert!(matches!(
            parse_cell(b"1e-999", 0),
            Err(Error::CellOutOfRange {
                kind: RangeKind::Tiny,
                ..
            })
        ));
        assert!(matches!(parse_cell(b"inf", 0), Err(Error::BadCell { .. })));
        assert!(matches!(parse_cell(b"12kg", 0), Err(Error::BadCell { .. })));
    }
}
