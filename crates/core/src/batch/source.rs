//! Source adapters turning byte streams into raw records.
//!
//! Both adapters read the whole source up front. A source that fails to parse
//! is rejected before the coordinator sees a single row.

use std::io::Read;

use super::{BatchError, RawRecord};

/// A format that yields raw records.
pub trait RecordSource {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Decode every record from `reader`.
    fn read<R: Read>(&self, reader: R) -> Result<Vec<RawRecord>, BatchError>;
}

// ============================================================================
// Tabular (CSV)
// ============================================================================

/// Required columns and the alternative header names accepted for them.
const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("ticket_id", &[]),
    ("serial_number", &["no_serial"]),
    ("order_number", &[]),
    ("capex", &[]),
    ("invoice_number", &[]),
    ("supplier", &[]),
];

const STAGE_COLUMN: &str = "stage";

/// Delimited text with a header row.
#[derive(Debug, Clone)]
pub struct CsvSource {
    delimiter: u8,
}

impl CsvSource {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl Default for CsvSource {
    fn default() -> Self {
        Self::new(b',')
    }
}

/// Header positions resolved once per file.
struct ColumnMap {
    required: [usize; 6],
    stage: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, BatchError> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_ascii_lowercase())
            .collect();
        let position = |name: &str| names.iter().position(|h| h == name);

        let mut required = [0usize; 6];
        for (slot, (name, aliases)) in required.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = std::iter::once(name)
                .chain(aliases.iter())
                .find_map(|candidate| position(*candidate))
                .ok_or_else(|| BatchError::MissingColumn((*name).to_string()))?;
        }

        Ok(Self {
            required,
            stage: position(STAGE_COLUMN),
        })
    }

    fn to_record(&self, row: &csv::StringRecord) -> RawRecord {
        let cell = |index: usize| row.get(index).map(str::to_string);
        let [ticket_id, serial_number, order_number, capex, invoice_number, supplier] =
            self.required;

        RawRecord {
            ticket_id: cell(ticket_id),
            serial_number: cell(serial_number),
            order_number: cell(order_number),
            capex: cell(capex),
            invoice_number: cell(invoice_number),
            supplier: cell(supplier),
            stage: self.stage.and_then(cell),
        }
    }
}

fn csv_error(e: csv::Error) -> BatchError {
    if e.is_io_error() {
        BatchError::Io(e.to_string())
    } else {
        BatchError::MalformedSource(e.to_string())
    }
}

impl RecordSource for CsvSource {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn read<R: Read>(&self, reader: R) -> Result<Vec<RawRecord>, BatchError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers().map_err(csv_error)?.clone();
        let columns = ColumnMap::resolve(&headers)?;

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result.map_err(csv_error)?;
            records.push(columns.to_record(&row));
        }
        Ok(records)
    }
}

// ============================================================================
// Structured (JSON)
// ============================================================================

/// A JSON array of field-keyed objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSource;

impl RecordSource for JsonSource {
    fn name(&self) -> &'static str {
        "json"
    }

    fn read<R: Read>(&self, reader: R) -> Result<Vec<RawRecord>, BatchError> {
        serde_json::from_reader(reader).map_err(|e| {
            if e.is_io() {
                BatchError::Io(e.to_string())
            } else {
                BatchError::MalformedSource(e.to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "ticket_id,no_serial,order_number,capex,invoice_number,supplier";

    #[test]
    fn test_csv_reads_rows_in_order() {
        let input = format!(
            "{}\n101,SN-1,PO-1,CX-1,INV-1,Acme\n102,,PO-2,,,\n",
            HEADER
        );

        let records = CsvSource::default().read(input.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ticket_id.as_deref(), Some("101"));
        assert_eq!(records[0].serial_number.as_deref(), Some("SN-1"));
        assert_eq!(records[0].supplier.as_deref(), Some("Acme"));
        assert_eq!(records[1].ticket_id.as_deref(), Some("102"));
        assert_eq!(records[1].serial_number.as_deref(), Some(""));
        assert!(records[1].stage.is_none());
    }

    #[test]
    fn test_csv_headers_are_case_insensitive_and_reorderable() {
        let input = "Supplier,Capex,Ticket_ID,Serial_Number,Invoice_Number,Order_Number,Stage\n\
                     Acme,CX,7,SN-7,INV,PO,Procurement Phase\n";

        let records = CsvSource::default().read(input.as_bytes()).unwrap();

        assert_eq!(records[0].ticket_id.as_deref(), Some("7"));
        assert_eq!(records[0].order_number.as_deref(), Some("PO"));
        assert_eq!(records[0].stage.as_deref(), Some("Procurement Phase"));
    }

    #[test]
    fn test_csv_missing_required_column() {
        let input = "ticket_id,no_serial,order_number,capex,invoice_number\n1,a,b,c,d\n";

        let result = CsvSource::default().read(input.as_bytes());

        assert_eq!(result, Err(BatchError::MissingColumn("supplier".to_string())));
    }

    #[test]
    fn test_csv_empty_input_is_missing_columns() {
        let result = CsvSource::default().read("".as_bytes());
        assert!(matches!(result, Err(BatchError::MissingColumn(_))));
    }

    #[test]
    fn test_csv_custom_delimiter_and_short_rows() {
        let input = "ticket_id;serial_number;order_number;capex;invoice_number;supplier\n5;SN\n";

        let records = CsvSource::new(b';').read(input.as_bytes()).unwrap();

        assert_eq!(records[0].ticket_id.as_deref(), Some("5"));
        assert_eq!(records[0].serial_number.as_deref(), Some("SN"));
        assert!(records[0].supplier.is_none());
    }

    #[test]
    fn test_csv_invalid_utf8_is_malformed() {
        let mut input = format!("{}\n", HEADER).into_bytes();
        input.extend_from_slice(b"1,\xff\xfe,PO,CX,INV,Acme\n");

        let result = CsvSource::default().read(input.as_slice());
        assert!(matches!(result, Err(BatchError::MalformedSource(_))));
    }

    #[test]
    fn test_json_array() {
        let input = r#"[{"ticket_id": 100, "order_number": "PO-1"}, {"ticket_id": "101"}]"#;

        let records = JsonSource.read(input.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ticket_id.as_deref(), Some("100"));
        assert_eq!(records[0].order_number.as_deref(), Some("PO-1"));
        assert_eq!(records[1].ticket_id.as_deref(), Some("101"));
    }

    #[test]
    fn test_json_rejects_non_array_and_garbage() {
        for input in [r#"{"ticket_id": 1}"#, "not json", r#"[{"ticket_id": 1},"#, r#"[1, 2]"#] {
            let result = JsonSource.read(input.as_bytes());
            assert!(
                matches!(result, Err(BatchError::MalformedSource(_))),
                "{:?} should be rejected",
                input
            );
        }
    }
}
