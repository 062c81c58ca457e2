//! I/O utilities for delimited input: encoding, delimiter resolution and
//! reader construction.
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.tsv` → tab,
//!   everything else → comma) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//!   Decoding is strict; a field that does not decode cleanly is reported
//!   rather than replaced.
//! - **Readers**: records are read as raw bytes and may have differing
//!   lengths, so row width is checked at lookup time instead.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match extension_of(path).as_deref() {
        Some("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Lower-cased file extension, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_file(file: File, delimiter: u8) -> csv::Reader<BufReader<File>> {
    open_csv_reader(BufReader::new(file), delimiter)
}

/// Strict decode: `None` when the bytes are not valid in `encoding`. Leading
/// bytes are never treated as a BOM.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

/// Drops a UTF-8 byte order mark from the first header field.
pub fn strip_bom(fields: &mut [String]) {
    if let Some(first) = fields.first_mut() {
        if let Some(rest) = first.strip_prefix('\u{feff}') {
            *first = rest.to_string();
        }
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Option<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}
