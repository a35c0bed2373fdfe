//! Spreadsheet ingestion: file-name validation and multipart encoding.
//!
//! The backend does all spreadsheet parsing; this side only checks the
//! extension and ships the bytes as a `multipart/form-data` body with a
//! single `file` field.

use anyhow::Result;
use chrono::Utc;

/// Accepted workbook extensions (compared case-insensitively).
pub const SPREADSHEET_EXTENSIONS: [&str; 2] = [".xlsx", ".xls"];

/// Receives an accepted workbook.
pub trait Uploader {
    fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Whether `file_name` looks like an Excel workbook.
pub fn is_spreadsheet(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    SPREADSHEET_EXTENSIONS
        .iter()
        .any(|ext| lower.len() > ext.len() && lower.ends_with(ext))
}

/// MIME type sent for the file part.
pub fn content_type_for(file_name: &str) -> &'static str {
    if file_name.to_ascii_lowercase().ends_with(".xlsx") {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    } else {
        "application/vnd.ms-excel"
    }
}

/// A boundary that is unique per call.
pub fn new_boundary() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("----safedash-{nanos:x}")
}

/// Encode one `file` part as a complete multipart body.
pub fn multipart_body(boundary: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let safe_name = file_name.replace(['"', '\r', '\n'], "_");
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{safe_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(
        format!("Content-Type: {}\r\n\r\n", content_type_for(file_name)).as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_excel_extensions_in_any_case() {
        assert!(is_spreadsheet("vehs.xlsx"));
        assert!(is_spreadsheet("VEHS 2024.XLS"));
        assert!(!is_spreadsheet("vehs.csv"));
        assert!(!is_spreadsheet("vehs.xlsx.pdf"));
        assert!(!is_spreadsheet(".xlsx"));
        assert!(!is_spreadsheet(""));
    }

    #[test]
    fn multipart_body_has_file_field_and_terminator() {
        let body = multipart_body("B", "data.xlsx", b"PK\x03\x04");
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with("--B\r\n"));
        assert!(text.contains("name=\"file\"; filename=\"data.xlsx\""));
        assert!(text.contains("spreadsheetml"));
        assert!(text.ends_with("\r\n--B--\r\n"));
    }

    #[test]
    fn quotes_in_file_names_are_neutralised() {
        let body = multipart_body("B", "a\"b.xls", b"");
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("filename=\"a_b.xls\""));
        assert!(text.contains("application/vnd.ms-excel"));
    }
}
