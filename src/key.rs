//! Deriving group keys from row values.

use crate::Error;
use csv::StringRecord;

/// Returns the sanitized raw value of `column` for grouping without an allow-list.
///
/// `line` is only used to report where an empty key was found.
pub fn raw_key(record: &StringRecord, column: usize, line: u64) -> Result<String, Error> {
    let value = record.get(column).map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(Error::InvalidGroupKey { line, column });
    }

    Ok(sanitize(value))
}

/// Makes a key usable inside a file name: dots are dropped and slashes become underscores.
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|&c| c != '.')
        .map(|c| if c == '/' { '_' } else { c })
        .collect()
}

/// Returns the file-extension-like key of `column`, or an empty string when
/// the column is absent or has no extension.
pub fn extension_key(record: &StringRecord, column: usize) -> String {
    record.get(column).map(normalize_extension).unwrap_or_default()
}

/// Reduces a value to a lower-cased extension without its leading dot.
///
/// `Report.PDF` gives `pdf`, `a/b.tar.gz` gives `gz`, and a bare `txt` or
/// `.TXT` gives `txt`.
pub fn normalize_extension(value: &str) -> String {
    let value = value.trim().to_lowercase();
    let name = value.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = name.trim_start_matches('.');

    let ext = match stem.rfind('.') {
        Some(dot) => &stem[dot + 1..],
        None => stem,
    };

    ext.trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn raw_keys_are_sanitized() {
        let row = record(&["1", " image/png ", "v1.2"]);
        assert_eq!(raw_key(&row, 1, 2).unwrap(), "image_png");
        assert_eq!(raw_key(&row, 2, 2).unwrap(), "v12");
    }

    #[test]
    fn empty_or_missing_raw_key_fails() {
        let row = record(&["1", "  "]);
        assert!(matches!(
            raw_key(&row, 1, 7),
            Err(Error::InvalidGroupKey { line: 7, column: 1 })
        ));
        assert!(matches!(
            raw_key(&row, 5, 7),
            Err(Error::InvalidGroupKey { line: 7, column: 5 })
        ));
    }

    #[test]
    fn extensions() {
        assert_eq!(normalize_extension("Report.PDF"), "pdf");
        assert_eq!(normalize_extension("a/b.tar.gz"), "gz");
        assert_eq!(normalize_extension("C:\\docs\\notes.Txt"), "txt");
        assert_eq!(normalize_extension(".TXT"), "txt");
        assert_eq!(normalize_extension("txt"), "txt");
        assert_eq!(normalize_extension("archive."), "");
        assert_eq!(normalize_extension("   "), "");
    }

    #[test]
    fn missing_extension_column_is_empty() {
        let row = record(&["1"]);
        assert_eq!(extension_key(&row, 3), "");
    }
}
