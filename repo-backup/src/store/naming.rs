//! Archive file naming.
//!
//! The file name is the only record of an archive: `<short-name>-<epoch-millis>.<ext>`.
//! Encoding and decoding live here and nowhere else.

/// Build the file name for an archive of `short_name` at `change_point`.
pub fn archive_file_name(short_name: &str, change_point: i64, extension: &str) -> String {
    format!("{short_name}-{change_point}.{extension}")
}

/// True if `file_name` carries the archive extension.
pub fn has_extension(file_name: &str, extension: &str) -> bool {
    strip_extension(file_name, extension).is_some()
}

/// Extract the change-point: the token between the last `-` and the extension.
///
/// Returns `None` for names without the extension or with a non-numeric token.
pub fn parse_change_point(file_name: &str, extension: &str) -> Option<i64> {
    let stem = strip_extension(file_name, extension)?;
    let token = stem.rsplit('-').next()?;
    token.parse().ok()
}

/// Name-match used by the freshness check: the decimal change-point appears
/// anywhere in the file name.
///
/// A short name that itself contains the same digit run also matches.
pub fn mentions_change_point(file_name: &str, change_point: i64) -> bool {
    file_name.contains(&change_point.to_string())
}

fn strip_extension<'a>(file_name: &'a str, extension: &str) -> Option<&'a str> {
    file_name
        .strip_suffix(extension)
        .and_then(|rest| rest.strip_suffix('.'))
}
