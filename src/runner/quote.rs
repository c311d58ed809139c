//! Shell quoting for commands forwarded through a remote shell

/// Quote `s` so that a POSIX shell reads it back as a single word.
///
/// Backslashes and double quotes are escaped. A string containing a space is
/// wrapped in double quotes; otherwise single quotes are backslash-escaped.
pub fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    if escaped.contains(' ') {
        format!("\"{}\"", escaped)
    } else {
        escaped.replace('\'', "\\'")
    }
}
