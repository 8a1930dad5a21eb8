//! String rules applied to every value that ends up in an envelope.
//!
//! The ingestion side parses the envelope with RFC 5424 structured-data
//! semantics, so header fields must be printable ASCII and length-capped,
//! parameter names may not contain `=`, `]` or `"`, and parameter values
//! must have `\`, `"` and `]` backslash-escaped.

/// Maximum length of a structured-data parameter name.
pub const MAX_KEY_LENGTH: usize = 32;

/// Maximum length of the MSGID header field.
pub const MAX_MESSAGE_ID_LENGTH: usize = 32;

/// Maximum length of the APP-NAME header field.
pub const MAX_APP_NAME_LENGTH: usize = 48;

fn is_printable_ascii(c: char) -> bool {
    matches!(c, '\u{20}'..='\u{7e}')
}

/// Remove every character outside the printable ASCII range (0x20..=0x7E).
pub fn as_printable_ascii(s: &str) -> String {
    s.chars().filter(|c| is_printable_ascii(*c)).collect()
}

/// Truncate `s` to at most `max` characters.
pub fn with_max_length(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Drop one pair of enclosing double quotes, then turn `\"` back into `"`.
///
/// Property values rendered by the host arrive quoted (`"abc"`); they are
/// quoted again by the protocol, so the caller's quoting is undone first.
pub fn trim_and_unescape_quotes(s: &str) -> String {
    let inner = if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    };
    inner.replace("\\\"", "\"")
}

/// Backslash-escape `\`, `"` and `]` so the value can sit inside a quoted
/// structured-data parameter.
pub fn escape_structured_data_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '"' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Sanitize a structured-data parameter name.
pub fn clean_key(s: &str) -> String {
    let stripped: String = as_printable_ascii(s)
        .chars()
        .filter(|c| !matches!(c, '=' | ']' | '"'))
        .collect();
    with_max_length(&stripped, MAX_KEY_LENGTH)
}

/// Sanitize a property value: unwrap the caller's quoting, then apply the
/// protocol escaping exactly once.
pub fn clean_value(s: &str) -> String {
    escape_structured_data_value(&trim_and_unescape_quotes(s))
}
