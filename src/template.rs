use crate::record::{LogEvent, PropertyValue};
use crate::severity::Level;
use chrono::format::{Item, StrftimeItems};

/// Renders the envelope's `message` field for an event.
///
/// Any `Fn(&LogEvent) -> String` closure implements this trait.
pub trait MessageRenderer: Send + Sync {
    fn render(&self, event: &LogEvent) -> String;
}

impl<F> MessageRenderer for F
where
    F: Fn(&LogEvent) -> String + Send + Sync,
{
    fn render(&self, event: &LogEvent) -> String {
        self(event)
    }
}

/// Default `{Timestamp}` layout: `2024-03-01 12:30:45.123 +00:00`.
const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %:z";

/// A parsed output template such as `"[{Level:u3}] {Message} ({SourceContext:l})"`.
///
/// Tokens:
/// - `{Message}`: the event message.
/// - `{Level}`: the level name; `:u3` and `:w3` give a three letter code in
///   upper or lower case.
/// - `{Timestamp}`: the event time; the format is a `chrono` strftime string.
/// - `{Exception}`: `Type: message` of the attached error, or nothing.
/// - `{NewLine}`: a line feed.
/// - `{Name}`: the `Name` property. Strings are quoted unless `:l` is given.
///   A missing property is written back as the token text.
///
/// `{{` and `}}` produce literal braces. Malformed tokens are kept as text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputTemplate {
    segments: Vec<Segment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Text(String),
    Token {
        name: String,
        format: Option<String>,
        raw: String,
    },
}

impl OutputTemplate {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((start, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    text.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let rest = &template[start + 1..];
                    match rest.find('}').and_then(|end| parse_token(&rest[..end]).map(|t| (end, t))) {
                        Some((end, (name, format))) => {
                            if !text.is_empty() {
                                segments.push(Segment::Text(std::mem::take(&mut text)));
                            }
                            segments.push(Segment::Token {
                                name,
                                format,
                                raw: template[start..start + end + 2].to_string(),
                            });
                            // Skip the token body and the closing brace.
                            while let Some((i, _)) = chars.peek() {
                                if *i > start + end + 1 {
                                    break;
                                }
                                chars.next();
                            }
                        }
                        None => text.push('{'),
                    }
                }
                other => text.push(other),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        OutputTemplate { segments }
    }
}

/// `Name` or `Name:format`, where the name is alphanumeric or `_`.
fn parse_token(body: &str) -> Option<(String, Option<String>)> {
    let (name, format) = match body.split_once(':') {
        Some((name, format)) => (name, Some(format.to_string())),
        None => (body, None),
    };
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return None;
    }
    // An unusable timestamp layout falls back to the default one.
    let format = match format {
        Some(layout) if name == "Timestamp" && StrftimeItems::new(&layout).any(|i| matches!(i, Item::Error)) => None,
        other => other,
    };
    Some((name.to_string(), format))
}

impl MessageRenderer for OutputTemplate {
    fn render(&self, event: &LogEvent) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Token { name, format, raw } => {
                    render_token(&mut out, event, name, format.as_deref(), raw)
                }
            }
        }
        out
    }
}

fn render_token(out: &mut String, event: &LogEvent, name: &str, format: Option<&str>, raw: &str) {
    match name {
        "Message" => out.push_str(&event.message),
        "Level" => out.push_str(&level_text(event.level, format)),
        "Timestamp" => {
            let layout = format.unwrap_or(DEFAULT_TIMESTAMP_FORMAT);
            out.push_str(&event.timestamp.format(layout).to_string());
        }
        "Exception" => {
            if let Some(exception) = &event.exception {
                out.push_str(&format!("{}: {}", exception.type_name, exception.message));
            }
        }
        "NewLine" => out.push('\n'),
        property => match event.properties.get(property) {
            Some(PropertyValue::String(s)) if format == Some("l") => out.push_str(s),
            Some(value) => out.push_str(&value.render()),
            None => out.push_str(raw),
        },
    }
}

fn level_text(level: Level, format: Option<&str>) -> String {
    let code = match level {
        Level::Verbose => "VRB",
        Level::Debug => "DBG",
        Level::Information => "INF",
        Level::Warning => "WRN",
        Level::Error => "ERR",
        Level::Fatal => "FTL",
    };
    match format {
        Some("u3") => code.to_string(),
        Some("w3") => code.to_ascii_lowercase(),
        _ => level.name().to_string(),
    }
}
