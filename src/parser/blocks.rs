use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "text";

/// One normalized piece of lesson content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Heading { text: String, level: u8 },
    Paragraph { text: String },
    Code { text: String, language: String },
    List { items: Vec<String>, level: u8 },
}

impl ContentBlock {
    /// Heading text and level, when this block is a heading.
    pub fn as_heading(&self) -> Option<(&str, u8)> {
        match self {
            ContentBlock::Heading { text, level } => Some((text.as_str(), *level)),
            _ => None,
        }
    }
}

/// Collapse a run of text nodes into one line. Whitespace runs inside and
/// between nodes become single spaces; leading and trailing space is dropped.
pub fn join_text<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    pieces
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize raw code text: trailing whitespace trimmed per line, leading and
/// trailing blank lines removed. Indentation is kept.
pub fn normalize_code(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim_end).collect();
    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_text_drops_blank_pieces() {
        let pieces = ["  Hello", "\n  ", "world  ", ""];
        assert_eq!(join_text(pieces.into_iter()), "Hello world");
    }

    #[test]
    fn join_text_collapses_wrapped_source() {
        let pieces = ["Agents are\n      programs", "  that\tact "];
        assert_eq!(join_text(pieces.into_iter()), "Agents are programs that act");
    }

    #[test]
    fn normalize_code_keeps_indentation() {
        let raw = "\n\ndef f():   \n    return 1\n\n";
        assert_eq!(normalize_code(raw), "def f():\n    return 1");
    }

    #[test]
    fn normalize_code_blank_is_empty() {
        assert_eq!(normalize_code("  \n \n"), "");
    }

    #[test]
    fn serializes_with_type_tag() {
        let block = ContentBlock::Code {
            text: "x = 1".into(),
            language: "python".into(),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "code");
        assert_eq!(json["language"], "python");
    }
}
