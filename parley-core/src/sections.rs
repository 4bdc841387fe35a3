//! Splitting model output into labeled sections
//!
//! Models are asked for labeled sections but format them freely:
//! `### Nucleus (Content)`, `1. NUCLEUS: ...`, `**Nucleus**`, `VERDICT - HOLDS`.
//! A line opens a section when, after stripping heading, list and emphasis
//! markers, it starts with the keyword as a whole word, and the line either
//! carried such a marker or spells the keyword in uppercase. Body prose like
//! "echo chambers" therefore never opens a section.

/// A labeled section found in model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Index into the keyword list passed to [`split`]
    pub keyword: usize,
    /// Section text, trimmed; includes any text on the heading line
    pub body: String,
}

/// Split `text` into sections for the given uppercase keywords.
///
/// Only the first heading for each keyword counts. Text before the first
/// heading is dropped.
pub fn split(text: &str, keywords: &[&str]) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut seen = vec![false; keywords.len()];

    for line in text.lines() {
        if let Some((keyword, rest)) = heading(line, keywords) {
            if !seen[keyword] {
                seen[keyword] = true;
                sections.push(Section {
                    keyword,
                    body: rest.to_string(),
                });
                continue;
            }
        }

        if let Some(current) = sections.last_mut() {
            if !current.body.is_empty() || !line.trim().is_empty() {
                current.body.push('\n');
                current.body.push_str(line);
            }
        }
    }

    for section in &mut sections {
        section.body = section.body.trim().to_string();
    }
    sections
}

/// Find the body of one keyword's section
pub fn find<'a>(sections: &'a [Section], keyword: usize) -> Option<&'a str> {
    sections
        .iter()
        .find(|s| s.keyword == keyword)
        .map(|s| s.body.as_str())
}

/// Break a section body into items: bullet or numbered lines, or the whole
/// body as one item when it has no list markers.
pub fn items(body: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    let mut saw_marker = false;

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match strip_list_marker(trimmed) {
            Some(item) => {
                saw_marker = true;
                items.push(item.to_string());
            }
            None if saw_marker => {
                if let Some(last) = items.last_mut() {
                    last.push(' ');
                    last.push_str(trimmed);
                }
            }
            None => {}
        }
    }

    if !saw_marker {
        let whole = body.trim();
        if !whole.is_empty() {
            items.push(whole.to_string());
        }
    }
    items
}

fn heading<'a>(line: &'a str, keywords: &[&str]) -> Option<(usize, &'a str)> {
    let trimmed = line.trim();
    let stripped = trimmed.trim_start_matches(|c: char| {
        c == '#' || c == '*' || c == '_' || c == '>' || c.is_whitespace()
    });
    let had_marker = stripped.len() != trimmed.len();

    let (stripped, numbered) = match strip_number(stripped) {
        Some(rest) => (rest, true),
        None => (stripped, false),
    };
    let stripped = stripped.trim_start_matches(|c: char| c == '*' || c == '_' || c.is_whitespace());

    for (index, keyword) in keywords.iter().enumerate() {
        let Some(prefix) = stripped.get(..keyword.len()) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case(keyword) {
            continue;
        }
        let after = &stripped[keyword.len()..];
        if after.chars().next().is_some_and(|c| c.is_alphanumeric()) {
            continue;
        }
        if !(had_marker || numbered || prefix == *keyword) {
            continue;
        }
        return Some((index, heading_remainder(after)));
    }
    None
}

/// Strip a leading `1.` / `2)` list number
fn strip_number(s: &str) -> Option<&str> {
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &s[digits..];
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .map(str::trim_start)
}

/// Text after the keyword on a heading line, minus a trailing label like
/// `(Content)` and separators
fn heading_remainder(after: &str) -> &str {
    let mut rest = after.trim_start_matches(|c: char| c == '*' || c == '_' || c.is_whitespace());
    if rest.starts_with('(') {
        if let Some(close) = rest.find(')') {
            rest = &rest[close + 1..];
        }
    }
    rest.trim_start_matches(|c: char| {
        c == ':' || c == '-' || c == '\u{2014}' || c == '\u{2013}' || c == '*' || c == '_' || c.is_whitespace()
    })
    .trim_end()
}

fn strip_list_marker(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "\u{2022} "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest.trim());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYWORDS: &[&str] = &["NUCLEUS", "SHELL", "CORONA", "ECHO"];

    #[test]
    fn test_markdown_headings() {
        let text = "## JOINT BEAN\n\n### Nucleus (Content)\nThe insight.\n\n### Shell (Metadata)\n- Topic: x\n### Corona\n- supports: y\n### Echo (Provenance)\n- Rounds: 3\n";
        let sections = split(text, KEYWORDS);
        assert_eq!(sections.len(), 4);
        assert_eq!(find(&sections, 0), Some("The insight."));
        assert_eq!(find(&sections, 1), Some("- Topic: x"));
        assert_eq!(find(&sections, 3), Some("- Rounds: 3"));
    }

    #[test]
    fn test_numbered_headings_with_inline_text() {
        let text = "1. NUCLEUS: merged idea\n2. SHELL - meta\n3. CORONA\nlinks\n4. ECHO: provenance";
        let sections = split(text, KEYWORDS);
        assert_eq!(find(&sections, 0), Some("merged idea"));
        assert_eq!(find(&sections, 1), Some("meta"));
        assert_eq!(find(&sections, 2), Some("links"));
        assert_eq!(find(&sections, 3), Some("provenance"));
    }

    #[test]
    fn test_prose_does_not_open_section() {
        let text = "### NUCLEUS\nEcho chambers form when shell companies dominate.\n";
        let sections = split(text, KEYWORDS);
        assert_eq!(sections.len(), 1);
        assert!(find(&sections, 0).unwrap().contains("Echo chambers"));
        assert!(find(&sections, 3).is_none());
    }

    #[test]
    fn test_keyword_must_be_whole_word() {
        let text = "**SHELLFISH** are not sections\n**Shell**\nreal";
        let sections = split(text, KEYWORDS);
        assert_eq!(sections.len(), 1);
        assert_eq!(find(&sections, 1), Some("real"));
    }

    #[test]
    fn test_first_heading_wins() {
        let text = "### ECHO\nfirst\n### ECHO\nsecond";
        let sections = split(text, KEYWORDS);
        assert_eq!(sections.len(), 1);
        assert_eq!(find(&sections, 3), Some("first\n### ECHO\nsecond"));
    }

    #[test]
    fn test_items_from_bullets() {
        let body = "- one\n- two\n  continued\n3. three";
        assert_eq!(items(body), vec!["one", "two continued", "three"]);
    }

    #[test]
    fn test_items_from_paragraph() {
        assert_eq!(items("Just prose here."), vec!["Just prose here."]);
        assert!(items("   ").is_empty());
    }
}
