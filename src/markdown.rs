// ABOUTME: Markdown source handling for the deckforge pipeline
// ABOUTME: Parses `%` frontmatter and splits the body into paragraph blocks

use serde::Serialize;

/// Deck-level metadata from the optional frontmatter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeckMeta {
    pub title: String,
    pub author: Option<String>,
    pub date: Option<String>,
}

impl Default for DeckMeta {
    fn default() -> Self {
        Self {
            title: "Presentation".to_string(),
            author: None,
            date: None,
        }
    }
}

/// Parse frontmatter in the format: % Title\n% Author\n% Date
///
/// Any leading run of `%` lines is consumed (title, then author, then
/// date); the remaining text is returned as the body.
pub fn parse_frontmatter(content: &str) -> (DeckMeta, String) {
    let lines: Vec<&str> = content.lines().collect();
    let mut meta = DeckMeta::default();

    let header: Vec<String> = lines
        .iter()
        .take(3)
        .take_while(|line| line.starts_with("% "))
        .map(|line| line.trim_start_matches("% ").trim().to_string())
        .collect();

    if header.is_empty() {
        return (meta, content.to_string());
    }

    let non_empty = |s: &String| if s.is_empty() { None } else { Some(s.clone()) };
    if let Some(title) = header.first().and_then(non_empty) {
        meta.title = title;
    }
    meta.author = header.get(1).and_then(non_empty);
    meta.date = header.get(2).and_then(non_empty);

    // Skip optional blank lines after the frontmatter
    let mut start_idx = header.len();
    while start_idx < lines.len() && lines[start_idx].trim().is_empty() {
        start_idx += 1;
    }

    (meta, lines[start_idx..].join("\n"))
}

/// Split text into blocks separated by blank lines, in input order.
/// Blocks are trimmed; empty blocks are dropped.
pub fn split_blocks(body: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in body.lines() {
        if line.trim().is_empty() {
            flush(&mut current, &mut blocks);
        } else {
            current.push(line.trim_end());
        }
    }
    flush(&mut current, &mut blocks);

    blocks
}

fn flush(current: &mut Vec<&str>, blocks: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let block = current.join("\n").trim().to_string();
    if !block.is_empty() {
        blocks.push(block);
    }
    current.clear();
}
