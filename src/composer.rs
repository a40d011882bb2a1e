// ABOUTME: Slide composition for the deckforge pipeline
// ABOUTME: Renders one slide per paragraph from its layout decision and the deck theme

use crate::errors::{DeckError, Result};
use crate::layout::{
    extract_image_refs, LayoutDecision, LayoutKind, BARE_IMAGE_URL, BULLET_LINE, HEADING,
    MARKDOWN_IMAGE,
};
use crate::sanitize::{clean_text, validate_image_ref};
use crate::template::{RenderRequest, TemplateEngine, TemplateEngineConfig, TemplateSet};
use crate::theme::ThemeDecision;
use log::{debug, warn};
use serde::Serialize;
use serde_json::{json, Map, Value};

const EMPTY_COLUMN: &str = "(none)";

/// Configuration for slide composition
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    pub max_list_items: usize,
    pub max_default_lines: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_list_items: 8,
            max_default_lines: 5,
        }
    }
}

/// One rendered slide
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slide {
    pub index: usize,
    pub layout: LayoutKind,
    pub template: String,
    pub content: String,
}

/// Renders slides through a template engine it owns
pub struct SlideComposer {
    engine: TemplateEngine,
    config: ComposerConfig,
}

impl SlideComposer {
    pub fn new(engine: TemplateEngine, config: ComposerConfig) -> Self {
        Self { engine, config }
    }

    /// A composer over the built-in templates with default limits
    pub fn builtin() -> Result<Self> {
        let engine = TemplateEngine::new(TemplateSet::builtin(), TemplateEngineConfig::default())?;
        Ok(Self::new(engine, ComposerConfig::default()))
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TemplateEngine {
        &mut self.engine
    }

    /// `decisions[i]` pairs with `paragraphs[i]`; a missing decision is
    /// replaced with the layout engine's default
    pub fn compose_slides<S: AsRef<str>>(
        &mut self,
        paragraphs: &[S],
        decisions: &[LayoutDecision],
        theme: &ThemeDecision,
    ) -> Result<Vec<Slide>> {
        if decisions.len() < paragraphs.len() {
            warn!(
                "{} paragraphs but only {} layout decisions; using the default layout for the rest",
                paragraphs.len(),
                decisions.len()
            );
        }

        let fallback = LayoutDecision::fallback();
        paragraphs
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let decision = decisions.get(index).unwrap_or(&fallback);
                self.compose_slide(index, text.as_ref(), decision, theme)
            })
            .collect()
    }

    pub fn compose_slide(
        &mut self,
        index: usize,
        text: &str,
        decision: &LayoutDecision,
        theme: &ThemeDecision,
    ) -> Result<Slide> {
        let (layout, template_id, fields) = match decision.kind {
            LayoutKind::Title => (LayoutKind::Title, "slide:title", self.title_fields(text)),
            LayoutKind::Comparison => (
                LayoutKind::Comparison,
                "slide:comparison",
                self.comparison_fields(text),
            ),
            LayoutKind::Quote => (LayoutKind::Quote, "slide:quote", quote_fields(text)),
            LayoutKind::List => (LayoutKind::List, "slide:list", self.list_fields(text)),
            LayoutKind::Image => match image_fields(text, decision) {
                Some(fields) => (LayoutKind::Image, "slide:image", fields),
                None => {
                    debug!("Slide {}: no usable image reference, rendering as text", index + 1);
                    let remaining = strip_image_refs(text);
                    (LayoutKind::Default, "slide:content", self.default_fields(&remaining))
                }
            },
            LayoutKind::Default => (
                LayoutKind::Default,
                "slide:content",
                self.default_fields(text),
            ),
        };

        let mut values = fields;
        values.insert("index".to_string(), json!(index + 1));
        values.insert("layout".to_string(), json!(layout.as_str()));
        values.insert("theme".to_string(), json!(clean_text(&theme.name)));
        let values = Value::Object(values);

        let rendered = self
            .engine
            .render(RenderRequest::new(template_id, &values).raw())
            .map_err(|e| DeckError::compose(format!("slide {} ({})", index + 1, template_id), e))?;

        Ok(Slide {
            index,
            layout,
            template: template_id.to_string(),
            content: rendered.output,
        })
    }

    fn title_fields(&self, text: &str) -> Map<String, Value> {
        let lines = non_blank_lines(text);
        let (title, rest) = match lines.split_first() {
            Some((first, rest)) => (heading_text(first).unwrap_or(strip_title_label(first)), rest),
            None => ("", &[][..]),
        };
        let subtitle: Vec<String> = rest
            .iter()
            .take(self.config.max_default_lines)
            .map(|line| clean_text(heading_text(line).unwrap_or(*line)))
            .collect();

        let mut fields = Map::new();
        fields.insert("title".to_string(), json!(clean_text(title)));
        fields.insert(
            "subtitle".to_string(),
            json!(if subtitle.is_empty() {
                String::new()
            } else {
                format!("\n{}\n", subtitle.join("\n"))
            }),
        );
        fields
    }

    fn comparison_fields(&self, text: &str) -> Map<String, Value> {
        let mut heading = None;
        let mut labels = ("Pros".to_string(), "Cons".to_string());
        let mut pros: Vec<String> = Vec::new();
        let mut cons: Vec<String> = Vec::new();
        let mut column: Option<bool> = None;
        let mut intro: Vec<String> = Vec::new();

        for (position, line) in non_blank_lines(text).into_iter().enumerate() {
            if let Some(rest) = strip_label(line, "pros:") {
                column = Some(true);
                push_point(&mut pros, rest);
            } else if let Some(rest) = strip_label(line, "cons:") {
                column = Some(false);
                push_point(&mut cons, rest);
            } else if position == 0 {
                let title = heading_text(line).unwrap_or(line);
                if let Some((left, right)) = split_versus(title) {
                    labels = (left, right);
                }
                heading = Some(title.to_string());
            } else {
                match column {
                    Some(true) => push_point(&mut pros, line),
                    Some(false) => push_point(&mut cons, line),
                    // Lines before the first label stay as body text under the heading
                    None => intro.push(clean_text(line.trim())),
                }
            }
        }

        let column_body = |points: &[String]| {
            if points.is_empty() {
                EMPTY_COLUMN.to_string()
            } else {
                points
                    .iter()
                    .take(self.config.max_list_items)
                    .map(|p| format!("- {}", p))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };

        let mut fields = Map::new();
        let mut lead = heading
            .map(|h| format!("## {}\n\n", clean_text(&h)))
            .unwrap_or_default();
        if !intro.is_empty() {
            lead.push_str(&intro.join("\n"));
            lead.push_str("\n\n");
        }
        fields.insert("heading".to_string(), json!(lead));
        fields.insert(
            "left".to_string(),
            json!({ "label": clean_text(&labels.0), "body": column_body(&pros) }),
        );
        fields.insert(
            "right".to_string(),
            json!({ "label": clean_text(&labels.1), "body": column_body(&cons) }),
        );
        fields
    }

    fn list_fields(&self, text: &str) -> Map<String, Value> {
        let lines = non_blank_lines(text);
        let heading = lines
            .first()
            .filter(|line| !BULLET_LINE.is_match(line))
            .map(|line| heading_text(line).unwrap_or(*line))
            .map(|line| format!("## {}\n\n", clean_text(line)))
            .unwrap_or_default();

        let items: Vec<String> = lines
            .iter()
            .filter_map(|line| BULLET_LINE.captures(line))
            .filter_map(|captures| captures.get(1))
            .take(self.config.max_list_items)
            .map(|item| format!("- {}", clean_text(item.as_str().trim())))
            .collect();

        let mut fields = Map::new();
        fields.insert("heading".to_string(), json!(heading));
        fields.insert("items".to_string(), json!(items.join("\n")));
        fields
    }

    fn default_fields(&self, text: &str) -> Map<String, Value> {
        let lines: Vec<&str> = non_blank_lines(text)
            .into_iter()
            .take(self.config.max_default_lines)
            .collect();

        let mut body = String::new();
        for (position, line) in lines.iter().enumerate() {
            match heading_text(line) {
                Some(title) if position == 0 => {
                    body.push_str(&format!("## {}\n\n", clean_text(title)));
                }
                Some(title) => {
                    body.push_str(&clean_text(title));
                    body.push('\n');
                }
                None => {
                    body.push_str(&clean_text(line.trim()));
                    body.push('\n');
                }
            }
        }

        let mut fields = Map::new();
        fields.insert("body".to_string(), json!(body.trim_end()));
        fields
    }
}

fn quote_fields(text: &str) -> Map<String, Value> {
    let lines = non_blank_lines(text);
    let quoted: Vec<&str> = lines
        .iter()
        .skip_while(|line| !line.trim_start().starts_with('>'))
        .take_while(|line| line.trim_start().starts_with('>'))
        .map(|line| line.trim_start().trim_start_matches('>').trim())
        .collect();

    let attribution = lines
        .iter()
        .map(|line| line.trim_start().trim_start_matches('>').trim_start())
        .find_map(|line| {
            line.strip_prefix("--")
                .or_else(|| line.strip_prefix('\u{2014}'))
                .map(str::trim)
                .filter(|author| !author.is_empty())
        });

    let quote = if quoted.is_empty() {
        lines
            .iter()
            .filter(|line| !is_attribution(line))
            .map(|line| line.trim())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        quoted
            .into_iter()
            .filter(|line| !is_attribution(line))
            .collect::<Vec<_>>()
            .join(" ")
    };
    let quote = quote
        .trim_matches(|c: char| c == '\u{201C}' || c == '\u{201D}' || c == '"')
        .trim();

    let mut fields = Map::new();
    fields.insert("quote".to_string(), json!(clean_text(quote)));
    fields.insert(
        "attribution".to_string(),
        json!(attribution
            .map(|author| format!("\n>\n> -- {}", clean_text(author)))
            .unwrap_or_default()),
    );
    fields
}

fn is_attribution(line: &str) -> bool {
    let line = line.trim_start().trim_start_matches('>').trim_start();
    line.starts_with("--") || line.starts_with('\u{2014}')
}

/// Explicit `params.images` first, then references found in the text.
/// Returns `None` when no candidate survives validation.
fn image_fields(text: &str, decision: &LayoutDecision) -> Option<Map<String, Value>> {
    let explicit = decision.param_strings("images");
    let found = extract_image_refs(text);

    let (original, src) = explicit.iter().chain(found.iter()).find_map(|candidate| {
        validate_image_ref(candidate).map(|valid| (candidate.clone(), valid))
    })?;

    let alt = MARKDOWN_IMAGE
        .captures_iter(text)
        .find(|c| c.get(2).map(|m| m.as_str()) == Some(original.as_str()))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|alt| !alt.is_empty())
        .unwrap_or_else(|| "image".to_string());

    let remaining = strip_image_refs(text);
    let caption = non_blank_lines(&remaining)
        .into_iter()
        .map(|line| heading_text(line).unwrap_or(line).trim().to_string())
        .collect::<Vec<_>>()
        .join(" ");

    let mut fields = Map::new();
    fields.insert("alt".to_string(), json!(clean_text(&alt)));
    fields.insert("src".to_string(), json!(src));
    fields.insert(
        "caption".to_string(),
        json!(if caption.is_empty() {
            String::new()
        } else {
            format!("\n{}\n", clean_text(&caption))
        }),
    );
    Some(fields)
}

/// The text with markdown images and bare image URLs removed
fn strip_image_refs(text: &str) -> String {
    let without_markup = MARKDOWN_IMAGE.replace_all(text, "");
    BARE_IMAGE_URL.replace_all(&without_markup, "").into_owned()
}

fn non_blank_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|line| !line.trim().is_empty()).collect()
}

fn heading_text(line: &str) -> Option<&str> {
    HEADING
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// Case-insensitive `label` prefix match, returning the remainder
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let trimmed = line.trim_start();
    match trimmed.get(..label.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(label) => Some(&trimmed[label.len()..]),
        _ => None,
    }
}

fn strip_title_label(line: &str) -> &str {
    strip_label(line, "title:").unwrap_or(line).trim()
}

fn split_versus(title: &str) -> Option<(String, String)> {
    let lowered = title.to_ascii_lowercase();
    for separator in [" versus ", " vs. ", " vs "] {
        if let Some(at) = lowered.find(separator) {
            let left = title[..at].trim();
            let right = title[at + separator.len()..].trim();
            if !left.is_empty() && !right.is_empty() {
                return Some((left.to_string(), right.to_string()));
            }
        }
    }
    None
}

fn push_point(points: &mut Vec<String>, raw: &str) {
    let point = BULLET_LINE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
        .trim();
    if !point.is_empty() {
        points.push(clean_text(point));
    }
}
