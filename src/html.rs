// ABOUTME: HTML export module for deckforge
// ABOUTME: Converts composed slide markdown to a themed standalone HTML document

use crate::errors::{DeckError, Result};
use crate::orchestrator::GenerationOutput;
use crate::theme::{Emphasis, Spacing, ThemeDecision};
use comrak::{markdown_to_html, ComrakOptions};
use log::info;
use std::fs;
use std::path::Path;

/// Build an HTML document with one `<div>` per slide under `<body>`
pub fn render_deck_html(output: &GenerationOutput) -> String {
    info!("Rendering {} slides to HTML", output.slides.len());

    // Raw HTML in slide text is never passed through
    let options = ComrakOptions::default();

    let mut html_doc = String::from("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html_doc.push_str("<meta charset=\"UTF-8\">\n");
    html_doc.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html_doc.push_str(&format!(
        "<title>{}</title>\n",
        escape_html(&output.meta.title)
    ));
    if let Some(author) = &output.meta.author {
        html_doc.push_str(&format!(
            "<meta name=\"author\" content=\"{}\">\n",
            escape_html(author)
        ));
    }
    html_doc.push_str(&theme_stylesheet(&output.theme));
    html_doc.push_str("</head>\n<body>\n");

    for slide in &output.slides {
        html_doc.push_str(&format!(
            "<div class=\"slide slide-{}\" data-index=\"{}\">\n",
            slide.layout,
            slide.index + 1
        ));
        html_doc.push_str(&markdown_to_html(slide_body(&slide.content), &options));
        html_doc.push_str("</div>\n");
    }

    html_doc.push_str("</body>\n</html>");
    html_doc
}

/// Slide markdown without its leading `<!-- slide ... -->` header line
fn slide_body(content: &str) -> &str {
    match content.split_once('\n') {
        Some((first, rest)) if first.starts_with("<!--") && first.ends_with("-->") => rest,
        _ => content,
    }
}

fn theme_stylesheet(theme: &ThemeDecision) -> String {
    let padding = match theme.modifiers.spacing {
        Spacing::Compact => "2rem",
        Spacing::Comfortable => "3rem",
        Spacing::Airy => "4.5rem",
    };
    let heading_weight = match theme.modifiers.emphasis {
        Emphasis::Subtle => 500,
        Emphasis::Strong => 700,
        Emphasis::Vivid => 800,
    };
    let transition = if theme.modifiers.animations {
        "transition: opacity 0.4s ease-in-out;"
    } else {
        ""
    };

    format!(
        "<style>\n\
         body {{ margin: 0; background: {bg}; color: {text}; font-family: '{body}', sans-serif; }}\n\
         .slide {{ min-height: 100vh; box-sizing: border-box; padding: {padding}; {transition} }}\n\
         .slide h1, .slide h2, .slide h3 {{ font-family: '{heading}', sans-serif; color: {primary}; font-weight: {weight}; }}\n\
         .slide blockquote {{ border-left: 0.3rem solid {secondary}; padding-left: 1rem; }}\n\
         </style>\n",
        bg = theme.colors.background,
        text = theme.colors.text,
        body = theme.fonts.body,
        heading = theme.fonts.heading,
        primary = theme.colors.primary,
        secondary = theme.colors.secondary,
        weight = heading_weight,
        padding = padding,
        transition = transition,
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Utility function to write HTML content to a file
pub fn write_html_to_file(html_content: &str, output_path: &Path) -> Result<()> {
    info!("Writing HTML to file: {:?}", output_path);

    // Ensure parent directory exists
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(DeckError::FileReadError)?;
        }
    }

    fs::write(output_path, html_content).map_err(DeckError::FileReadError)?;

    Ok(())
}
