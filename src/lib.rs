// ABOUTME: Library module for the deckforge program.
// ABOUTME: Contains the analysis, layout, theme, template and composition pipeline.

// Reexport modules
pub mod analyzer;
pub mod cache;
pub mod composer;
pub mod config;
pub mod errors;
pub mod html;
pub mod layout;
pub mod markdown;
pub mod orchestrator;
pub mod rules;
pub mod sanitize;
pub mod template;
pub mod theme;

// Reexport common types and functions
pub use analyzer::{AnalysisStage, ContentAnalysis, ContentAnalyzer};
pub use cache::{CacheStats, LruCache};
pub use composer::{ComposerConfig, Slide, SlideComposer};
pub use config::{init_logging, Config};
pub use errors::{DeckError, Result};
pub use html::{render_deck_html, write_html_to_file};
pub use layout::{LayoutDecision, LayoutEngine, LayoutKind, LayoutStage};
pub use markdown::DeckMeta;
pub use orchestrator::{
    CancellationToken, GenerateRequest, GenerationOutput, Orchestrator, Phase, Progress,
};
pub use template::{RenderRequest, RenderResult, Template, TemplateEngine, TemplateSet};
pub use theme::{ensure_accessible_theme, StyleContext, StyleSelector, StyleStage, ThemeDecision};
