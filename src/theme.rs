// ABOUTME: Theme selection for the deckforge pipeline
// ABOUTME: Picks a palette and fonts from analysis context and enforces WCAG contrast

use crate::analyzer::{Audience, ContentAnalysis, Domain, Tone};
use crate::errors::Result;
use crate::rules::{Rule, RuleSet};
use log::debug;
use serde::{Deserialize, Serialize};

/// Minimum text/background contrast ratio
pub const MIN_CONTRAST: f64 = 4.5;

const BLACK: &str = "#000000";
const WHITE: &str = "#FFFFFF";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeColors {
    pub primary: String,
    pub secondary: String,
    pub background: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeFonts {
    pub heading: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spacing {
    Compact,
    Comfortable,
    Airy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emphasis {
    Subtle,
    Strong,
    Vivid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeModifiers {
    pub spacing: Spacing,
    pub emphasis: Emphasis,
    pub animations: bool,
}

/// Palette, fonts and visual modifiers for one generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeDecision {
    pub name: String,
    pub colors: ThemeColors,
    pub fonts: ThemeFonts,
    pub modifiers: ThemeModifiers,
    pub rationale: String,
}

/// The slice of an analysis that theme rules look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleContext {
    pub domain: Domain,
    pub audience: Audience,
    pub tone: Tone,
}

impl From<&ContentAnalysis> for StyleContext {
    fn from(analysis: &ContentAnalysis) -> Self {
        Self {
            domain: analysis.domain,
            audience: analysis.audience,
            tone: analysis.tone,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn theme(
    name: &str,
    primary: &str,
    secondary: &str,
    background: &str,
    text: &str,
    fonts: (&str, &str),
    spacing: Spacing,
    emphasis: Emphasis,
    animations: bool,
) -> ThemeDecision {
    ThemeDecision {
        name: name.to_string(),
        colors: ThemeColors {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
            background: background.to_string(),
            text: text.to_string(),
        },
        fonts: ThemeFonts {
            heading: fonts.0.to_string(),
            body: fonts.1.to_string(),
        },
        modifiers: ThemeModifiers {
            spacing,
            emphasis,
            animations,
        },
        rationale: String::new(),
    }
}

pub fn business_theme() -> ThemeDecision {
    theme(
        "Corporate Business",
        "#1E3A8A",
        "#3B82F6",
        "#FFFFFF",
        "#1F2937",
        ("Inter", "Inter"),
        Spacing::Comfortable,
        Emphasis::Strong,
        false,
    )
}

pub fn technical_theme() -> ThemeDecision {
    theme(
        "Technical Dark",
        "#22D3EE",
        "#A78BFA",
        "#0F172A",
        "#E2E8F0",
        ("JetBrains Mono", "Inter"),
        Spacing::Compact,
        Emphasis::Subtle,
        false,
    )
}

pub fn academic_theme() -> ThemeDecision {
    theme(
        "Academic Classic",
        "#7F1D1D",
        "#B45309",
        "#FDFBF7",
        "#2D2A26",
        ("Merriweather", "Georgia"),
        Spacing::Airy,
        Emphasis::Subtle,
        false,
    )
}

pub fn creative_theme() -> ThemeDecision {
    theme(
        "Creative Vibrant",
        "#DB2777",
        "#7C3AED",
        "#FFF7ED",
        "#F97316",
        ("Poppins", "Nunito"),
        Spacing::Airy,
        Emphasis::Vivid,
        true,
    )
}

/// The fixed fallback theme; already accessible
pub fn neutral_theme() -> ThemeDecision {
    let mut neutral = theme(
        "Neutral Light",
        "#374151",
        "#6B7280",
        "#FFFFFF",
        "#222222",
        ("Helvetica", "Helvetica"),
        Spacing::Comfortable,
        Emphasis::Subtle,
        false,
    );
    neutral.rationale = "neutral fallback".to_string();
    neutral
}

pub type ThemeRule = Rule<StyleContext, ThemeDecision>;

pub fn default_rules() -> Vec<ThemeRule> {
    vec![
        Rule::new(
            "business-family",
            80,
            |ctx: &StyleContext| {
                ctx.domain == Domain::Business
                    || ctx.audience == Audience::Executives
                    || ctx.tone == Tone::Business
            },
            |_: &StyleContext| business_theme(),
        ),
        Rule::new(
            "technical-family",
            70,
            |ctx: &StyleContext| {
                ctx.domain == Domain::Technical
                    || ctx.audience == Audience::Developers
                    || ctx.tone == Tone::Technical
            },
            |_: &StyleContext| technical_theme(),
        ),
        Rule::new(
            "academic-family",
            60,
            |ctx: &StyleContext| {
                ctx.domain == Domain::Academic
                    || ctx.audience == Audience::Researchers
                    || ctx.audience == Audience::Students
                    || ctx.tone == Tone::Academic
            },
            |_: &StyleContext| academic_theme(),
        ),
        Rule::new(
            "creative-family",
            50,
            |ctx: &StyleContext| {
                ctx.domain == Domain::Creative
                    || ctx.tone == Tone::Inspirational
                    || ctx.tone == Tone::Casual
            },
            |_: &StyleContext| creative_theme(),
        ),
    ]
}

/// Priority rule dispatcher over analysis context
pub struct StyleSelector {
    rules: RuleSet<StyleContext, ThemeDecision>,
}

impl Default for StyleSelector {
    fn default() -> Self {
        Self::with_rules(default_rules())
    }
}

impl StyleSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<ThemeRule>) -> Self {
        let mut set = RuleSet::new();
        for rule in rules {
            set.add(rule);
        }
        Self { rules: set }
    }

    pub fn add_rule(&mut self, rule: ThemeRule) {
        self.rules.add(rule);
    }

    /// Total: falls back to the neutral theme, and the result always passes
    /// the contrast check
    pub fn decide(&self, context: &StyleContext) -> ThemeDecision {
        let selected = match self.rules.first_match(context) {
            Some((rule, mut decision)) => {
                if decision.rationale.is_empty() {
                    decision.rationale = format!(
                        "{} (domain={}, audience={}, tone={})",
                        rule.id, context.domain, context.audience, context.tone
                    );
                }
                decision
            }
            None => neutral_theme(),
        };
        debug!("Selected theme '{}'", selected.name);
        ensure_accessible_theme(selected)
    }
}

/// Pipeline seam for the style stage
pub trait StyleStage {
    fn decide(&self, context: &StyleContext) -> Result<ThemeDecision>;
}

impl StyleStage for StyleSelector {
    fn decide(&self, context: &StyleContext) -> Result<ThemeDecision> {
        Ok(StyleSelector::decide(self, context))
    }
}

/// Parse `#RGB` or `#RRGGBB` into channel bytes
pub fn parse_hex_color(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
            Some((expand(0)?, expand(1)?, expand(2)?))
        }
        6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        _ => None,
    }
}

fn linearize(channel: u8) -> f64 {
    let c = channel as f64 / 255.0;
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// WCAG relative luminance of a hex color
pub fn relative_luminance(color: &str) -> Option<f64> {
    let (r, g, b) = parse_hex_color(color)?;
    Some(0.2126 * linearize(r) + 0.7152 * linearize(g) + 0.0722 * linearize(b))
}

/// WCAG contrast ratio between two hex colors, in [1, 21]
pub fn contrast_ratio(a: &str, b: &str) -> Option<f64> {
    let la = relative_luminance(a)?;
    let lb = relative_luminance(b)?;
    Some((la.max(lb) + 0.05) / (la.min(lb) + 0.05))
}

/// Replace the text color with black or white when it does not reach the
/// minimum contrast against the background. Idempotent.
pub fn ensure_accessible_theme(mut theme: ThemeDecision) -> ThemeDecision {
    if parse_hex_color(&theme.colors.background).is_none() {
        theme.colors.background = WHITE.to_string();
        append_note(&mut theme.rationale, "unreadable background replaced with white");
    }

    let background = theme.colors.background.clone();
    let current = contrast_ratio(&theme.colors.text, &background).unwrap_or(0.0);
    if current >= MIN_CONTRAST {
        return theme;
    }

    let on_black = contrast_ratio(BLACK, &background).unwrap_or(0.0);
    let on_white = contrast_ratio(WHITE, &background).unwrap_or(0.0);
    let replacement = if on_black >= on_white { BLACK } else { WHITE };

    append_note(
        &mut theme.rationale,
        &format!(
            "text color {} adjusted to {} for contrast (was {:.2})",
            theme.colors.text, replacement, current
        ),
    );
    theme.colors.text = replacement.to_string();
    theme
}

fn append_note(rationale: &mut String, note: &str) {
    if rationale.is_empty() {
        rationale.push_str(note);
    } else {
        rationale.push_str("; ");
        rationale.push_str(note);
    }
}
