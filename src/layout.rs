// ABOUTME: Layout decision engine for the deckforge pipeline
// ABOUTME: Maps each text block to a layout through priority-ordered rules

use crate::errors::Result;
use crate::rules::{Rule, RuleSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    Title,
    Comparison,
    Quote,
    List,
    Image,
    Default,
}

impl LayoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutKind::Title => "title",
            LayoutKind::Comparison => "comparison",
            LayoutKind::Quote => "quote",
            LayoutKind::List => "list",
            LayoutKind::Image => "image",
            LayoutKind::Default => "default",
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type LayoutParams = BTreeMap<String, Value>;

/// The chosen arrangement for one text block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDecision {
    #[serde(rename = "type")]
    pub kind: LayoutKind,
    pub params: LayoutParams,
    pub rationale: String,
    pub score: i32,
}

impl LayoutDecision {
    /// Returned when no rule matches, and substituted for missing decisions
    pub fn fallback() -> Self {
        let mut params = LayoutParams::new();
        params.insert("columns".to_string(), json!(1));
        params.insert("variant".to_string(), json!("center"));
        Self {
            kind: LayoutKind::Default,
            params,
            rationale: "fallback-default".to_string(),
            score: 0,
        }
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn param_strings(&self, key: &str) -> Vec<String> {
        self.params
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// What a rule produces; unset fields are filled from the rule itself
#[derive(Debug, Clone)]
pub struct PartialDecision {
    pub kind: LayoutKind,
    pub params: Option<LayoutParams>,
    pub rationale: Option<String>,
    pub score: Option<i32>,
}

impl PartialDecision {
    pub fn of(kind: LayoutKind) -> Self {
        Self {
            kind,
            params: None,
            rationale: None,
            score: None,
        }
    }

    pub fn with_params(mut self, params: LayoutParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

pub type LayoutRule = Rule<str, PartialDecision>;

/// Post-processing over a whole deck's decisions
pub trait FlowOptimizer: Send + Sync {
    fn optimize(&self, decisions: Vec<LayoutDecision>) -> Vec<LayoutDecision>;
}

/// Leaves decisions untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFlow;

impl FlowOptimizer for IdentityFlow {
    fn optimize(&self, decisions: Vec<LayoutDecision>) -> Vec<LayoutDecision> {
        decisions
    }
}

pub(crate) static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}#{1,6}\s*(\S.*)$").expect("heading pattern"));
pub(crate) static BULLET_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+\x{2022}]|\d+[.)])\s+(.+)$").expect("bullet pattern"));
pub(crate) static MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(\s*([^)\s]+)[^)]*\)").expect("image pattern"));
pub(crate) static BARE_IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bhttps?://[^\s)<>]+\.(?:png|jpe?g|gif|svg|webp)(?:\?[^\s)<>]*)?")
        .expect("image url pattern")
});
static TITLE_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btitle\b").expect("title pattern"));
static VERSUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(vs\.?|versus)(\s|$)").expect("versus pattern"));
static PROS_CONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(pros|cons)\s*:").expect("pros/cons pattern"));

/// Image references in order of appearance: markdown images first, then bare URLs
pub fn extract_image_refs(text: &str) -> Vec<String> {
    let mut refs: Vec<String> = MARKDOWN_IMAGE
        .captures_iter(text)
        .filter_map(|c| c.get(2).map(|m| m.as_str().to_string()))
        .collect();
    for m in BARE_IMAGE_URL.find_iter(text) {
        let url = m.as_str().to_string();
        if !refs.contains(&url) {
            refs.push(url);
        }
    }
    refs
}

fn first_line(text: &str) -> &str {
    text.lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
}

fn bullet_count(text: &str) -> usize {
    text.lines().filter(|line| BULLET_LINE.is_match(line)).count()
}

fn is_quote(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('>') || trimmed.starts_with('\u{201C}')
}

fn is_comparison(text: &str) -> bool {
    VERSUS.is_match(first_line(text)) || PROS_CONS.find_iter(text).count() >= 2
}

fn is_title(text: &str) -> bool {
    let line = first_line(text);
    HEADING.is_match(line) || TITLE_KEYWORD.is_match(line)
}

/// The built-in rules, highest priority first
pub fn default_rules() -> Vec<LayoutRule> {
    vec![
        Rule::new(
            "image-reference",
            90,
            |text: &str| !extract_image_refs(text).is_empty(),
            |text: &str| {
                let mut params = LayoutParams::new();
                params.insert("images".to_string(), json!(extract_image_refs(text)));
                PartialDecision::of(LayoutKind::Image).with_params(params)
            },
        ),
        Rule::new(
            "quote-marker",
            80,
            is_quote,
            |_: &str| PartialDecision::of(LayoutKind::Quote),
        ),
        Rule::new(
            "comparison-structure",
            70,
            is_comparison,
            |_: &str| {
                let mut params = LayoutParams::new();
                params.insert("columns".to_string(), json!(2));
                PartialDecision::of(LayoutKind::Comparison).with_params(params)
            },
        ),
        Rule::new(
            "bullet-list",
            60,
            |text: &str| bullet_count(text) >= 2,
            |text: &str| {
                let items = bullet_count(text);
                let mut params = LayoutParams::new();
                params.insert("items".to_string(), json!(items));
                params.insert("columns".to_string(), json!(if items <= 6 { 1 } else { 2 }));
                PartialDecision::of(LayoutKind::List).with_params(params)
            },
        ),
        Rule::new(
            "title-cue",
            50,
            is_title,
            |_: &str| PartialDecision::of(LayoutKind::Title),
        ),
    ]
}

/// Priority rule dispatcher over text blocks
pub struct LayoutEngine {
    rules: RuleSet<str, PartialDecision>,
    flow: Box<dyn FlowOptimizer>,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::with_rules(default_rules())
    }
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with exactly the given rules
    pub fn with_rules(rules: Vec<LayoutRule>) -> Self {
        let mut set = RuleSet::new();
        for rule in rules {
            set.add(rule);
        }
        Self {
            rules: set,
            flow: Box::new(IdentityFlow),
        }
    }

    pub fn with_flow_optimizer(mut self, flow: impl FlowOptimizer + 'static) -> Self {
        self.flow = Box::new(flow);
        self
    }

    pub fn add_rule(&mut self, rule: LayoutRule) {
        self.rules.add(rule);
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.ids()
    }

    pub fn decide(&self, text: &str) -> LayoutDecision {
        match self.rules.first_match(text) {
            Some((rule, partial)) => LayoutDecision {
                kind: partial.kind,
                params: partial.params.unwrap_or_default(),
                rationale: partial.rationale.unwrap_or_else(|| rule.id.clone()),
                score: partial.score.unwrap_or(rule.priority),
            },
            None => LayoutDecision::fallback(),
        }
    }

    /// Element-wise, order-preserving
    pub fn decide_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<LayoutDecision> {
        texts.iter().map(|text| self.decide(text.as_ref())).collect()
    }

    pub fn optimize_flow(&self, decisions: Vec<LayoutDecision>) -> Vec<LayoutDecision> {
        self.flow.optimize(decisions)
    }
}

/// Pipeline seam for the layout stage
pub trait LayoutStage {
    fn decide(&self, text: &str) -> Result<LayoutDecision>;

    fn optimize_flow(&self, decisions: Vec<LayoutDecision>) -> Vec<LayoutDecision> {
        decisions
    }
}

impl LayoutStage for LayoutEngine {
    fn decide(&self, text: &str) -> Result<LayoutDecision> {
        Ok(LayoutEngine::decide(self, text))
    }

    fn optimize_flow(&self, decisions: Vec<LayoutDecision>) -> Vec<LayoutDecision> {
        LayoutEngine::optimize_flow(self, decisions)
    }
}
