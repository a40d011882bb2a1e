// ABOUTME: Template engine for the deckforge pipeline
// ABOUTME: Validates, resolves, compiles and renders versioned inheritable slide templates

use crate::cache::{CacheStats, LruCache};
use crate::errors::{DeckError, Result};
use crate::sanitize::escape_markdown;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

const MAX_INCLUDE_DEPTH: usize = 32;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*(>)?\s*([A-Za-z0-9_.:/-]+)\s*\}\}").expect("placeholder pattern")
});

/// A named, versioned markup fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_range: Option<String>,
    pub layout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<String>>,
    pub content: String,
}

impl Template {
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        layout: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            engine_range: None,
            layout: layout.into(),
            extends: None,
            variables: None,
            content: content.into(),
        }
    }

    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    pub fn with_engine_range(mut self, range: impl Into<String>) -> Self {
        self.engine_range = Some(range.into());
        self
    }

    pub fn with_variables(mut self, variables: &[&str]) -> Self {
        self.variables = Some(variables.iter().map(|v| v.to_string()).collect());
        self
    }

    fn cache_key(&self) -> String {
        format!("{}@{}", self.id, self.version)
    }
}

/// Templates keyed by id
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: BTreeMap<String, Template>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn with(mut self, template: Template) -> Self {
        self.insert(template);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Merge another set into this one; incoming templates replace same-id entries
    pub fn extend(&mut self, other: TemplateSet) {
        self.templates.extend(other.templates);
    }

    /// Parse a JSON array of templates, or an object mapping id to template.
    /// The structural schema is checked on the raw JSON first so a missing
    /// or mistyped field is reported as a schema violation.
    pub fn from_json(raw: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(raw)?;
        let entries: Vec<(String, Value)> = match document {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let label = item
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("<entry {}>", i));
                    (label, item)
                })
                .collect(),
            Value::Object(map) => map.into_iter().collect(),
            _ => {
                return Err(DeckError::SchemaViolation {
                    id: "<root>".to_string(),
                    reason: "expected an array or an object of templates".to_string(),
                })
            }
        };

        let mut set = TemplateSet::new();
        for (label, item) in entries {
            check_json_schema(&label, &item)?;
            let template: Template =
                serde_json::from_value(item).map_err(|e| DeckError::SchemaViolation {
                    id: label.clone(),
                    reason: e.to_string(),
                })?;
            if template.id != label && !label.starts_with("<entry") {
                return Err(DeckError::SchemaViolation {
                    id: label,
                    reason: format!("key does not match template id '{}'", template.id),
                });
            }
            set.insert(template);
        }
        Ok(set)
    }

    /// The slide templates the composer renders with
    pub fn builtin() -> Self {
        TemplateSet::new()
            .with(
                Template::new(
                    "partial:meta",
                    "1.0.0",
                    "partial",
                    "<!-- slide {{index}} | layout: {{layout}} | theme: {{theme}} -->\n",
                )
                .with_variables(&["index", "layout", "theme"]),
            )
            .with(
                Template::new("slide:base", "1.0.0", "base", "{{> partial:meta}}{{body}}\n")
                    .with_engine_range(">=0.1.0")
                    .with_variables(&["body"]),
            )
            .with(
                Template::new(
                    "slide:title",
                    "1.0.0",
                    "title",
                    "{{> partial:meta}}# {{title}}\n{{subtitle}}\n",
                )
                .extending("slide:base")
                .with_variables(&["title", "subtitle"]),
            )
            .with(Template::new("slide:content", "1.0.0", "default", "").extending("slide:base"))
            .with(
                Template::new(
                    "slide:list",
                    "1.0.0",
                    "list",
                    "{{> partial:meta}}{{heading}}{{items}}\n",
                )
                .extending("slide:base")
                .with_variables(&["heading", "items"]),
            )
            .with(
                Template::new(
                    "slide:comparison",
                    "1.0.0",
                    "comparison",
                    "{{> partial:meta}}{{heading}}### {{left.label}}\n\n{{left.body}}\n\n### {{right.label}}\n\n{{right.body}}\n",
                )
                .extending("slide:base")
                .with_variables(&["heading", "left", "right"]),
            )
            .with(
                Template::new(
                    "slide:quote",
                    "1.0.0",
                    "quote",
                    "{{> partial:meta}}> {{quote}}{{attribution}}\n",
                )
                .extending("slide:base")
                .with_variables(&["quote", "attribution"]),
            )
            .with(
                Template::new(
                    "slide:image",
                    "1.0.0",
                    "image",
                    "{{> partial:meta}}![{{alt}}]({{src}})\n{{caption}}\n",
                )
                .extending("slide:base")
                .with_variables(&["alt", "src", "caption"]),
            )
    }
}

fn check_json_schema(label: &str, item: &Value) -> Result<()> {
    let violation = |reason: String| DeckError::SchemaViolation {
        id: label.to_string(),
        reason,
    };

    let object = item
        .as_object()
        .ok_or_else(|| violation("template must be an object".to_string()))?;

    for field in ["id", "version", "layout", "content"] {
        match object.get(field) {
            Some(Value::String(_)) => {}
            Some(_) => return Err(violation(format!("'{}' must be a string", field))),
            None => return Err(violation(format!("missing required field '{}'", field))),
        }
    }
    for field in ["engineRange", "extends"] {
        match object.get(field) {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(_) => return Err(violation(format!("'{}' must be a string", field))),
        }
    }
    match object.get("variables") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => {}
        Some(_) => {
            return Err(violation(
                "'variables' must be an array of strings".to_string(),
            ))
        }
    }
    Ok(())
}

/// One unit of a compiled template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    Variable(String),
    Partial(String),
}

/// Split content into literal text, `{{name}}` and `{{> name}}` tokens
pub fn tokenize(content: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cursor = 0;
    for captures in PLACEHOLDER.captures_iter(content) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(2)) else {
            continue;
        };
        if whole.start() > cursor {
            tokens.push(Token::Text(content[cursor..whole.start()].to_string()));
        }
        let name = name.as_str().to_string();
        if captures.get(1).is_some() {
            tokens.push(Token::Partial(name));
        } else {
            tokens.push(Token::Variable(name));
        }
        cursor = whole.end();
    }
    if cursor < content.len() {
        tokens.push(Token::Text(content[cursor..].to_string()));
    }
    tokens
}

/// A template with its inheritance chain applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
    pub template: Template,
    /// Requested id first, root last
    pub chain: Vec<String>,
}

/// The reusable render form of one resolved template
#[derive(Debug)]
pub struct CompiledTemplate {
    pub key: String,
    pub chain: Vec<String>,
    tokens: Vec<Token>,
}

impl CompiledTemplate {
    fn new(key: String, resolved: ResolvedTemplate) -> Self {
        Self {
            key,
            tokens: tokenize(&resolved.template.content),
            chain: resolved.chain,
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

/// Parameters for one render call
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub template_id: &'a str,
    pub values: &'a Value,
    pub escape_markdown: bool,
    pub debug: bool,
}

impl<'a> RenderRequest<'a> {
    pub fn new(template_id: &'a str, values: &'a Value) -> Self {
        Self {
            template_id,
            values,
            escape_markdown: true,
            debug: false,
        }
    }

    /// Substitute values verbatim
    pub fn raw(mut self) -> Self {
        self.escape_markdown = false;
        self
    }

    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderDebug {
    pub token_count: usize,
    pub missing_variables: Vec<String>,
    pub partials: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderResult {
    pub output: String,
    pub template_id: String,
    pub chain: Vec<String>,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<RenderDebug>,
}

/// Configuration for the template engine
#[derive(Debug, Clone)]
pub struct TemplateEngineConfig {
    pub engine_version: String,
    pub cache_size: usize,
}

impl Default for TemplateEngineConfig {
    fn default() -> Self {
        Self {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            cache_size: 64,
        }
    }
}

#[derive(Default)]
struct RenderTrace {
    include_stack: Vec<String>,
    missing: Vec<String>,
    partials: Vec<String>,
}

/// Owns a template set and the compiled-renderer cache for it
pub struct TemplateEngine {
    templates: TemplateSet,
    engine_version: Version,
    cache: LruCache<String, Arc<CompiledTemplate>>,
    compile_count: usize,
}

impl TemplateEngine {
    pub fn new(templates: TemplateSet, config: TemplateEngineConfig) -> Result<Self> {
        let engine_version = Version::parse(&config.engine_version).map_err(|e| {
            DeckError::ConfigError(format!(
                "invalid engine version '{}': {}",
                config.engine_version, e
            ))
        })?;
        Ok(Self {
            templates,
            engine_version,
            cache: LruCache::new(config.cache_size),
            compile_count: 0,
        })
    }

    /// An engine over the built-in slide templates
    pub fn builtin() -> Result<Self> {
        Self::new(TemplateSet::builtin(), TemplateEngineConfig::default())
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    pub fn engine_version(&self) -> &Version {
        &self.engine_version
    }

    /// Validate every template: schema, engine range, parent existence,
    /// then inheritance cycles
    pub fn validate_set(&self) -> Result<()> {
        for (key, template) in &self.templates.templates {
            check_schema(key, template)?;
            self.check_engine_range(template)?;
        }
        for template in self.templates.templates.values() {
            if let Some(parent) = &template.extends {
                if !self.templates.contains(parent) {
                    return Err(DeckError::MissingTemplate(format!(
                        "{} (extended by {})",
                        parent, template.id
                    )));
                }
            }
        }
        self.detect_cycles()?;
        info!("Validated {} templates", self.templates.len());
        Ok(())
    }

    fn check_engine_range(&self, template: &Template) -> Result<()> {
        let Some(range) = &template.engine_range else {
            return Ok(());
        };
        let requirement = VersionReq::parse(range).map_err(|e| DeckError::SchemaViolation {
            id: template.id.clone(),
            reason: format!("invalid engineRange '{}': {}", range, e),
        })?;
        if requirement.matches(&self.engine_version) {
            Ok(())
        } else {
            Err(DeckError::IncompatibleEngine {
                id: template.id.clone(),
                range: range.clone(),
                engine: self.engine_version.to_string(),
            })
        }
    }

    /// Depth-first walk over `extends` edges with fresh visited/on-stack
    /// state for this pass
    fn detect_cycles(&self) -> Result<()> {
        let mut visited: HashSet<&str> = HashSet::new();
        for id in self.templates.ids() {
            let mut on_stack: Vec<&str> = Vec::new();
            self.visit(id, &mut visited, &mut on_stack)?;
        }
        Ok(())
    }

    fn visit<'s>(
        &'s self,
        id: &'s str,
        visited: &mut HashSet<&'s str>,
        on_stack: &mut Vec<&'s str>,
    ) -> Result<()> {
        if let Some(position) = on_stack.iter().position(|entry| *entry == id) {
            let mut chain: Vec<String> =
                on_stack[position..].iter().map(|s| s.to_string()).collect();
            chain.push(id.to_string());
            return Err(DeckError::InheritanceCycle(chain));
        }
        if !visited.insert(id) {
            return Ok(());
        }

        on_stack.push(id);
        if let Some(parent) = self
            .templates
            .get(id)
            .and_then(|template| template.extends.as_deref())
        {
            if self.templates.contains(parent) {
                self.visit(parent, visited, on_stack)?;
            }
        }
        on_stack.pop();
        Ok(())
    }

    /// Walk the `extends` chain to the root and merge metadata. The child's
    /// content wins unless it is empty.
    pub fn resolve(&self, id: &str) -> Result<ResolvedTemplate> {
        let mut lineage: Vec<&Template> = Vec::new();
        let mut current = self
            .templates
            .get(id)
            .ok_or_else(|| DeckError::MissingTemplate(id.to_string()))?;

        loop {
            if lineage.iter().any(|seen| seen.id == current.id) {
                let mut chain: Vec<String> = lineage.iter().map(|t| t.id.clone()).collect();
                chain.push(current.id.clone());
                return Err(DeckError::InheritanceCycle(chain));
            }
            lineage.push(current);
            match &current.extends {
                Some(parent) => {
                    current = self
                        .templates
                        .get(parent)
                        .ok_or_else(|| DeckError::MissingTemplate(parent.clone()))?;
                }
                None => break,
            }
        }

        let chain: Vec<String> = lineage.iter().map(|t| t.id.clone()).collect();
        let mut ancestors = lineage.into_iter().rev();
        let mut merged = match ancestors.next() {
            Some(root) => root.clone(),
            None => return Err(DeckError::MissingTemplate(id.to_string())),
        };
        for descendant in ancestors {
            merged = merge(merged, descendant);
        }

        Ok(ResolvedTemplate {
            template: merged,
            chain,
        })
    }

    /// Fetch the compiled form from cache, compiling on a miss
    pub fn compile(&mut self, id: &str) -> Result<(Arc<CompiledTemplate>, bool)> {
        let key = self
            .templates
            .get(id)
            .ok_or_else(|| DeckError::MissingTemplate(id.to_string()))?
            .cache_key();

        if let Some(compiled) = self.cache.get(&key) {
            debug!("Template cache hit: {}", key);
            return Ok((compiled, true));
        }

        let resolved = self.resolve(id)?;
        self.check_engine_range(&resolved.template)?;
        let compiled = Arc::new(CompiledTemplate::new(key.clone(), resolved));
        self.compile_count += 1;
        debug!("Compiled template {} ({} tokens)", key, compiled.tokens.len());
        self.cache.insert(key, Arc::clone(&compiled));
        Ok((compiled, false))
    }

    pub fn render(&mut self, request: RenderRequest<'_>) -> Result<RenderResult> {
        let (compiled, cache_hit) = self.compile(request.template_id)?;
        let mut trace = RenderTrace::default();
        let output = self.render_compiled(
            &compiled,
            request.template_id,
            request.values,
            request.escape_markdown,
            &mut trace,
        )?;

        let debug = request.debug.then(|| RenderDebug {
            token_count: compiled.tokens.len(),
            missing_variables: trace.missing,
            partials: trace.partials,
        });

        Ok(RenderResult {
            output,
            template_id: request.template_id.to_string(),
            chain: compiled.chain.clone(),
            cache_hit,
            debug,
        })
    }

    fn render_compiled(
        &mut self,
        compiled: &CompiledTemplate,
        id: &str,
        values: &Value,
        escape: bool,
        trace: &mut RenderTrace,
    ) -> Result<String> {
        if trace.include_stack.iter().any(|entry| entry == id)
            || trace.include_stack.len() >= MAX_INCLUDE_DEPTH
        {
            let mut chain = trace.include_stack.clone();
            chain.push(id.to_string());
            return Err(DeckError::PartialCycle(chain));
        }
        trace.include_stack.push(id.to_string());

        let mut output = String::new();
        for token in &compiled.tokens {
            match token {
                Token::Text(text) => output.push_str(text),
                Token::Variable(name) => match lookup(values, name) {
                    Some(value) => {
                        let text = value_to_text(value);
                        if escape {
                            output.push_str(&escape_markdown(&text));
                        } else {
                            output.push_str(&text);
                        }
                    }
                    None => {
                        if !trace.missing.contains(name) {
                            trace.missing.push(name.clone());
                        }
                    }
                },
                Token::Partial(name) => {
                    let (partial, _) = self.compile(name)?;
                    if !trace.partials.contains(name) {
                        trace.partials.push(name.clone());
                    }
                    let rendered = self.render_compiled(&partial, name, values, escape, trace)?;
                    output.push_str(&rendered);
                }
            }
        }

        trace.include_stack.pop();
        Ok(output)
    }

    /// True when the compiled form of `id` is currently cached
    pub fn is_cached(&self, id: &str) -> bool {
        self.templates
            .get(id)
            .map(|template| self.cache.contains(&template.cache_key()))
            .unwrap_or(false)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// How many times a template has been compiled (cache misses that succeeded)
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }
}

fn check_schema(key: &str, template: &Template) -> Result<()> {
    let violation = |reason: &str| {
        Err(DeckError::SchemaViolation {
            id: key.to_string(),
            reason: reason.to_string(),
        })
    };

    if template.id.trim().is_empty() {
        return violation("id must not be empty");
    }
    if template.id != key {
        return violation("registered under a different key than its id");
    }
    if Version::parse(&template.version).is_err() {
        return violation("version must be a semantic version");
    }
    if template.layout.trim().is_empty() {
        return violation("layout must not be empty");
    }
    if template.content.trim().is_empty() && template.extends.is_none() {
        return violation("content must not be empty for a root template");
    }
    if template.extends.as_deref() == Some(template.id.as_str()) {
        return Err(DeckError::InheritanceCycle(vec![
            template.id.clone(),
            template.id.clone(),
        ]));
    }
    Ok(())
}

/// Shallow per-field merge; `variables` is the ordered union
fn merge(parent: Template, child: &Template) -> Template {
    let variables = match (parent.variables, &child.variables) {
        (None, None) => None,
        (inherited, own) => {
            let mut union = inherited.unwrap_or_default();
            for name in own.iter().flatten() {
                if !union.contains(name) {
                    union.push(name.clone());
                }
            }
            Some(union)
        }
    };

    Template {
        id: child.id.clone(),
        version: child.version.clone(),
        engine_range: child.engine_range.clone().or(parent.engine_range),
        layout: child.layout.clone(),
        extends: child.extends.clone(),
        variables,
        content: if child.content.trim().is_empty() {
            parent.content
        } else {
            child.content.clone()
        },
    }
}

/// Dotted-path lookup; numeric segments index into arrays
fn lookup<'v>(values: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = values;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}
