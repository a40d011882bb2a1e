// ABOUTME: Pipeline orchestration for deckforge
// ABOUTME: Runs analyze, layout, style and compose with caching, progress, cancellation and fallbacks

use crate::analyzer::{AnalysisStage, ContentAnalysis, ContentAnalyzer};
use crate::cache::{CacheStats, LruCache};
use crate::composer::{Slide, SlideComposer};
use crate::config::Config;
use crate::errors::{DeckError, Result};
use crate::layout::{LayoutDecision, LayoutEngine, LayoutStage};
use crate::markdown::{parse_frontmatter, split_blocks, DeckMeta};
use crate::template::{TemplateEngine, TemplateSet};
use crate::theme::{
    ensure_accessible_theme, neutral_theme, StyleContext, StyleSelector, StyleStage,
    ThemeDecision,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Pipeline state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Analyzing,
    Layouting,
    Styling,
    Composing,
    Done,
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Analyzing => "analyzing",
            Phase::Layouting => "layouting",
            Phase::Styling => "styling",
            Phase::Composing => "composing",
            Phase::Done => "done",
            Phase::Error => "error",
        }
    }

    /// Progress percent reported on entering the phase
    fn percent(&self) -> u8 {
        match self {
            Phase::Idle => 0,
            Phase::Analyzing => 5,
            Phase::Layouting => 30,
            Phase::Styling => 55,
            Phase::Composing => 80,
            Phase::Done => 100,
            Phase::Error => 100,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub phase: Phase,
    pub percent: u8,
    pub message: String,
}

pub type ProgressCallback = Box<dyn Fn(&Progress)>;

/// Pollable cancellation flag shared between a caller and a running pipeline
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One `generate` call
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub raw_markdown: String,
    pub cancel: Option<CancellationToken>,
}

impl GenerateRequest {
    pub fn new(raw_markdown: impl Into<String>) -> Self {
        Self {
            raw_markdown: raw_markdown.into(),
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepTiming {
    pub step: Phase,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<StepTiming>,
    pub total_ms: f64,
    pub analysis_cached: bool,
    pub layout_cached: bool,
    pub fallbacks: Vec<String>,
}

impl Metrics {
    pub fn step(&self, phase: Phase) -> Option<f64> {
        self.steps
            .iter()
            .find(|timing| timing.step == phase)
            .map(|timing| timing.duration_ms)
    }
}

/// Everything a successful run produces
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutput {
    pub meta: DeckMeta,
    pub analysis: ContentAnalysis,
    pub layout_decisions: Vec<LayoutDecision>,
    pub theme: ThemeDecision,
    pub slides: Vec<Slide>,
    pub metrics: Metrics,
}

impl GenerationOutput {
    /// All slides joined into one markdown document
    pub fn to_markdown(&self) -> String {
        self.slides
            .iter()
            .map(|slide| slide.content.trim_end())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
            + "\n"
    }
}

/// Content-hash key for the pipeline caches
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Sequential pipeline runner. Single owner: `generate` takes `&mut self`.
pub struct Orchestrator {
    analyzer: Box<dyn AnalysisStage>,
    layout: Box<dyn LayoutStage>,
    style: Box<dyn StyleStage>,
    composer: SlideComposer,
    analysis_cache: LruCache<String, ContentAnalysis>,
    layout_cache: LruCache<String, Vec<LayoutDecision>>,
    progress: Option<ProgressCallback>,
    phase: Phase,
}

impl Orchestrator {
    /// Build a pipeline over the built-in components and templates
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_templates(config, TemplateSet::builtin())
    }

    /// Build a pipeline whose composer renders with `templates`.
    /// The set is validated here; validation errors are returned as-is.
    pub fn with_templates(config: &Config, templates: TemplateSet) -> Result<Self> {
        config.validate()?;
        let engine = TemplateEngine::new(templates, config.template_engine_config())?;
        engine.validate_set()?;

        let ttl = config.cache_ttl();
        Ok(Self {
            analyzer: Box::new(ContentAnalyzer::new(config.analyzer_config())),
            layout: Box::new(LayoutEngine::new()),
            style: Box::new(StyleSelector::new()),
            composer: SlideComposer::new(engine, config.composer_config()),
            analysis_cache: LruCache::with_ttl(config.analysis_cache_size, ttl),
            layout_cache: LruCache::with_ttl(config.analysis_cache_size, ttl),
            progress: None,
            phase: Phase::Idle,
        })
    }

    pub fn with_analyzer(mut self, analyzer: impl AnalysisStage + 'static) -> Self {
        self.analyzer = Box::new(analyzer);
        self
    }

    pub fn with_layout(mut self, layout: impl LayoutStage + 'static) -> Self {
        self.layout = Box::new(layout);
        self
    }

    pub fn with_style(mut self, style: impl StyleStage + 'static) -> Self {
        self.style = Box::new(style);
        self
    }

    pub fn with_progress(mut self, callback: impl Fn(&Progress) + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn analysis_cache_stats(&self) -> CacheStats {
        self.analysis_cache.stats()
    }

    pub fn layout_cache_stats(&self) -> CacheStats {
        self.layout_cache.stats()
    }

    pub fn composer(&self) -> &SlideComposer {
        &self.composer
    }

    /// Run the whole pipeline. Failures come back as `Err`; stage errors in
    /// analyze/layout/style are replaced with safe defaults instead.
    pub fn generate(&mut self, request: GenerateRequest) -> Result<GenerationOutput> {
        let token = request.cancel.clone().unwrap_or_default();
        if token.is_cancelled() {
            info!("Generation cancelled before start");
            self.phase = Phase::Idle;
            return Err(DeckError::Cancelled {
                phase: Phase::Analyzing.to_string(),
            });
        }

        let result = self.run(&request.raw_markdown, &token);
        match &result {
            Ok(output) => info!(
                "Generated {} slides in {:.2} ms",
                output.slides.len(),
                output.metrics.total_ms
            ),
            Err(e) => {
                self.phase = Phase::Error;
                warn!("Generation failed: {}", e);
            }
        }
        result
    }

    fn run(&mut self, raw: &str, token: &CancellationToken) -> Result<GenerationOutput> {
        let started = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let key = content_hash(raw);
        let mut steps = Vec::with_capacity(4);
        let mut fallbacks = Vec::new();

        self.analysis_cache.purge_expired();
        self.layout_cache.purge_expired();

        let (meta, body) = parse_frontmatter(raw);
        let blocks = split_blocks(&body);
        debug!("Run {}: {} blocks, content hash {}", run_id, blocks.len(), key);

        // Analyze
        self.enter(Phase::Analyzing, token, "Analyzing content")?;
        let step = Instant::now();
        let (analysis, analysis_cached) = match self.analysis_cache.get(&key) {
            Some(cached) => {
                debug!("Analysis cache hit for {}", key);
                (cached, true)
            }
            None => match self.analyzer.analyze(&body) {
                Ok(analysis) => {
                    self.analysis_cache.insert(key.clone(), analysis.clone());
                    (analysis, false)
                }
                Err(e) => {
                    warn!("Analysis failed, using neutral analysis: {}", e);
                    fallbacks.push(format!("analysis: {}", e));
                    (ContentAnalysis::neutral(), false)
                }
            },
        };
        steps.push(StepTiming {
            step: Phase::Analyzing,
            duration_ms: millis(step.elapsed()),
        });

        // Layout
        self.enter(
            Phase::Layouting,
            token,
            &format!("Choosing layouts for {} blocks", blocks.len()),
        )?;
        let step = Instant::now();
        let (layout_decisions, layout_cached) = match self.layout_cache.get(&key) {
            Some(cached) => {
                debug!("Layout cache hit for {}", key);
                (cached, true)
            }
            None => {
                let mut failed = false;
                let mut decisions = Vec::with_capacity(blocks.len());
                for (index, block) in blocks.iter().enumerate() {
                    match self.layout.decide(block) {
                        Ok(decision) => decisions.push(decision),
                        Err(e) => {
                            warn!("Layout failed for block {}, using default: {}", index + 1, e);
                            fallbacks.push(format!("layout[{}]: {}", index, e));
                            failed = true;
                            decisions.push(LayoutDecision::fallback());
                        }
                    }
                }
                let decisions = self.layout.optimize_flow(decisions);
                if !failed {
                    self.layout_cache.insert(key.clone(), decisions.clone());
                }
                (decisions, false)
            }
        };
        steps.push(StepTiming {
            step: Phase::Layouting,
            duration_ms: millis(step.elapsed()),
        });

        // Style
        self.enter(Phase::Styling, token, "Selecting theme")?;
        let step = Instant::now();
        let context = StyleContext::from(&analysis);
        let theme = match self.style.decide(&context) {
            Ok(theme) => ensure_accessible_theme(theme),
            Err(e) => {
                warn!("Theme selection failed, using neutral theme: {}", e);
                fallbacks.push(format!("style: {}", e));
                neutral_theme()
            }
        };
        steps.push(StepTiming {
            step: Phase::Styling,
            duration_ms: millis(step.elapsed()),
        });

        // Compose
        self.enter(
            Phase::Composing,
            token,
            &format!("Composing {} slides with theme '{}'", blocks.len(), theme.name),
        )?;
        let step = Instant::now();
        let slides = self
            .composer
            .compose_slides(&blocks, &layout_decisions, &theme)?;
        steps.push(StepTiming {
            step: Phase::Composing,
            duration_ms: millis(step.elapsed()),
        });

        self.phase = Phase::Done;
        self.report(Phase::Done, &format!("Generated {} slides", slides.len()));

        Ok(GenerationOutput {
            meta,
            analysis,
            layout_decisions,
            theme,
            slides,
            metrics: Metrics {
                run_id,
                started_at,
                steps,
                total_ms: millis(started.elapsed()),
                analysis_cached,
                layout_cached,
                fallbacks,
            },
        })
    }

    /// Check cancellation at a phase boundary, then enter the phase
    fn enter(&mut self, phase: Phase, token: &CancellationToken, message: &str) -> Result<()> {
        if token.is_cancelled() {
            info!("Generation cancelled before {}", phase);
            return Err(DeckError::Cancelled {
                phase: phase.to_string(),
            });
        }
        info!("Phase {}: {}", phase, message);
        self.phase = phase;
        self.report(phase, message);
        Ok(())
    }

    fn report(&self, phase: Phase, message: &str) {
        if let Some(callback) = &self.progress {
            callback(&Progress {
                phase,
                percent: phase.percent(),
                message: message.to_string(),
            });
        }
    }
}
