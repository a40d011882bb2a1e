use deckforge::orchestrator::content_hash;
use deckforge::{
    AnalysisStage, CancellationToken, Config, ContentAnalysis, DeckError, GenerateRequest,
    LayoutDecision, LayoutKind, LayoutStage, Orchestrator, Phase, Progress, StyleContext,
    StyleStage, Template, TemplateSet, ThemeDecision,
};
use std::cell::RefCell;
use std::rc::Rc;

const DECK: &str = "% Platform Update\n% Ada\n% 2024-05-01\n\n\
# Platform Update\nWhere we are\n\n\
- Latency down 40%\n- Deployments automated\n- Fewer incidents\n\n\
> Ship small, ship often\n-- The team\n\n\
The API server architecture now runs in the cloud.";

struct FailingAnalyzer;

impl AnalysisStage for FailingAnalyzer {
    fn analyze(&self, _text: &str) -> deckforge::Result<ContentAnalysis> {
        Err(DeckError::AnalysisError("model unavailable".to_string()))
    }
}

struct FailingLayout;

impl LayoutStage for FailingLayout {
    fn decide(&self, _text: &str) -> deckforge::Result<LayoutDecision> {
        Err(DeckError::LayoutError("no rules loaded".to_string()))
    }
}

struct FailingStyle;

impl StyleStage for FailingStyle {
    fn decide(&self, _context: &StyleContext) -> deckforge::Result<ThemeDecision> {
        Err(DeckError::StyleError("palette service down".to_string()))
    }
}

fn recorder() -> (Rc<RefCell<Vec<Progress>>>, impl Fn(&Progress) + 'static) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    (events, move |progress: &Progress| {
        sink.borrow_mut().push(progress.clone())
    })
}

fn orchestrator() -> Orchestrator {
    Orchestrator::new(&Config::default()).expect("default pipeline should build")
}

#[test]
fn test_generate_full_deck() {
    let output = orchestrator()
        .generate(GenerateRequest::new(DECK))
        .unwrap();

    assert_eq!(output.meta.title, "Platform Update");
    assert_eq!(output.meta.author.as_deref(), Some("Ada"));
    assert_eq!(output.slides.len(), 4);
    assert_eq!(output.layout_decisions.len(), 4);

    let layouts: Vec<LayoutKind> = output.slides.iter().map(|s| s.layout).collect();
    assert_eq!(
        layouts,
        vec![
            LayoutKind::Title,
            LayoutKind::List,
            LayoutKind::Quote,
            LayoutKind::Default
        ]
    );
    assert_eq!(output.theme.name, "Technical Dark");
    assert!(output.metrics.fallbacks.is_empty());

    let markdown = output.to_markdown();
    assert_eq!(markdown.matches("\n---\n").count(), 3);
    assert!(markdown.contains("# Platform Update"));
}

#[test]
fn test_progress_is_monotonic_and_ends_at_done() {
    let (events, callback) = recorder();
    let mut pipeline = orchestrator().with_progress(callback);

    pipeline.generate(GenerateRequest::new(DECK)).unwrap();

    let events = events.borrow();
    let percents: Vec<u8> = events.iter().map(|p| p.percent).collect();
    let phases: Vec<Phase> = events.iter().map(|p| p.phase).collect();
    assert_eq!(percents, vec![5, 30, 55, 80, 100]);
    assert_eq!(
        phases,
        vec![
            Phase::Analyzing,
            Phase::Layouting,
            Phase::Styling,
            Phase::Composing,
            Phase::Done
        ]
    );
    assert_eq!(pipeline.phase(), Phase::Done);
}

#[test]
fn test_metrics_record_each_step() {
    let output = orchestrator()
        .generate(GenerateRequest::new(DECK))
        .unwrap();
    let metrics = &output.metrics;

    let steps: Vec<Phase> = metrics.steps.iter().map(|s| s.step).collect();
    assert_eq!(
        steps,
        vec![
            Phase::Analyzing,
            Phase::Layouting,
            Phase::Styling,
            Phase::Composing
        ]
    );
    assert!(metrics.step(Phase::Composing).is_some());
    assert!(metrics.step(Phase::Done).is_none());
    assert!(metrics.total_ms >= 0.0);
}

#[test]
fn test_cancelled_before_start() {
    let (events, callback) = recorder();
    let mut pipeline = orchestrator().with_progress(callback);
    let token = CancellationToken::new();
    token.cancel();

    let err = pipeline
        .generate(GenerateRequest::new(DECK).with_cancellation(token))
        .unwrap_err();

    assert!(err.is_cancellation());
    assert!(events.borrow().is_empty());
    assert_eq!(pipeline.phase(), Phase::Idle);
}

#[test]
fn test_cancelled_before_start_after_a_completed_run() {
    let mut pipeline = orchestrator();
    pipeline.generate(GenerateRequest::new(DECK)).unwrap();
    assert_eq!(pipeline.phase(), Phase::Done);

    let token = CancellationToken::new();
    token.cancel();
    let err = pipeline
        .generate(GenerateRequest::new(DECK).with_cancellation(token))
        .unwrap_err();

    assert!(err.is_cancellation());
    assert_eq!(pipeline.phase(), Phase::Idle);
}

#[test]
fn test_cancelled_between_phases() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let mut pipeline = orchestrator().with_progress(move |progress: &Progress| {
        sink.borrow_mut().push(progress.phase);
        if progress.phase == Phase::Layouting {
            trigger.cancel();
        }
    });

    let err = pipeline
        .generate(GenerateRequest::new(DECK).with_cancellation(token))
        .unwrap_err();

    match err {
        DeckError::Cancelled { phase } => assert_eq!(phase, "styling"),
        other => panic!("expected cancellation, got {:?}", other),
    }
    assert_eq!(*events.borrow(), vec![Phase::Analyzing, Phase::Layouting]);
    assert_eq!(pipeline.phase(), Phase::Error);
}

#[test]
fn test_repeat_input_hits_caches() {
    let mut pipeline = orchestrator();

    let first = pipeline.generate(GenerateRequest::new(DECK)).unwrap();
    let second = pipeline.generate(GenerateRequest::new(DECK)).unwrap();

    assert!(!first.metrics.analysis_cached);
    assert!(!first.metrics.layout_cached);
    assert!(second.metrics.analysis_cached);
    assert!(second.metrics.layout_cached);
    assert_ne!(first.metrics.run_id, second.metrics.run_id);
    assert_eq!(first.slides, second.slides);
    assert_eq!(pipeline.analysis_cache_stats().hits, 1);
    assert_eq!(pipeline.layout_cache_stats().hits, 1);
    assert!(pipeline.composer().engine().cache_stats().hits > 0);
}

#[test]
fn test_content_hash_is_stable() {
    assert_eq!(content_hash("deck"), content_hash("deck"));
    assert_ne!(content_hash("deck"), content_hash("deck "));
    assert_eq!(content_hash("").len(), 64);
}

#[test]
fn test_failing_analyzer_falls_back_to_neutral() {
    let mut pipeline = orchestrator().with_analyzer(FailingAnalyzer);

    let output = pipeline.generate(GenerateRequest::new(DECK)).unwrap();

    assert_eq!(output.analysis, ContentAnalysis::neutral());
    assert_eq!(output.theme.name, "Neutral Light");
    assert_eq!(output.metrics.fallbacks.len(), 1);
    assert!(output.metrics.fallbacks[0].starts_with("analysis"));

    // Fallback results are not cached
    let again = pipeline.generate(GenerateRequest::new(DECK)).unwrap();
    assert!(!again.metrics.analysis_cached);
}

#[test]
fn test_failing_layout_uses_default_layout() {
    let mut pipeline = orchestrator().with_layout(FailingLayout);

    let output = pipeline.generate(GenerateRequest::new(DECK)).unwrap();

    assert!(output
        .layout_decisions
        .iter()
        .all(|d| *d == LayoutDecision::fallback()));
    assert!(output.slides.iter().all(|s| s.layout == LayoutKind::Default));
    assert_eq!(output.metrics.fallbacks.len(), 4);

    let again = pipeline.generate(GenerateRequest::new(DECK)).unwrap();
    assert!(!again.metrics.layout_cached);
}

#[test]
fn test_failing_style_uses_neutral_theme() {
    let mut pipeline = orchestrator().with_style(FailingStyle);

    let output = pipeline.generate(GenerateRequest::new(DECK)).unwrap();

    assert_eq!(output.theme.name, "Neutral Light");
    assert_eq!(
        output.metrics.fallbacks,
        vec!["style: Theme selection failed: palette service down"]
    );
}

#[test]
fn test_compose_failure_is_fatal() {
    let templates =
        TemplateSet::new().with(Template::new("slide:content", "1.0.0", "default", "{{body}}"));
    let mut pipeline = Orchestrator::with_templates(&Config::default(), templates).unwrap();

    let err = pipeline
        .generate(GenerateRequest::new("# Needs a title template"))
        .unwrap_err();

    assert!(matches!(err, DeckError::ComposeError { .. }));
    assert_eq!(pipeline.phase(), Phase::Error);
}

#[test]
fn test_invalid_template_set_is_rejected_at_construction() {
    let templates = TemplateSet::builtin()
        .with(Template::new("slide:title", "1.0.0", "title", "x").extending("slide:missing"));

    let err = Orchestrator::with_templates(&Config::default(), templates)
        .err()
        .expect("construction should fail");
    assert!(err.is_validation());
}

#[test]
fn test_empty_input_produces_empty_deck() {
    let output = orchestrator()
        .generate(GenerateRequest::new("  \n\n "))
        .unwrap();

    assert!(output.slides.is_empty());
    assert_eq!(output.analysis, ContentAnalysis::neutral());
    assert_eq!(output.to_markdown(), "\n");
}
