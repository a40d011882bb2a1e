// ABOUTME: Heuristic content analysis for the deckforge pipeline
// ABOUTME: Classifies raw text by audience, domain, purpose, tone, formality and complexity

use crate::errors::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

macro_rules! label_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

label_enum!(Audience {
    General => "general",
    Students => "students",
    Executives => "executives",
    Developers => "developers",
    Researchers => "researchers",
});

label_enum!(Domain {
    General => "general",
    Business => "business",
    Technical => "technical",
    Academic => "academic",
    Health => "health",
    Creative => "creative",
});

label_enum!(Purpose {
    Inform => "inform",
    Persuade => "persuade",
    Educate => "educate",
    Report => "report",
    Inspire => "inspire",
});

label_enum!(Complexity {
    Beginner => "beginner",
    Intermediate => "intermediate",
    Advanced => "advanced",
});

label_enum!(Tone {
    Neutral => "neutral",
    Business => "business",
    Technical => "technical",
    Academic => "academic",
    Casual => "casual",
    Inspirational => "inspirational",
});

impl Complexity {
    fn slide_factor(&self) -> f64 {
        match self {
            Complexity::Beginner => 1.0,
            Complexity::Intermediate => 1.1,
            Complexity::Advanced => 1.3,
        }
    }
}

/// A frequent content word and how often it occurs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTopic {
    pub term: String,
    pub count: usize,
}

/// Structured classification of one input text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub audience: Audience,
    pub domain: Domain,
    pub purpose: Purpose,
    pub complexity: Complexity,
    pub tone: Tone,
    pub formality_score: u8,
    pub suggested_slide_count: u32,
    pub key_topics: Vec<KeyTopic>,
    pub word_count: usize,
}

impl ContentAnalysis {
    /// The neutral record used for empty input and as the pipeline fallback
    pub fn neutral() -> Self {
        Self {
            audience: Audience::General,
            domain: Domain::General,
            purpose: Purpose::Inform,
            complexity: Complexity::Beginner,
            tone: Tone::Neutral,
            formality_score: BASE_FORMALITY as u8,
            suggested_slide_count: MIN_SLIDES,
            key_topics: Vec::new(),
            word_count: 0,
        }
    }
}

/// Configuration for content analysis
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub key_topic_count: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { key_topic_count: 6 }
    }
}

const BASE_FORMALITY: i32 = 5;
const MIN_SLIDES: u32 = 3;
const MAX_SLIDES: u32 = 40;
const WORDS_PER_SLIDE: f64 = 120.0;

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("built-in analyzer pattern must compile")
}

static AUDIENCE_RULES: Lazy<Vec<(Audience, Regex)>> = Lazy::new(|| {
    vec![
        (
            Audience::Students,
            pattern(r"\b(students?|exams?|homework|classroom|lessons?|teachers?|course ?work|syllabus)\b"),
        ),
        (
            Audience::Executives,
            pattern(r"\b(executives?|board|ceo|cfo|cto|stakeholders?|investors?|shareholders?|leadership)\b"),
        ),
        (
            Audience::Developers,
            pattern(r"\b(developers?|engineers?|programmers?|devops|api|sdk|codebase|pull requests?)\b"),
        ),
        (
            Audience::Researchers,
            pattern(r"\b(researchers?|scientists?|peer[- ]review(ed)?|journal|hypothes[ie]s|methodology)\b"),
        ),
    ]
});

static DOMAIN_RULES: Lazy<Vec<(Domain, Regex)>> = Lazy::new(|| {
    vec![
        (
            Domain::Technical,
            pattern(r"\b(software|api|algorithms?|database|cloud|architecture|kubernetes|server|deploy(ment)?|latency|microservices?|code)\b"),
        ),
        (
            Domain::Business,
            pattern(r"\b(revenue|market(ing)?|sales|profit|strategy|customers?|roi|quarter(ly)?|budget|growth|kpis?)\b"),
        ),
        (
            Domain::Academic,
            pattern(r"\b(research|theory|hypothes[ie]s|university|thesis|dissertation|literature|empirical|curriculum)\b"),
        ),
        (
            Domain::Health,
            pattern(r"\b(patients?|clinical|health(care)?|medical|diagnosis|treatment|hospital)\b"),
        ),
        (
            Domain::Creative,
            pattern(r"\b(design|art(ist)?|story(telling)?|creative|brand(ing)?|illustration|music|film)\b"),
        ),
    ]
});

static PURPOSE_RULES: Lazy<Vec<(Purpose, Regex)>> = Lazy::new(|| {
    vec![
        (
            Purpose::Persuade,
            pattern(r"\b(should|must|recommend(ation)?|propose|proposal|invest|convince|why we)\b"),
        ),
        (
            Purpose::Educate,
            pattern(r"\b(how to|learn(ing)?|tutorial|guide|steps?|lesson|understand)\b"),
        ),
        (
            Purpose::Report,
            pattern(r"\b(results|report(ing)?|quarterly|summary|update|metrics|findings|status)\b"),
        ),
        (
            Purpose::Inspire,
            pattern(r"\b(vision|dream|imagine|inspire|inspiring|mission|future)\b"),
        ),
    ]
});

static TONE_RULES: Lazy<Vec<(Tone, Regex)>> = Lazy::new(|| {
    vec![
        (
            Tone::Business,
            pattern(r"\b(revenue|roi|stakeholders?|strategy|quarter(ly)?|kpis?|profit|market share)\b"),
        ),
        (
            Tone::Technical,
            pattern(r"\b(implementation|api|system|performance|latency|throughput|architecture|algorithm)\b"),
        ),
        (
            Tone::Academic,
            pattern(r"\b(hypothes[ie]s|methodology|furthermore|literature|empirical|et al)\b"),
        ),
        (
            Tone::Casual,
            pattern(r"\b(hey|awesome|cool|fun|gonna|wanna|folks|guys|lol)\b"),
        ),
        (
            Tone::Inspirational,
            pattern(r"\b(inspire|dream|believe|imagine|together we|passion|vision)\b"),
        ),
    ]
});

static FORMAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    pattern(r"\b(furthermore|moreover|therefore|consequently|hence|thus|nevertheless|accordingly|in addition|whereas|notwithstanding)\b")
});

static CASUAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    pattern(r"(\b[a-z]+(n't|'re|'ll|'ve|'m|'d)\b)|\b(gonna|wanna|kinda|yeah|hey|cool|awesome|lol|stuff)\b")
});

static SIMPLE_CUE: Lazy<Regex> =
    Lazy::new(|| pattern(r"\b(simple|intro|introduction|overview|basics?|beginners?)\b"));

static JARGON_SUFFIX: Lazy<Regex> =
    Lazy::new(|| pattern(r"(tion|sion|ity|ism|ology|ization|ical|metric|graphy|esis|ware)s?$"));

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are",
        "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
        "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
        "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him",
        "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more",
        "most", "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other",
        "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such", "than",
        "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this",
        "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were",
        "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
        "you", "your", "yours", "http", "https", "www", "com",
    ]
    .into_iter()
    .collect()
});

/// Lower-case and split on anything that is not alphanumeric
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_match<T: Copy>(rules: &[(T, Regex)], text: &str, fallback: T) -> T {
    rules
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(label, _)| *label)
        .unwrap_or(fallback)
}

/// Lexical content analyzer. Total: every input produces an analysis.
#[derive(Debug, Clone, Default)]
pub struct ContentAnalyzer {
    config: AnalyzerConfig,
}

impl ContentAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, text: &str) -> ContentAnalysis {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return ContentAnalysis::neutral();
        }

        let lowered = text.to_lowercase();
        let complexity = classify_complexity(&lowered, &tokens);

        ContentAnalysis {
            audience: first_match(&AUDIENCE_RULES, &lowered, Audience::General),
            domain: first_match(&DOMAIN_RULES, &lowered, Domain::General),
            purpose: first_match(&PURPOSE_RULES, &lowered, Purpose::Inform),
            tone: first_match(&TONE_RULES, &lowered, Tone::Neutral),
            formality_score: formality_score(&lowered),
            suggested_slide_count: suggested_slide_count(tokens.len(), complexity),
            key_topics: key_topics(&tokens, self.config.key_topic_count),
            word_count: tokens.len(),
            complexity,
        }
    }
}

/// Starts at 5, +1 per formal connective, -1 per casual marker, clamped to [1, 10]
pub fn formality_score(lowered: &str) -> u8 {
    let formal = FORMAL_PATTERN.find_iter(lowered).count() as i32;
    let casual = CASUAL_PATTERN.find_iter(lowered).count() as i32;
    (BASE_FORMALITY + formal - casual).clamp(1, 10) as u8
}

fn classify_complexity(lowered: &str, tokens: &[String]) -> Complexity {
    if SIMPLE_CUE.is_match(lowered) {
        return Complexity::Beginner;
    }

    let total_chars: usize = tokens.iter().map(|t| t.chars().count()).sum();
    let avg_len = total_chars as f64 / tokens.len() as f64;
    let jargon = tokens
        .iter()
        .filter(|t| t.chars().count() >= 7 && JARGON_SUFFIX.is_match(t))
        .count();
    let density = jargon as f64 / tokens.len() as f64;

    if avg_len >= 6.5 || density >= 0.15 {
        Complexity::Advanced
    } else if avg_len >= 5.0 || density >= 0.07 {
        Complexity::Intermediate
    } else {
        Complexity::Beginner
    }
}

pub fn suggested_slide_count(word_count: usize, complexity: Complexity) -> u32 {
    let raw = (word_count as f64 / WORDS_PER_SLIDE * complexity.slide_factor()).round();
    (raw as u32).clamp(MIN_SLIDES, MAX_SLIDES)
}

/// Stop-word filtered term frequency, highest count first; ties keep
/// first-occurrence order so results are deterministic
fn key_topics(tokens: &[String], limit: usize) -> Vec<KeyTopic> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, token) in tokens.iter().enumerate() {
        if token.chars().count() < 3
            || STOP_WORDS.contains(token.as_str())
            || token.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        counts.entry(token.as_str()).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first))| (term, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(term, count, _)| KeyTopic {
            term: term.to_string(),
            count,
        })
        .collect()
}

/// Pipeline seam for the analysis stage
pub trait AnalysisStage {
    fn analyze(&self, text: &str) -> Result<ContentAnalysis>;
}

impl AnalysisStage for ContentAnalyzer {
    fn analyze(&self, text: &str) -> Result<ContentAnalysis> {
        Ok(ContentAnalyzer::analyze(self, text))
    }
}
