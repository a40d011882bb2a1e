// ABOUTME: Priority-ordered first-match rule lists
// ABOUTME: Shared dispatch structure for the layout engine and the theme selector

type Predicate<I> = Box<dyn Fn(&I) -> bool + Send + Sync>;
type Builder<I, O> = Box<dyn Fn(&I) -> O + Send + Sync>;

/// One `(predicate, builder, priority)` entry
pub struct Rule<I: ?Sized, O> {
    pub id: String,
    pub priority: i32,
    matches: Predicate<I>,
    build: Builder<I, O>,
}

impl<I: ?Sized, O> Rule<I, O> {
    pub fn new(
        id: impl Into<String>,
        priority: i32,
        matches: impl Fn(&I) -> bool + Send + Sync + 'static,
        build: impl Fn(&I) -> O + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            matches: Box::new(matches),
            build: Box::new(build),
        }
    }

    pub fn matches(&self, input: &I) -> bool {
        (self.matches)(input)
    }

    pub fn build(&self, input: &I) -> O {
        (self.build)(input)
    }
}

/// Rules kept sorted by descending priority. Equal priorities keep their
/// insertion order because the sort is stable.
pub struct RuleSet<I: ?Sized, O> {
    rules: Vec<Rule<I, O>>,
}

impl<I: ?Sized, O> Default for RuleSet<I, O> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<I: ?Sized, O> RuleSet<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rule: Rule<I, O>) {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Linear scan; the first matching rule builds the result
    pub fn first_match(&self, input: &I) -> Option<(&Rule<I, O>, O)> {
        self.rules
            .iter()
            .find(|rule| rule.matches(input))
            .map(|rule| (rule, rule.build(input)))
    }

    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
