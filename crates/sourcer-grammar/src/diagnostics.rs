//! Non-fatal findings about a grammar, produced by `GrammarBuilder::build`.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    /// A repetition whose body can succeed without consuming input.
    NullableRepetition,
    /// Rules that can re-enter themselves before consuming input.
    LeftRecursion,
    /// A choice alternative shadowed by an earlier one that cannot fail.
    UnreachableAlternative,
}

impl DiagnosticKind {
    pub fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    pub fn fallback_message(&self) -> &'static str {
        match self {
            Self::NullableRepetition => "repeated expression can match empty input",
            Self::LeftRecursion => "left recursion",
            Self::UnreachableAlternative => "alternative can never be tried",
        }
    }

    /// Template with a `{}` placeholder for caller-provided detail.
    pub fn custom_message(&self) -> &'static str {
        match self {
            Self::NullableRepetition => "repeated expression `{}` can match empty input",
            Self::LeftRecursion => "left recursion: {}",
            Self::UnreachableAlternative => "alternative `{}` can never be tried",
        }
    }

    pub fn default_hint(&self) -> Option<&'static str> {
        match self {
            Self::NullableRepetition => Some("the parse fails if an iteration consumes nothing"),
            Self::LeftRecursion => Some("a rule must consume input before re-entering itself"),
            Self::UnreachableAlternative => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Rule the finding is attached to.
    pub rule: Arc<str>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, rule: Arc<str>, detail: Option<&str>) -> Self {
        let message = match detail {
            Some(detail) => kind.custom_message().replace("{}", detail),
            None => kind.fallback_message().to_owned(),
        };
        Self {
            kind,
            severity: kind.default_severity(),
            rule,
            message,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in `{}`: {}", self.severity, self.rule, self.message)?;
        if let Some(hint) = self.kind.default_hint() {
            write!(f, " ({hint})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn report(&mut self, kind: DiagnosticKind, rule: &Arc<str>, detail: Option<&str>) {
        self.0.push(Diagnostic::new(kind, rule.clone(), detail));
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.is_error())
    }

    pub fn warning_count(&self) -> usize {
        self.0.iter().filter(|d| d.is_warning()).count()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(move |d| d.kind == kind)
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
