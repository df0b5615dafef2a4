//! Builder-pattern printer for parse errors.

use std::fmt::Write;
use std::ops::Range;

use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};

use crate::engine::ParseError;

/// Renders a [`ParseError`] against the input it came from.
///
/// Errors that point into the input (syntax errors, left recursion) are shown
/// as an annotated snippet. Everything else, or any error when no source was
/// given, renders as its one-line message.
pub struct ErrorPrinter<'e, 's> {
    error: &'e ParseError,
    source: Option<&'s str>,
    path: Option<&'s str>,
    colored: bool,
}

impl<'e, 's> ErrorPrinter<'e, 's> {
    pub fn new(error: &'e ParseError) -> Self {
        Self {
            error,
            source: None,
            path: None,
            colored: false,
        }
    }

    pub fn source(mut self, source: &'s str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn path(mut self, path: &'s str) -> Self {
        self.path = Some(path);
        self
    }

    pub fn colored(mut self, value: bool) -> Self {
        self.colored = value;
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.format(&mut out);
        out
    }

    pub fn format(&self, w: &mut impl Write) -> std::fmt::Result {
        let (Some(source), Some((offset, label))) = (self.source, self.location()) else {
            return write!(w, "{}", self.error);
        };

        let renderer = if self.colored {
            Renderer::styled()
        } else {
            Renderer::plain()
        };

        let mut snippet = Snippet::source(source)
            .line_start(1)
            .annotation(AnnotationKind::Primary.span(widen(source, offset)).label(&label));
        if let Some(p) = self.path {
            snippet = snippet.path(p);
        }

        let title = self.error.to_string();
        let report: Vec<Group> = vec![Level::ERROR.primary_title(&title).element(snippet)];
        write!(w, "{}", renderer.render(&report))
    }

    fn location(&self) -> Option<(usize, String)> {
        match self.error {
            ParseError::Syntax(err) => Some((err.position.offset, err.message())),
            ParseError::LeftRecursionDetected { rule, position } => {
                Some((position.offset, format!("`{rule}` called again here")))
            }
            ParseError::Grammar(_) | ParseError::Aborted(_) | ParseError::Span(_) => None,
        }
    }
}

/// Empty ranges cover the next character, if there is one.
fn widen(source: &str, offset: usize) -> Range<usize> {
    let next = source
        .get(offset..)
        .and_then(|rest| rest.chars().next())
        .map_or(0, char::len_utf8);
    offset..offset + next
}

impl ParseError {
    pub fn printer(&self) -> ErrorPrinter<'_, '_> {
        ErrorPrinter::new(self)
    }
}
