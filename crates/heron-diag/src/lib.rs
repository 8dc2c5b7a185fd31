//! Positioned diagnostics for heron.
//!
//! Translator functions never abort on the first problem: they append
//! diagnostics to a [`DiagSink`] and keep walking, so a failing run reports
//! everything at once. Diagnostics are created by `heron-translate` and
//! rendered here for display.

use std::fmt;

// ---------------------------------------------------------------------------
// Diagnostic kinds
// ---------------------------------------------------------------------------

/// What went wrong, from the translator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// The construct is outside the translatable subset.
    Unsupported,
    /// A subset constraint was violated (e.g. a non-`uint64` map key).
    Expected,
    /// Translatable in principle, not implemented yet.
    Todo,
    /// The input tree is internally inconsistent.
    Invalid,
}

impl Kind {
    pub const ALL: [Kind; 4] = [Kind::Unsupported, Kind::Expected, Kind::Todo, Kind::Invalid];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Unsupported => "unsupported",
            Kind::Expected => "expected",
            Kind::Todo => "todo",
            Kind::Invalid => "invalid",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Kind::Unsupported => "The construct is outside the translatable subset.",
            Kind::Expected => "A subset constraint was violated.",
            Kind::Todo => "The construct is translatable in principle but not implemented.",
            Kind::Invalid => "The input tree is internally inconsistent.",
        }
    }
}

// ---------------------------------------------------------------------------
// Source locations (independent of heron-ast's Pos)
// ---------------------------------------------------------------------------

/// A source location for diagnostics. Callers convert from `heron-ast`
/// positions to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    pub file_id: u32,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file_id: u32, line: u32, column: u32) -> Self {
        Self {
            file_id,
            line,
            column,
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: Kind,
    /// Primary message: what went wrong.
    pub message: String,
    /// Where it went wrong.
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(Kind::Unsupported, message)
    }

    pub fn expected(message: impl Into<String>) -> Self {
        Self::new(Kind::Expected, message)
    }

    pub fn todo(message: impl Into<String>) -> Self {
        Self::new(Kind::Todo, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(Kind::Invalid, message)
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Render with the file name resolved from the package's file table.
    pub fn display_with_files(&self, files: &[String]) -> String {
        match self.location {
            Some(loc) => {
                let file = files
                    .get(loc.file_id as usize)
                    .map(String::as_str)
                    .unwrap_or("<unknown>");
                format!(
                    "{file}:{}:{}: {}: {}",
                    loc.line,
                    loc.column,
                    self.kind.as_str(),
                    self.message
                )
            }
            None => format!("{}: {}", self.kind.as_str(), self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = self.location {
            write!(f, "{}:{}: ", loc.line, loc.column)?;
        }
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Append-only accumulator of diagnostics for one translation run.
#[derive(Debug, Default)]
pub struct DiagSink {
    diags: Vec<Diagnostic>,
}

impl DiagSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.diags.push(diag);
    }

    pub fn is_empty(&self) -> bool {
        self.diags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diags.iter()
    }

    /// Consume the sink, yielding diagnostics in source-position order.
    /// Diagnostics without a location sort first; ties keep insertion order.
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut diags = self.diags;
        diags.sort_by_key(|d| d.location);
        diags
    }
}

// ---------------------------------------------------------------------------
// Error type for a failed translation
// ---------------------------------------------------------------------------

/// Error wrapping the full diagnostic report of a failed translation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("translation failed with {} diagnostic(s)", .0.len())]
pub struct TranslationError(pub Vec<Diagnostic>);

impl TranslationError {
    pub fn from_sink(sink: DiagSink) -> Self {
        Self(sink.into_sorted())
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }
}
