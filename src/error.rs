//! Failure types for compiling programs and reading solution files.

use std::time::Duration;

/// A program line that matches no form of the language.
///
/// Fatal to whatever was being parsed: a part's program or a macro body.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot parse '{line}' (line {line_number}{})", origin_suffix(.origin))]
pub struct ParseError {
    /// The offending line, verbatim.
    pub line: String,
    /// 1-based position of the line in its text.
    pub line_number: usize,
    /// Macro whose body contained the line, if any.
    pub origin: Option<String>,
}

fn origin_suffix(origin: &Option<String>) -> String {
    origin
        .as_ref()
        .map(|name| format!(" of macro '{name}'"))
        .unwrap_or_default()
}

/// Why a macro could not be defined.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MacroError {
    /// No program line would refer to a macro of this name: it is empty,
    /// contains characters outside `[a-z0-9_-]` and spaces, or reads as an
    /// instruction.
    #[error("'{0}' cannot be used as a macro name")]
    InvalidName(String),

    #[error(transparent)]
    Body(#[from] ParseError),
}

/// A command that parsed fine but could not be resolved.
///
/// These mark the part being compiled invalid without stopping the rest of
/// an export.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Invalidity {
    #[error("unknown macro '{0}'")]
    UnknownMacro(String),

    #[error("macro '{0}' expands into itself")]
    RecursiveMacro(String),

    #[error("macro '{name}' nested deeper than {limit} levels")]
    MacroTooDeep { name: String, limit: usize },

    #[error("wait {signal} without signal after {waited:?}")]
    WaitTimedOut { signal: String, waited: Duration },
}

/// Why a single program failed to compile.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// The text is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The text refers to something that could not be resolved.
    #[error("program is invalid: {}", join_issues(.0))]
    Invalid(Vec<Invalidity>),
}

fn join_issues(issues: &[Invalidity]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Malformed or unreadable solution data.
#[derive(Debug, thiserror::Error)]
pub enum SolutionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected format tag {found} (expected {expected})")]
    FormatTag { expected: i32, found: i32 },

    #[error("unexpected {what} marker {found} (expected {expected})")]
    Sentinel {
        what: &'static str,
        expected: i32,
        found: i32,
    },

    #[error("unknown action code {0:#04x} in part '{1}'")]
    UnknownAction(u8, String),

    #[error("negative {0} count {1}")]
    NegativeCount(&'static str, i32),

    #[error("{0} entries do not fit the format")]
    Oversized(usize),

    #[error("string is not valid UTF-8")]
    InvalidString(#[from] std::string::FromUtf8Error),

    #[error("string length prefix is malformed")]
    StringLength,
}
