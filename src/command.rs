//! Line lexer for the arm program language.
//!
//! Every line of a program is parsed exactly once into a [`Command`]; the
//! compiler then resolves commands against the threaded arm state, which lets
//! macro bodies and repeat blocks be replayed without re-reading text.
//!
//! | Line | Command |
//! |------|---------|
//! | *(empty)* | [`Command::Blank`] |
//! | `rc` / `rotate_clockwise`, `e` / `extend`, ... | [`Command::Act`] |
//! | `goto R [T [L]]` | [`Command::Goto`] |
//! | `signal NAME` / `wait NAME` | [`Command::Signal`] / [`Command::Wait`] |
//! | `rep` / `repeat`, `res` / `reset`, `noop` | [`Command::Repeat`], [`Command::Reset`], [`Command::Noop`] |
//! | any other name | [`Command::Macro`] |
//!
//! Keywords are case-insensitive and surrounding whitespace is ignored.

use crate::arm::Action;
use crate::error::ParseError;
use serde::{Deserialize, Serialize};

/// Separator between program lines, on both the read and the write path.
pub const LINE_SEPARATOR: &str = "\r\n";

/// Largest magnitude accepted for a `goto` coordinate. Every unit of distance
/// becomes one planned instruction.
pub const MAX_GOTO_COORDINATE: i32 = 10_000;

/// A go-to target. Omitted axes keep the value the arm has when the line runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GotoTarget {
    pub rotation: i32,
    pub track_position: Option<i32>,
    pub length: Option<i32>,
}

/// The meaning of one program line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Idle cycle without an instruction.
    Blank,
    /// A primitive action; never a meta-action.
    Act(Action),
    /// Explicit no-op instruction.
    Noop,
    Goto(GotoTarget),
    Signal(String),
    Wait(String),
    /// Reference to a macro by normalized name.
    Macro(String),
    Repeat,
    Reset,
}

impl Command {
    /// Parses a single line. `line_number` is only used for error reporting.
    pub fn parse(line: &str, line_number: usize) -> Result<Command, ParseError> {
        let fail = || ParseError {
            line: line.to_owned(),
            line_number,
            origin: None,
        };

        let text = line.trim().to_lowercase();
        if text.is_empty() {
            return Ok(Command::Blank);
        }

        match Action::from_keyword(&text) {
            Some(Action::Repeat) => return Ok(Command::Repeat),
            Some(Action::Reset) => return Ok(Command::Reset),
            Some(Action::Noop) => return Ok(Command::Noop),
            Some(action) => return Ok(Command::Act(action)),
            None => {}
        }

        let (keyword, rest) = match text.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (text.as_str(), ""),
        };
        match keyword {
            "goto" => parse_goto(rest).ok_or_else(fail),
            "signal" if !rest.is_empty() => Ok(Command::Signal(rest.to_owned())),
            "wait" if !rest.is_empty() => Ok(Command::Wait(rest.to_owned())),
            "signal" | "wait" => Err(fail()),
            _ if is_macro_name(&text) => Ok(Command::Macro(normalize_name(&text))),
            _ => Err(fail()),
        }
    }
}

fn parse_goto(args: &str) -> Option<Command> {
    let values = args
        .split_whitespace()
        .map(|value| {
            value
                .parse::<i32>()
                .ok()
                .filter(|v| v.unsigned_abs() <= MAX_GOTO_COORDINATE.unsigned_abs())
        })
        .collect::<Option<Vec<_>>>()?;
    match values.as_slice() {
        [rotation] => Some(Command::Goto(GotoTarget {
            rotation: *rotation,
            track_position: None,
            length: None,
        })),
        [rotation, track] => Some(Command::Goto(GotoTarget {
            rotation: *rotation,
            track_position: Some(*track),
            length: None,
        })),
        [rotation, track, length] => Some(Command::Goto(GotoTarget {
            rotation: *rotation,
            track_position: Some(*track),
            length: Some(*length),
        })),
        _ => None,
    }
}

/// Names are words of `[a-z0-9_-]`, not starting with a digit or `-`,
/// separated by single or repeated spaces.
fn is_macro_name(text: &str) -> bool {
    if text.chars().any(|c| c.is_whitespace() && c != ' ') {
        return false;
    }
    text.split(' ').filter(|word| !word.is_empty()).all(|word| {
        let mut chars = word.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
            && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    })
}

/// The table key a program line consisting of `name` refers to, or `None`
/// when such a line would not parse as a macro reference.
pub fn macro_key(name: &str) -> Option<String> {
    match Command::parse(name, 0) {
        Ok(Command::Macro(key)) => Some(key),
        _ => None,
    }
}

/// Canonical form of a macro name: trimmed, lowercase, single-spaced.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits program text into lines on [`LINE_SEPARATOR`].
///
/// A trailing separator yields a trailing empty line, which compiles to one
/// idle cycle.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(LINE_SEPARATOR)
}

/// Parses every line of `text`.
pub fn parse_program(text: &str) -> Result<Vec<Command>, ParseError> {
    split_lines(text)
        .enumerate()
        .map(|(i, line)| Command::parse(line, i + 1))
        .collect()
}

/// Converts `\n` line endings to [`LINE_SEPARATOR`], leaving existing
/// `\r\n` pairs alone.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace(LINE_SEPARATOR, "\n")
        .replace('\n', LINE_SEPARATOR)
}
