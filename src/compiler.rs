//! Compiler that resolves parsed program lines into a timed [`Step`] list.
//!
//! The entry point is [`ArmCompiler`]. It borrows the tables shared by every
//! part of one export, a [`MacroTable`] and a [`SignalTable`], and folds a
//! part's [`Command`]s over a [`Cursor`] holding the current cycle index, the
//! simulated [`ArmState`] and the steps emitted so far.

use crate::arm::{Action, ArmState, Step};
use crate::command::{Command, GotoTarget, macro_key, parse_program};
use crate::error::{CompileError, Invalidity, MacroError, ParseError};
use crate::planner::plan_transition;
use crate::solution::Part;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for program compilation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoderConfig {
    /// Total time a `wait` may block for its signal before the part is
    /// marked invalid. Default: 5000 ms.
    pub wait_timeout_ms: u64,
    /// Maximum nesting of macro expansions. Default: 64.
    pub max_macro_depth: usize,
}

impl Default for CoderConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 5000,
            max_macro_depth: 64,
        }
    }
}

impl CoderConfig {
    /// [`CoderConfig::wait_timeout_ms`] as a [`Duration`].
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

/// Named macro bodies, parsed once when defined.
///
/// Names are case-insensitive and trimmed; redefining a name replaces the
/// previous body.
#[derive(Clone, Debug, Default)]
pub struct MacroTable {
    bodies: HashMap<String, Vec<Command>>,
}

impl MacroTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `body` and stores it under `name`.
    ///
    /// Names that no program line could refer to are rejected, as is a body
    /// that does not parse.
    pub fn define(&mut self, name: &str, body: &str) -> Result<(), MacroError> {
        let key = macro_key(name).ok_or_else(|| MacroError::InvalidName(name.to_owned()))?;
        let commands = parse_program(body).map_err(|err| ParseError {
            origin: Some(key.clone()),
            ..err
        })?;
        if self.bodies.insert(key.clone(), commands).is_some() {
            debug!(name = %key, "macro redefined");
        }
        Ok(())
    }

    /// Body of the macro stored under the normalized `name`.
    pub fn get(&self, name: &str) -> Option<&[Command]> {
        self.bodies.get(name).map(Vec::as_slice)
    }

    /// Number of defined macros.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether no macro is defined.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Forgets every macro.
    pub fn clear(&mut self) {
        self.bodies.clear();
    }
}

/// Cycle indices recorded by `signal` lines, shared between concurrently
/// compiling parts.
///
/// The first index recorded for a name wins. Every write wakes all waiters.
#[derive(Debug, Default)]
pub struct SignalTable {
    recorded: Mutex<HashMap<String, i32>>,
    posted: Condvar,
}

impl SignalTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i32>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `name` at `index` and wakes every waiting part.
    pub fn signal(&self, name: &str, index: i32) {
        {
            let mut recorded = self.lock();
            if let Some(&first) = recorded.get(name) {
                warn!(signal = name, first, ignored = index, "signal raised twice");
                return;
            }
            recorded.insert(name.to_owned(), index);
        }
        debug!(signal = name, index, "signal recorded");
        self.posted.notify_all();
    }

    /// Blocks until `name` has been signalled or `timeout` has elapsed in total.
    pub fn wait(&self, name: &str, timeout: Duration) -> Option<i32> {
        let (recorded, _) = self
            .posted
            .wait_timeout_while(self.lock(), timeout, |recorded| {
                !recorded.contains_key(name)
            })
            .unwrap_or_else(PoisonError::into_inner);
        recorded.get(name).copied()
    }

    /// Index recorded for `name`, without blocking.
    pub fn get(&self, name: &str) -> Option<i32> {
        self.lock().get(name).copied()
    }

    /// Forgets every recorded signal.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// The state threaded from one command to the next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
    /// Cycle at which the next instruction fires.
    pub index: i32,
    pub state: ArmState,
    pub steps: Vec<Step>,
}

impl Cursor {
    /// A cursor at cycle 0 in `state` with no steps.
    pub fn start(state: ArmState) -> Self {
        Self {
            index: 0,
            state,
            steps: Vec::new(),
        }
    }

    fn push(&mut self, action: Action) {
        self.steps.push(action.at(self.index));
        self.state = self.state.apply(action);
        self.index += 1;
    }

    fn travel(self, target: ArmState, track_loop_length: i32) -> Self {
        let Cursor {
            index,
            state,
            mut steps,
        } = self;
        let index = plan_transition(index, state, target, track_loop_length, |i, action| {
            steps.push(action.at(i));
            i + 1
        });
        Cursor {
            index,
            state: target,
            steps,
        }
    }
}

/// Resolves programs against one export's shared tables.
#[derive(Clone, Copy, Debug)]
pub struct ArmCompiler<'a> {
    config: &'a CoderConfig,
    macros: &'a MacroTable,
    signals: &'a SignalTable,
}

impl<'a> ArmCompiler<'a> {
    /// Creates a compiler over borrowed settings and tables.
    pub fn new(config: &'a CoderConfig, macros: &'a MacroTable, signals: &'a SignalTable) -> Self {
        Self {
            config,
            macros,
            signals,
        }
    }

    /// Parses and compiles `text` for `part`, replacing its steps.
    ///
    /// On any failure `part.steps` is left as it was.
    pub fn compile(&self, part: &mut Part, text: &str) -> Result<(), CompileError> {
        let commands = parse_program(text)?;
        let cursor = self
            .resolve(&commands, part.initial_state(), part.track_loop_length)
            .map_err(CompileError::Invalid)?;
        debug!(part = %part.program_key(), steps = cursor.steps.len(), "program compiled");
        part.steps = cursor.steps;
        Ok(())
    }

    /// Resolves already parsed `commands`, starting at cycle 0 in `initial`.
    ///
    /// Resolution always runs to the end so that every `signal` is still
    /// raised for other parts; the collected problems are returned if any.
    pub fn resolve(
        &self,
        commands: &[Command],
        initial: ArmState,
        track_loop_length: i32,
    ) -> Result<Cursor, Vec<Invalidity>> {
        let mut resolution = Resolution {
            compiler: *self,
            initial,
            track_loop_length,
            expanding: Vec::new(),
            issues: Vec::new(),
        };
        let cursor = resolution.block(commands, Cursor::start(initial));
        if resolution.issues.is_empty() {
            Ok(cursor)
        } else {
            Err(resolution.issues)
        }
    }
}

struct Resolution<'a> {
    compiler: ArmCompiler<'a>,
    initial: ArmState,
    track_loop_length: i32,
    /// Macros currently being expanded, outermost first.
    expanding: Vec<String>,
    issues: Vec<Invalidity>,
}

impl Resolution<'_> {
    /// Resolves a line list. `repeat` replays the lines since the previous
    /// marker of this list; right after another marker it replays the same
    /// block again.
    fn block(&mut self, commands: &[Command], mut cursor: Cursor) -> Cursor {
        let mut block_start = 0;
        let mut last_block = 0..0;
        for (i, command) in commands.iter().enumerate() {
            cursor = match command {
                Command::Repeat => {
                    if block_start < i {
                        last_block = block_start..i;
                    }
                    block_start = i + 1;
                    self.block(&commands[last_block.clone()], cursor)
                }
                _ => self.command(command, cursor),
            };
        }
        cursor
    }

    fn command(&mut self, command: &Command, mut cursor: Cursor) -> Cursor {
        match command {
            Command::Blank => cursor.index += 1,
            Command::Act(action) => cursor.push(*action),
            Command::Noop => cursor.push(Action::Noop),
            Command::Goto(target) => {
                let target = goto_target(target, cursor.state);
                return cursor.travel(target, self.track_loop_length);
            }
            Command::Reset => {
                if cursor.state.grabbed {
                    cursor.push(Action::Drop);
                }
                return cursor.travel(self.initial, self.track_loop_length);
            }
            Command::Signal(name) => self.compiler.signals.signal(name, cursor.index),
            Command::Wait(name) => {
                let timeout = self.compiler.config.wait_timeout();
                match self.compiler.signals.wait(name, timeout) {
                    Some(at) => cursor.index = cursor.index.max(at),
                    None => {
                        warn!(signal = %name, ?timeout, "wait timed out");
                        self.issues.push(Invalidity::WaitTimedOut {
                            signal: name.clone(),
                            waited: timeout,
                        });
                    }
                }
            }
            Command::Macro(name) => return self.expand(name, cursor),
            // Only reachable outside `block`, which handles markers itself.
            Command::Repeat => {}
        }
        cursor
    }

    fn expand(&mut self, name: &str, cursor: Cursor) -> Cursor {
        let limit = self.compiler.config.max_macro_depth;
        let macros = self.compiler.macros;
        let issue = if self.expanding.iter().any(|open| open == name) {
            Invalidity::RecursiveMacro(name.to_owned())
        } else if self.expanding.len() >= limit {
            Invalidity::MacroTooDeep {
                name: name.to_owned(),
                limit,
            }
        } else if let Some(body) = macros.get(name) {
            self.expanding.push(name.to_owned());
            let cursor = self.block(body, cursor);
            self.expanding.pop();
            return cursor;
        } else {
            Invalidity::UnknownMacro(name.to_owned())
        };
        self.issues.push(issue);
        cursor
    }
}

fn goto_target(target: &GotoTarget, current: ArmState) -> ArmState {
    ArmState {
        rotation: target.rotation,
        track_position: target.track_position.unwrap_or(current.track_position),
        length: target.length.unwrap_or(current.length),
        grabbed: current.grabbed,
    }
}
