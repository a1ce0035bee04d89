//! Export sessions: compiling every part of a solution at once.
//!
//! An [`ExportSession`] owns the macro and signal tables for one export.
//! Each part is compiled on its own thread so that a `wait` in one program
//! can observe a `signal` raised while another program is still compiling.

use crate::compiler::{ArmCompiler, CoderConfig, MacroTable, SignalTable};
use crate::command::{Command, parse_program};
use crate::error::{CompileError, Invalidity, MacroError, ParseError};
use crate::solution::Part;
use std::thread;
use tracing::{info, info_span, warn};

/// A part that could not be compiled during an export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartFailure {
    /// Program key of the part (`arm<number>`).
    pub part: String,
    pub issues: Vec<Invalidity>,
}

/// Outcome of an export whose programs all parsed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Program keys of the parts whose steps were replaced.
    pub compiled: Vec<String>,
    /// Parts left untouched because their program could not be resolved.
    pub failures: Vec<PartFailure>,
}

impl ExportReport {
    /// Whether every part compiled.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Tables and settings scoped to a single export.
#[derive(Debug, Default)]
pub struct ExportSession {
    config: CoderConfig,
    macros: MacroTable,
    signals: SignalTable,
}

impl ExportSession {
    /// A session with empty tables.
    pub fn new(config: CoderConfig) -> Self {
        Self {
            config,
            macros: MacroTable::new(),
            signals: SignalTable::new(),
        }
    }

    pub fn config(&self) -> &CoderConfig {
        &self.config
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn signals(&self) -> &SignalTable {
        &self.signals
    }

    /// Forgets every macro and recorded signal.
    pub fn clear_tables(&mut self) {
        self.macros.clear();
        self.signals.clear();
    }

    /// Defines a macro. Later definitions of the same name win.
    pub fn add_macro(&mut self, name: &str, body: &str) -> Result<(), MacroError> {
        self.macros.define(name, body)
    }

    /// Loads macros in order, stopping at the first bad name or body.
    pub fn load_macros<'a>(
        &mut self,
        macros: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), MacroError> {
        for (name, body) in macros {
            self.add_macro(name, body)?;
        }
        Ok(())
    }

    /// A compiler borrowing this session's settings and tables.
    pub fn compiler(&self) -> ArmCompiler<'_> {
        ArmCompiler::new(&self.config, &self.macros, &self.signals)
    }

    /// Compiles a single program into `part`, sharing this session's tables.
    pub fn compile(&self, part: &mut Part, text: &str) -> Result<(), CompileError> {
        self.compiler().compile(part, text)
    }

    /// Compiles every `(part, program)` pair concurrently.
    ///
    /// All programs are parsed before anything runs; a parse error aborts the
    /// export with no part modified. The signal table is cleared first. A
    /// part whose program cannot be resolved keeps its previous steps and is
    /// listed in the report, while the others are still compiled.
    pub fn export<'p>(
        &self,
        programs: impl IntoIterator<Item = (&'p mut Part, &'p str)>,
    ) -> Result<ExportReport, ParseError> {
        let jobs = programs
            .into_iter()
            .map(|(part, text)| Ok((part, parse_program(text)?)))
            .collect::<Result<Vec<(&mut Part, Vec<Command>)>, ParseError>>()?;

        self.signals.clear();
        let compiler = self.compiler();
        info!(parts = jobs.len(), macros = self.macros.len(), "exporting");

        let outcomes = thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .iter()
                .map(|(part, commands)| {
                    let key = part.program_key();
                    let initial = part.initial_state();
                    let track_loop_length = part.track_loop_length;
                    scope.spawn(move || {
                        let _span = info_span!("compile", part = %key).entered();
                        compiler.resolve(commands, initial, track_loop_length)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect::<Vec<_>>()
        });

        let mut report = ExportReport::default();
        for ((part, _), outcome) in jobs.into_iter().zip(outcomes) {
            let key = part.program_key();
            match outcome {
                Ok(cursor) => {
                    part.steps = cursor.steps;
                    report.compiled.push(key);
                }
                Err(issues) => {
                    warn!(part = %key, problems = issues.len(), "part left uncompiled");
                    report.failures.push(PartFailure { part: key, issues });
                }
            }
        }
        Ok(report)
    }
}
