//! # arm-coder
//!
//! A bidirectional compiler between human-readable arm programs and the
//! timestamped instruction sequences stored in puzzle solutions.
//!
//! Text is parsed line by line into [`Command`]s, then resolved against a
//! simulated [`ArmState`] into an ordered list of [`Step`]s; relative motions
//! (`goto`, `reset`) are planned into primitive actions, macros are expanded
//! in place, and `signal`/`wait` align cycle indices across parts compiled
//! concurrently in one [`ExportSession`]. [`decompile`] goes the other way,
//! expanding stored `reset` and `repeat` instructions back into plain lines.

pub mod arm;
pub mod command;
pub mod compiler;
pub mod decompiler;
pub mod error;
pub mod export;
pub mod planner;
pub mod solution;

pub use arm::*;
pub use command::*;
pub use compiler::*;
pub use decompiler::*;
pub use error::*;
pub use export::*;
pub use planner::*;
pub use solution::*;
