//! Decompiler that renders a part's step list back into program text.
//!
//! The arm state is re-derived step by step so that `reset` steps can be
//! expanded into the moves that bring the arm home. Cycles without a step
//! become blank lines, and every rendered line ends in
//! [`LINE_SEPARATOR`](crate::command::LINE_SEPARATOR).

use crate::arm::{Action, ArmState, Step};
use crate::command::LINE_SEPARATOR;
use crate::planner::plan_transition;
use crate::solution::Part;

/// Renders `part.steps` as program text.
///
/// # Meta-actions
///
/// A `reset` step becomes a `drop` line if the arm is holding something,
/// followed by the moves back to the initial state. A `repeat` step becomes
/// the lines of the block since the previous `repeat` step (or the start),
/// re-rendered with the current state. In both cases the meta step's own
/// cycle follows its expansion as a blank line, so the number of lines always
/// equals the running cycle index.
pub fn decompile(part: &Part) -> String {
    let initial = part.initial_state();
    let mut emitter = Emitter {
        initial,
        track_loop_length: part.track_loop_length,
        text: String::new(),
    };
    let mut index = 0;
    let mut state = initial;
    emitter.steps(&part.steps, &mut index, &mut state);
    emitter.text
}

struct Emitter {
    initial: ArmState,
    track_loop_length: i32,
    text: String,
}

impl Emitter {
    fn line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push_str(LINE_SEPARATOR);
    }

    fn steps(&mut self, steps: &[Step], index: &mut i32, state: &mut ArmState) {
        for (pos, step) in steps.iter().enumerate() {
            while *index < step.index {
                self.line("");
                *index += 1;
            }

            match step.action {
                Action::Reset => {
                    if state.grabbed {
                        self.line(Action::Drop.mnemonic());
                        *state = state.apply(Action::Drop);
                        *index += 1;
                    }
                    let (home, loop_len) = (self.initial, self.track_loop_length);
                    *index = plan_transition(*index, *state, home, loop_len, |i, action| {
                        self.line(action.mnemonic());
                        i + 1
                    });
                    *state = home;
                    self.line("");
                }
                Action::Repeat => {
                    let block = repeat_block(steps, pos);
                    if let Some(first) = block.first() {
                        let start = first.index;
                        let mut end = start;
                        self.steps(block, &mut end, state);
                        *index += end - start;
                    }
                    self.line("");
                }
                action => {
                    self.line(action.mnemonic());
                    *state = state.apply(action);
                }
            }
            *index += 1;
        }
    }
}

/// Steps replayed by the `repeat` at `pos`: those after the previous run of
/// `repeat` markers, skipping markers directly before `pos`.
fn repeat_block(steps: &[Step], pos: usize) -> &[Step] {
    let before = &steps[..pos];
    let end = before
        .iter()
        .rposition(|s| s.action != Action::Repeat)
        .map_or(0, |i| i + 1);
    let start = before[..end]
        .iter()
        .rposition(|s| s.action == Action::Repeat)
        .map_or(0, |i| i + 1);
    &before[start..end]
}
