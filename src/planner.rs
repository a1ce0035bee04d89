//! Go-to planning: the primitive actions that carry an arm between two states.
//!
//! Each axis is planned on its own and the three runs are concatenated in a
//! fixed order: rotation, then track, then length. Rotation and track take the
//! shorter way around their loop; a half-turn rotation goes counterclockwise.

use crate::arm::{Action, ArmState, ROTATIONS};

/// Folds every action needed to move from `from` to `to` through `sink`.
///
/// `sink` receives the running accumulator and the next action and returns
/// the new accumulator, so the same plan can be written into a step list
/// (advancing a cycle index) or into program text. The grab state is not
/// planned.
pub fn plan_transition<T>(
    init: T,
    from: ArmState,
    to: ArmState,
    track_loop_length: i32,
    mut sink: impl FnMut(T, Action) -> T,
) -> T {
    let mut acc = init;

    let full_turn = i64::from(ROTATIONS);
    let turn = (i64::from(to.rotation) - i64::from(from.rotation)).rem_euclid(full_turn);
    let (count, action) = if turn <= full_turn / 2 {
        (turn, Action::RotateCounterclockwise)
    } else {
        (full_turn - turn, Action::RotateClockwise)
    };
    for _ in 0..count {
        acc = sink(acc, action);
    }

    let loop_len = i64::from(track_loop_length.max(1));
    let travel =
        (i64::from(to.track_position) - i64::from(from.track_position)).rem_euclid(loop_len);
    let (count, action) = if travel <= loop_len / 2 {
        (travel, Action::Forward)
    } else {
        (loop_len - travel, Action::Back)
    };
    for _ in 0..count {
        acc = sink(acc, action);
    }

    let reach = i64::from(to.length) - i64::from(from.length);
    let action = if reach > 0 {
        Action::Extend
    } else {
        Action::Retract
    };
    for _ in 0..reach.unsigned_abs() {
        acc = sink(acc, action);
    }

    acc
}

/// Collects the plan from `from` to `to` into a list of actions.
pub fn transition(from: ArmState, to: ArmState, track_loop_length: i32) -> Vec<Action> {
    plan_transition(Vec::new(), from, to, track_loop_length, |mut plan, action| {
        plan.push(action);
        plan
    })
}
