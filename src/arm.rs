//! Arm state and the primitive instructions that act on it.

use serde::{Deserialize, Serialize};

/// Number of hex-grid orientations an arm can face.
pub const ROTATIONS: i32 = 6;

/// The simulated state of an arm between two instructions.
///
/// `rotation` is only meaningful modulo [`ROTATIONS`] and `track_position`
/// only modulo the owning part's track loop length. Use
/// [`ArmState::equivalent`] to compare states with that in mind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArmState {
    /// Orientation, one step per 60 degrees. Counterclockwise is positive.
    pub rotation: i32,

    /// Position along the track the arm is mounted on.
    pub track_position: i32,

    /// Extension of the arm.
    pub length: i32,

    /// Whether the gripper currently holds something.
    pub grabbed: bool,
}

impl ArmState {
    /// The state an arm starts every program in: at its placed rotation and
    /// size, at the start of its track, holding nothing.
    pub fn initial(rotation: i32, size: i32) -> Self {
        Self {
            rotation,
            track_position: 0,
            length: size,
            grabbed: false,
        }
    }

    /// Returns the state after performing `action`.
    ///
    /// # Panics
    ///
    /// Panics if `action` is a meta-action ([`Action::Repeat`] or
    /// [`Action::Reset`]). Those have no direct effect on an arm and must be
    /// expanded by the caller.
    pub fn apply(mut self, action: Action) -> Self {
        match action {
            Action::RotateClockwise => self.rotation -= 1,
            Action::RotateCounterclockwise => self.rotation += 1,
            Action::Extend => self.length += 1,
            Action::Retract => self.length -= 1,
            Action::Grab => self.grabbed = true,
            Action::Drop => self.grabbed = false,
            Action::PivotClockwise | Action::PivotCounterclockwise | Action::Noop => {}
            Action::Forward => self.track_position += 1,
            Action::Back => self.track_position -= 1,
            Action::Repeat | Action::Reset => {
                panic!("meta-action {action:?} cannot be applied to an arm state")
            }
        }
        self
    }

    /// Compares two states the way the arm sees them: rotation modulo
    /// [`ROTATIONS`] and track position modulo `track_loop_length`.
    pub fn equivalent(&self, other: &Self, track_loop_length: i32) -> bool {
        let loop_len = track_loop_length.max(1);
        (self.rotation - other.rotation).rem_euclid(ROTATIONS) == 0
            && (self.track_position - other.track_position).rem_euclid(loop_len) == 0
            && self.length == other.length
            && self.grabbed == other.grabbed
    }
}

/// Every instruction an arm can be given.
///
/// [`Action::Repeat`] and [`Action::Reset`] only appear in stored instruction
/// sequences; they are never produced by the planner or by compiling a
/// primitive line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    RotateClockwise,
    RotateCounterclockwise,
    Extend,
    Retract,
    Grab,
    Drop,
    /// Turns the gripper head only.
    PivotClockwise,
    /// Turns the gripper head only.
    PivotCounterclockwise,
    /// Moves one cell forward along the track.
    Forward,
    /// Moves one cell back along the track.
    Back,
    /// Replays the block since the previous repeat marker.
    Repeat,
    /// Returns the arm to its initial state.
    Reset,
    Noop,
}

impl Action {
    /// Every action, meta-actions included.
    pub const ALL: [Action; 13] = [
        Action::RotateClockwise,
        Action::RotateCounterclockwise,
        Action::Extend,
        Action::Retract,
        Action::Grab,
        Action::Drop,
        Action::PivotClockwise,
        Action::PivotCounterclockwise,
        Action::Forward,
        Action::Back,
        Action::Repeat,
        Action::Reset,
        Action::Noop,
    ];

    /// Whether this is a meta-action that cannot be applied to an [`ArmState`].
    pub fn is_meta(self) -> bool {
        matches!(self, Action::Repeat | Action::Reset)
    }

    /// Short lowercase form used when rendering programs (`rc`, `f`, ...).
    pub fn mnemonic(self) -> &'static str {
        self.spellings().0
    }

    /// The abbreviated and the full spelling accepted by the lexer.
    pub fn spellings(self) -> (&'static str, &'static str) {
        match self {
            Action::RotateClockwise => ("rc", "rotate_clockwise"),
            Action::RotateCounterclockwise => ("rcc", "rotate_counterclockwise"),
            Action::Extend => ("e", "extend"),
            Action::Retract => ("r", "retract"),
            Action::Grab => ("g", "grab"),
            Action::Drop => ("d", "drop"),
            Action::PivotClockwise => ("pc", "pivot_clockwise"),
            Action::PivotCounterclockwise => ("pcc", "pivot_counterclockwise"),
            Action::Forward => ("f", "forward"),
            Action::Back => ("b", "back"),
            Action::Repeat => ("rep", "repeat"),
            Action::Reset => ("res", "reset"),
            Action::Noop => ("noop", "noop"),
        }
    }

    /// Looks up an already lowercased, trimmed keyword.
    pub fn from_keyword(word: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|action| {
            let (short, long) = action.spellings();
            word == short || word == long
        })
    }

    /// Byte used for this action in the solution file format.
    pub fn code(self) -> u8 {
        match self {
            Action::RotateClockwise => b'R',
            Action::RotateCounterclockwise => b'r',
            Action::Extend => b'E',
            Action::Retract => b'e',
            Action::Grab => b'G',
            Action::Drop => b'g',
            Action::PivotClockwise => b'P',
            Action::PivotCounterclockwise => b'p',
            Action::Forward => b'A',
            Action::Back => b'a',
            Action::Repeat => b'C',
            Action::Reset => b'X',
            Action::Noop => b'O',
        }
    }

    /// Inverse of [`Action::code`].
    pub fn from_code(code: u8) -> Option<Action> {
        Action::ALL.into_iter().find(|action| action.code() == code)
    }

    /// Schedules this action at cycle `index`.
    pub fn at(self, index: i32) -> Step {
        Step::new(index, self)
    }
}

/// An action scheduled at an absolute cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    pub index: i32,
    pub action: Action,
}

impl Step {
    /// Creates a step firing `action` at cycle `index`.
    pub fn new(index: i32, action: Action) -> Self {
        Self { index, action }
    }
}
