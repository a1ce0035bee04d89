//! Parts, solutions, and the binary solution container they are stored in.
//!
//! The compiler only needs a [`Part`]'s geometry and step list; the rest of
//! this module reads and writes the `.solution` file that carries them, and
//! the `.solutionx` wrapper that additionally stores program text and macros.

use crate::arm::{Action, ArmState, Step};
use crate::error::SolutionError;
use glam::IVec2;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Format tag at the start of a `.solution` file.
pub const SOLUTION_TAG: i32 = 7;

/// Format tag at the start of a `.solutionx` file.
pub const CODED_SOLUTION_TAG: i32 = 19;

/// Part marker that precedes every part record.
const PART_MARKER: u8 = 1;

/// Name of the part whose record carries track cells.
pub const TRACK_PART: &str = "track";

/// Axial offsets of the six hex neighbours.
const HEX_NEIGHBOURS: [IVec2; 6] = [
    IVec2::new(1, 0),
    IVec2::new(-1, 0),
    IVec2::new(0, 1),
    IVec2::new(0, -1),
    IVec2::new(1, -1),
    IVec2::new(-1, 1),
];

fn default_track_loop_length() -> i32 {
    1
}

/// A placed component of a solution. Arms and pistons carry programs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Kind of part (`arm1`, `piston`, `track`, glyph names, ...).
    pub name: String,

    /// Hex cell the part is anchored on (axial coordinates).
    pub position: IVec2,

    /// Arm length the part starts with.
    pub size: i32,

    /// Orientation the part starts with.
    pub rotation: i32,

    /// Record index stored alongside the part.
    pub index: i32,

    /// Instructions, ordered by cycle.
    pub steps: Vec<Step>,

    /// Cells of a track part, in order. Empty for anything else.
    pub track_cells: Vec<IVec2>,

    /// Arm number shown to the player, starting at 0.
    pub number: i32,

    /// Length of the track loop the arm rides on; 1 means no track.
    /// Not stored in the file.
    #[serde(default = "default_track_loop_length")]
    pub track_loop_length: i32,
}

impl Part {
    /// A basic arm without track and without instructions.
    pub fn arm(number: i32, rotation: i32, size: i32) -> Self {
        Self {
            name: "arm1".to_owned(),
            position: IVec2::ZERO,
            size,
            rotation,
            index: 0,
            steps: Vec::new(),
            track_cells: Vec::new(),
            number,
            track_loop_length: 1,
        }
    }

    /// Mounts the part on a track loop of the given length.
    pub fn with_track_loop(mut self, track_loop_length: i32) -> Self {
        self.track_loop_length = track_loop_length;
        self
    }

    /// Whether the part is driven by a program.
    pub fn is_programmable(&self) -> bool {
        self.name.starts_with("arm") || self.name == "piston"
    }

    /// Key under which the part's program is stored in a `.solutionx` file.
    pub fn program_key(&self) -> String {
        format!("arm{}", self.number)
    }

    /// State the part's program starts from.
    pub fn initial_state(&self) -> ArmState {
        ArmState::initial(self.rotation, self.size)
    }
}

/// Metrics the game stores for a solved solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionMetrics {
    pub cycles: i32,
    pub cost: i32,
    pub area: i32,
    pub instructions: i32,
}

/// A puzzle solution: the placed parts and their instructions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub puzzle_name: String,
    pub name: String,
    /// `None` when the solution has not been solved.
    pub metrics: Option<SolutionMetrics>,
    pub parts: Vec<Part>,
}

impl Solution {
    pub fn read(reader: impl Read) -> Result<Self, SolutionError> {
        let mut input = Input(reader);
        input.expect_tag(SOLUTION_TAG)?;
        Self::read_body(&mut input)
    }

    fn read_body<R: Read>(input: &mut Input<R>) -> Result<Self, SolutionError> {
        let puzzle_name = input.string()?;
        let name = input.string()?;

        let metrics = match input.i32()? {
            0 => None,
            _ => {
                let mut values = [0; 4];
                for (id, value) in values.iter_mut().enumerate() {
                    input.expect_sentinel("metric id", id as i32)?;
                    *value = input.i32()?;
                }
                let [cycles, cost, area, instructions] = values;
                Some(SolutionMetrics {
                    cycles,
                    cost,
                    area,
                    instructions,
                })
            }
        };

        let part_count = input.count("part")?;
        let mut parts = Vec::with_capacity(part_count);
        for _ in 0..part_count {
            parts.push(input.part()?);
        }

        Ok(Self {
            puzzle_name,
            name,
            metrics,
            parts,
        })
    }

    /// Writes the solution as unsolved; the game recomputes metrics for
    /// edited programs.
    pub fn write(&self, writer: impl Write) -> Result<(), SolutionError> {
        let mut output = Output(writer);
        output.i32(SOLUTION_TAG)?;
        self.write_body(&mut output)
    }

    fn write_body<W: Write>(&self, output: &mut Output<W>) -> Result<(), SolutionError> {
        output.string(&self.puzzle_name)?;
        output.string(&self.name)?;
        output.i32(0)?;
        output.count(self.parts.len())?;
        for part in &self.parts {
            output.part(part)?;
        }
        Ok(())
    }

    /// Programmable parts ordered by arm number.
    pub fn programmable_parts(&self) -> Vec<&Part> {
        let mut parts: Vec<_> = self.parts.iter().filter(|p| p.is_programmable()).collect();
        parts.sort_by_key(|p| p.number);
        parts
    }

    /// Mutable access to the programmable parts, ordered by arm number.
    pub fn programmable_parts_mut(&mut self) -> Vec<&mut Part> {
        let mut parts: Vec<_> = self
            .parts
            .iter_mut()
            .filter(|p| p.is_programmable())
            .collect();
        parts.sort_by_key(|p| p.number);
        parts
    }

    /// Sets `track_loop_length` on every programmable part standing on a
    /// track cell.
    ///
    /// A closed track (first and last cells adjacent) loops over its cell
    /// count. An open track gets twice its cell count, which makes the
    /// shorter-way-around planning move linearly along it.
    pub fn attach_tracks(&mut self) {
        let tracks: Vec<Vec<IVec2>> = self
            .parts
            .iter()
            .filter(|p| p.name == TRACK_PART && !p.track_cells.is_empty())
            .map(|p| p.track_cells.iter().map(|cell| p.position + *cell).collect())
            .collect();

        for part in self.parts.iter_mut().filter(|p| p.is_programmable()) {
            let Some(cells) = tracks.iter().find(|cells| cells.contains(&part.position)) else {
                continue;
            };
            let len = cells.len() as i32;
            part.track_loop_length = match (cells.first(), cells.last()) {
                (Some(first), Some(last)) if len > 2 && HEX_NEIGHBOURS.contains(&(*last - *first)) => {
                    len
                }
                _ => len * 2,
            };
        }
    }
}

/// A solution together with the program text and macros it was built from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedSolution {
    /// `(key, text)` entries in file order: `arm<number>` keys are programs,
    /// any other key is a macro.
    pub code: Vec<(String, String)>,
    pub solution: Solution,
}

impl CodedSolution {
    pub fn read(reader: impl Read) -> Result<Self, SolutionError> {
        let mut input = Input(reader);
        input.expect_tag(CODED_SOLUTION_TAG)?;
        let entries = input.count("code entry")?;
        let mut code = Vec::with_capacity(entries);
        for _ in 0..entries {
            let key = input.string()?;
            let text = input.string()?;
            code.push((key, text));
        }
        input.expect_tag(SOLUTION_TAG)?;
        let solution = Solution::read_body(&mut input)?;
        Ok(Self { code, solution })
    }

    pub fn write(&self, writer: impl Write) -> Result<(), SolutionError> {
        let mut output = Output(writer);
        output.i32(CODED_SOLUTION_TAG)?;
        output.count(self.code.len())?;
        for (key, text) in &self.code {
            output.string(key)?;
            output.string(text)?;
        }
        output.i32(SOLUTION_TAG)?;
        self.solution.write_body(&mut output)
    }

    /// Program text stored for `part`, if any.
    pub fn program(&self, part: &Part) -> Option<&str> {
        let key = part.program_key();
        self.code
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, text)| text.as_str())
    }

    /// Entries that are not the program of a programmable part.
    pub fn macros(&self) -> impl Iterator<Item = (&str, &str)> {
        let program_keys: Vec<String> = self
            .solution
            .programmable_parts()
            .iter()
            .map(|p| p.program_key())
            .collect();
        self.code
            .iter()
            .filter(move |(key, _)| !program_keys.contains(key))
            .map(|(key, text)| (key.as_str(), text.as_str()))
    }
}

/// Little-endian reader for the .NET binary layout.
struct Input<R>(R);

impl<R: Read> Input<R> {
    fn bytes<const N: usize>(&mut self) -> Result<[u8; N], SolutionError> {
        let mut buf = [0; N];
        self.0.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8, SolutionError> {
        Ok(self.bytes::<1>()?[0])
    }

    fn i32(&mut self) -> Result<i32, SolutionError> {
        Ok(i32::from_le_bytes(self.bytes()?))
    }

    fn count(&mut self, what: &'static str) -> Result<usize, SolutionError> {
        let n = self.i32()?;
        usize::try_from(n).map_err(|_| SolutionError::NegativeCount(what, n))
    }

    fn cell(&mut self) -> Result<IVec2, SolutionError> {
        Ok(IVec2::new(self.i32()?, self.i32()?))
    }

    fn expect_tag(&mut self, expected: i32) -> Result<(), SolutionError> {
        match self.i32()? {
            found if found == expected => Ok(()),
            found => Err(SolutionError::FormatTag { expected, found }),
        }
    }

    fn expect_sentinel(&mut self, what: &'static str, expected: i32) -> Result<(), SolutionError> {
        match self.i32()? {
            found if found == expected => Ok(()),
            found => Err(SolutionError::Sentinel {
                what,
                expected,
                found,
            }),
        }
    }

    /// Length is a 7-bit variable-length integer, low groups first.
    fn string(&mut self) -> Result<String, SolutionError> {
        let mut len = 0usize;
        for shift in (0..35).step_by(7) {
            let byte = self.u8()?;
            len |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                let mut buf = vec![0; len];
                self.0.read_exact(&mut buf)?;
                return Ok(String::from_utf8(buf)?);
            }
        }
        Err(SolutionError::StringLength)
    }

    fn part(&mut self) -> Result<Part, SolutionError> {
        let name = self.string()?;
        let marker = self.u8()?;
        if marker != PART_MARKER {
            return Err(SolutionError::Sentinel {
                what: "part",
                expected: PART_MARKER.into(),
                found: marker.into(),
            });
        }
        let position = self.cell()?;
        let size = self.i32()?;
        let rotation = self.i32()?;
        let index = self.i32()?;

        let step_count = self.count("step")?;
        let mut steps = Vec::with_capacity(step_count);
        for _ in 0..step_count {
            let at = self.i32()?;
            let code = self.u8()?;
            let action =
                Action::from_code(code).ok_or_else(|| SolutionError::UnknownAction(code, name.clone()))?;
            steps.push(action.at(at));
        }

        let mut track_cells = Vec::new();
        if name == TRACK_PART {
            let cell_count = self.count("track cell")?;
            for _ in 0..cell_count {
                track_cells.push(self.cell()?);
            }
        }
        let number = self.i32()?;

        Ok(Part {
            name,
            position,
            size,
            rotation,
            index,
            steps,
            track_cells,
            number,
            track_loop_length: 1,
        })
    }
}

struct Output<W>(W);

impl<W: Write> Output<W> {
    fn i32(&mut self, value: i32) -> Result<(), SolutionError> {
        self.0.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn u8(&mut self, value: u8) -> Result<(), SolutionError> {
        self.0.write_all(&[value])?;
        Ok(())
    }

    fn count(&mut self, n: usize) -> Result<(), SolutionError> {
        let n = i32::try_from(n).map_err(|_| SolutionError::Oversized(n))?;
        self.i32(n)
    }

    fn cell(&mut self, cell: IVec2) -> Result<(), SolutionError> {
        self.i32(cell.x)?;
        self.i32(cell.y)
    }

    fn string(&mut self, value: &str) -> Result<(), SolutionError> {
        let mut len = value.len();
        while len >= 0x80 {
            self.u8((len as u8 & 0x7f) | 0x80)?;
            len >>= 7;
        }
        self.u8(len as u8)?;
        self.0.write_all(value.as_bytes())?;
        Ok(())
    }

    fn part(&mut self, part: &Part) -> Result<(), SolutionError> {
        self.string(&part.name)?;
        self.u8(PART_MARKER)?;
        self.cell(part.position)?;
        self.i32(part.size)?;
        self.i32(part.rotation)?;
        self.i32(part.index)?;
        self.count(part.steps.len())?;
        for step in &part.steps {
            self.i32(step.index)?;
            self.u8(step.action.code())?;
        }
        if part.name == TRACK_PART {
            self.count(part.track_cells.len())?;
            for cell in &part.track_cells {
                self.cell(*cell)?;
            }
        }
        self.i32(part.number)
    }
}
