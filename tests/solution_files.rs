// tests/solution_files.rs
use arm_coder::{
    Action, CodedSolution, CoderConfig, ExportSession, Part, Solution, SolutionError, decompile,
};
use glam::IVec2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

fn setup() -> Solution {
    let mut first = Part::arm(0, 0, 1);
    first.steps = vec![
        Action::Grab.at(0),
        Action::RotateCounterclockwise.at(1),
        Action::Drop.at(2),
        Action::Reset.at(3),
    ];

    let mut second = Part::arm(1, 3, 2);
    second.name = "piston".to_owned();
    second.position = IVec2::new(2, -1);
    second.steps = vec![Action::Extend.at(4), Action::Retract.at(5)];

    Solution {
        puzzle_name: "P011".to_owned(),
        name: "NEW SOLUTION 1".to_owned(),
        metrics: None,
        parts: vec![
            Part {
                name: "bonder".to_owned(),
                ..Part::arm(0, 0, 1)
            },
            second,
            first,
        ],
    }
}

#[test]
fn test_edit_cycle_through_files() {
    let dir = tempfile::tempdir().unwrap();

    // 1. The game saves a solution.
    let solution_path = dir.path().join("P011.solution");
    let mut writer = BufWriter::new(File::create(&solution_path).unwrap());
    setup().write(&mut writer).unwrap();
    writer.flush().unwrap();
    drop(writer);

    // 2. Its arms are decompiled into an editable .solutionx.
    let solution = Solution::read(BufReader::new(File::open(&solution_path).unwrap())).unwrap();
    let code: Vec<(String, String)> = solution
        .programmable_parts()
        .into_iter()
        .map(|part| (part.program_key(), decompile(part)))
        .collect();
    assert_eq!(code[0], ("arm0".to_owned(), "g\r\nrcc\r\nd\r\nrc\r\n\r\n".to_owned()));
    assert_eq!(code[1], ("arm1".to_owned(), "\r\n\r\n\r\n\r\ne\r\nr\r\n".to_owned()));

    let coded_path = dir.path().join("P011.solutionx");
    let mut coded = CodedSolution { code, solution };
    coded.code.push(("wave".to_owned(), "e\r\nr".to_owned()));
    coded.code[1].1 = "signal ready\r\nwave\r\nwave".to_owned();
    coded.code[0].1 = "g\r\nwait ready\r\nrcc\r\nreset".to_owned();
    let mut writer = BufWriter::new(File::create(&coded_path).unwrap());
    coded.write(&mut writer).unwrap();
    writer.flush().unwrap();
    drop(writer);

    // 3. The edited programs are exported back.
    let mut coded = CodedSolution::read(BufReader::new(File::open(&coded_path).unwrap())).unwrap();
    let mut session = ExportSession::new(CoderConfig::default());
    let macros: Vec<(String, String)> = coded
        .macros()
        .map(|(name, body)| (name.to_owned(), body.to_owned()))
        .collect();
    assert_eq!(macros, vec![("wave".to_owned(), "e\r\nr".to_owned())]);
    session
        .load_macros(macros.iter().map(|(n, b)| (n.as_str(), b.as_str())))
        .unwrap();

    let texts: Vec<String> = coded
        .solution
        .programmable_parts()
        .into_iter()
        .map(|part| coded.program(part).unwrap().to_owned())
        .collect();
    let parts = coded.solution.programmable_parts_mut();
    let report = session
        .export(parts.into_iter().zip(texts.iter().map(String::as_str)))
        .unwrap();
    assert!(report.is_complete());

    let out_path = dir.path().join("P011-generated.solution");
    let mut writer = BufWriter::new(File::create(&out_path).unwrap());
    coded.solution.write(&mut writer).unwrap();
    writer.flush().unwrap();
    drop(writer);

    let exported = Solution::read(BufReader::new(File::open(&out_path).unwrap())).unwrap();
    let arms = exported.programmable_parts();
    assert_eq!(
        arms[0].steps,
        vec![
            Action::Grab.at(0),
            Action::RotateCounterclockwise.at(1),
            Action::Drop.at(2),
            Action::RotateClockwise.at(3),
        ]
    );
    assert_eq!(
        arms[1].steps,
        vec![
            Action::Extend.at(0),
            Action::Retract.at(1),
            Action::Extend.at(2),
            Action::Retract.at(3),
        ]
    );
    assert_eq!(arms[1].position, IVec2::new(2, -1));
    assert_eq!(exported.parts[0].name, "bonder");
}

#[test]
fn test_wrong_container_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.solution");
    let mut writer = BufWriter::new(File::create(&path).unwrap());
    setup().write(&mut writer).unwrap();
    writer.flush().unwrap();
    drop(writer);

    let err = CodedSolution::read(BufReader::new(File::open(&path).unwrap())).unwrap_err();
    assert!(matches!(
        err,
        SolutionError::FormatTag {
            expected: 19,
            found: 7
        }
    ));
}
