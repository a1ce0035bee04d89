// tests/round_trip.rs
use arm_coder::{
    Action, ArmCompiler, ArmState, CoderConfig, CompileError, ExportSession, Invalidity,
    MacroError, MacroTable, Part, SignalTable, Step, decompile, parse_program, transition,
};

fn setup() -> ExportSession {
    ExportSession::new(CoderConfig {
        wait_timeout_ms: 2000,
        ..Default::default()
    })
}

fn compiled(session: &ExportSession, part: &Part, text: &str) -> Vec<Step> {
    let mut part = part.clone();
    session.compile(&mut part, text).unwrap();
    part.steps
}

#[test]
fn test_scenario_straight_line_program() {
    let session = setup();
    let part = Part::arm(0, 0, 1);

    let steps = compiled(&session, &part, "rc\r\nrc\r\ne\r\n");
    assert_eq!(
        steps,
        vec![
            Step::new(0, Action::RotateClockwise),
            Step::new(1, Action::RotateClockwise),
            Step::new(2, Action::Extend),
        ]
    );
}

#[test]
fn test_scenario_goto_turns_clockwise_past_half() {
    let session = setup();
    // delta = 4 > 3, so two clockwise turns: 0 -> -1 -> -2, which is 4 mod 6.
    let part = Part::arm(0, 0, 1).with_track_loop(5);
    let steps = compiled(&session, &part, "goto 4");
    assert_eq!(
        steps,
        vec![Action::RotateClockwise.at(0), Action::RotateClockwise.at(1)]
    );
}

#[test]
fn test_scenario_reset_at_home() {
    let part = Part {
        steps: vec![Action::Extend.at(0), Action::Retract.at(1), Action::Reset.at(2)],
        ..Part::arm(0, 0, 1)
    };
    assert_eq!(decompile(&part), "e\r\nr\r\n\r\n");
}

#[test]
fn test_round_trip_without_meta_actions() {
    let session = setup();
    let mut part = Part::arm(3, 2, 2).with_track_loop(4);
    part.steps = vec![
        Action::Grab.at(0),
        Action::RotateCounterclockwise.at(1),
        Action::Forward.at(4),
        Action::PivotClockwise.at(5),
        Action::PivotCounterclockwise.at(6),
        Action::Extend.at(7),
        Action::Noop.at(9),
        Action::Back.at(10),
        Action::Retract.at(11),
        Action::Drop.at(12),
        Action::RotateClockwise.at(20),
    ];

    let text = decompile(&part);
    assert_eq!(compiled(&session, &part, &text), part.steps);
}

#[test]
fn test_reset_returns_to_initial_state() {
    let initial = ArmState::initial(1, 2);
    let histories: [&[Action]; 3] = [
        &[Action::Grab, Action::RotateClockwise, Action::Extend, Action::Forward],
        &[Action::Retract, Action::Back, Action::Back, Action::Back],
        &[Action::RotateCounterclockwise; 4],
    ];

    for history in histories {
        let mut steps: Vec<Step> = history
            .iter()
            .enumerate()
            .map(|(i, action)| action.at(i as i32))
            .collect();
        steps.push(Action::Reset.at(history.len() as i32));
        let part = Part {
            steps,
            ..Part::arm(0, 1, 2).with_track_loop(5)
        };

        let text = decompile(&part);
        let config = CoderConfig::default();
        let macros = MacroTable::new();
        let signals = SignalTable::new();
        let cursor = ArmCompiler::new(&config, &macros, &signals)
            .resolve(&parse_program(&text).unwrap(), initial, 5)
            .unwrap();
        assert!(
            cursor.state.equivalent(&initial, 5),
            "{history:?} ended in {:?}",
            cursor.state
        );
    }
}

#[test]
fn test_macro_reference_matches_literal_body() {
    let mut session = setup();
    let body = "g\r\ngoto 3 1\r\n\r\nd\r\nreset";
    session.add_macro("Cycle", body).unwrap();
    let part = Part::arm(0, 0, 1).with_track_loop(3);

    let by_reference = compiled(&session, &part, "e\r\ncycle\r\nrc");
    let by_body = compiled(&session, &part, &format!("e\r\n{body}\r\nrc"));
    assert_eq!(by_reference, by_body);
}

#[test]
fn test_signal_is_observed_regardless_of_order() {
    for _ in 0..20 {
        let session = setup();
        let mut signaller = Part::arm(0, 0, 1);
        let mut waiter = Part::arm(1, 0, 1);
        let report = session
            .export([
                (&mut waiter, "e\r\nwait x\r\nr"),
                (&mut signaller, "\r\n\r\n\r\n\r\n\r\nsignal x"),
            ])
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(waiter.steps, vec![Action::Extend.at(0), Action::Retract.at(5)]);
    }
}

#[test]
fn test_unresolved_wait_fails_only_its_part() {
    let session = ExportSession::new(CoderConfig {
        wait_timeout_ms: 50,
        ..Default::default()
    });
    let mut lonely = Part::arm(0, 0, 1);
    let mut sibling = Part::arm(1, 0, 1);

    let report = session
        .export([
            (&mut lonely, "wait never"),
            (&mut sibling, "g\r\ngoto 2\r\nd"),
        ])
        .unwrap();

    assert_eq!(report.compiled, vec!["arm1".to_owned()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].part, "arm0");
    assert!(matches!(
        &report.failures[0].issues[..],
        [Invalidity::WaitTimedOut { signal, .. }] if signal == "never"
    ));
    assert!(lonely.steps.is_empty());
    assert_eq!(sibling.steps.len(), 4);
}

#[test]
fn test_planned_goto_matches_transition() {
    let session = setup();
    let part = Part::arm(0, 5, 3).with_track_loop(6);
    let steps = compiled(&session, &part, "goto 1 4 1");
    let expected = transition(
        part.initial_state(),
        ArmState {
            rotation: 1,
            track_position: 4,
            length: 1,
            grabbed: false,
        },
        6,
    );
    let actions: Vec<Action> = steps.iter().map(|s| s.action).collect();
    assert_eq!(actions, expected);
    assert!(steps.iter().enumerate().all(|(i, s)| s.index == i as i32));
}

#[test]
fn test_goto_out_of_range_is_rejected_not_planned() {
    let session = setup();
    let mut part = Part::arm(0, 0, 1);

    // A turn away from zero followed by the largest i32 rotation.
    let err = session.compile(&mut part, "rc\r\ngoto 2147483647").unwrap_err();
    assert!(matches!(err, CompileError::Parse(ref e) if e.line_number == 2));

    // A length that would plan two billion extends.
    let err = session.compile(&mut part, "goto 0 0 2000000000").unwrap_err();
    assert!(matches!(err, CompileError::Parse(_)));
    assert!(part.steps.is_empty());
}

#[test]
fn test_macro_names_must_be_referenceable() {
    let mut session = setup();
    assert_eq!(
        session.add_macro("pick.up", "g\r\ne"),
        Err(MacroError::InvalidName("pick.up".into()))
    );

    session.add_macro("Pick Up", "g\r\ne").unwrap();
    let part = Part::arm(0, 0, 1);
    assert_eq!(
        compiled(&session, &part, "pick  up"),
        vec![Action::Grab.at(0), Action::Extend.at(1)]
    );
}
