//! Recorded call traces replayed through the controller.

use vaani::pipeline::messages::{Timestamp, TurnCommand};
use vaani::pipeline::trace::{TraceEvent, parse_trace, replay};
use vaani::{AgentConfig, EntryPreset, TurnController, TurnState};

const CALL: &str = r#"
# greeting, retailer barges in, then answers a question
{"event":"assistant_started","at":0.0}
{"event":"vad","at":2.0,"speaking":true}
{"event":"transcript","at":2.3,"text":"haan boliye"}
{"event":"vad","at":2.8,"speaking":false}
{"event":"tick","at":3.3}
{"event":"assistant_started","at":4.0,"interruptible":false}
{"event":"vad","at":4.5,"speaking":true}
{"event":"vad","at":5.5,"speaking":false}
{"event":"assistant_ended","at":7.0}
{"event":"vad","at":7.5,"speaking":true}
{"event":"transcript","at":8.0,"text":"do peti bhej do"}
{"event":"vad","at":8.6,"speaking":false}
{"event":"tick","at":10.0}
"#;

fn controller(preset: EntryPreset) -> TurnController {
    TurnController::from_settings(&AgentConfig::from_preset(preset).turn).unwrap()
}

#[test]
fn recorded_call_yields_expected_commands() {
    let events = parse_trace(CALL.as_bytes()).unwrap();
    assert_eq!(events.len(), 13);
    let mut ctl = controller(EntryPreset::Assistant);
    let steps = replay(&mut ctl, &events);

    let commands: Vec<&TurnCommand> = steps.iter().map(|s| &s.command).collect();
    assert_eq!(commands.len(), 3);
    assert_eq!(
        commands[0],
        &TurnCommand::StopAssistantSpeech {
            at: Timestamp::from_secs_f64(2.5)
        }
    );
    // Reported on the first event past the deadline.
    assert_eq!(steps[0].event, 3);

    let TurnCommand::CommitUserTurn(first) = commands[1] else {
        panic!("expected a commit");
    };
    assert_eq!(first.text(), "haan boliye");
    assert_eq!(steps[1].event, 4);

    let TurnCommand::CommitUserTurn(second) = commands[2] else {
        panic!("expected a commit");
    };
    assert_eq!(second.text(), "do peti bhej do");
    assert_eq!(ctl.state(), TurnState::Idle);
}

#[test]
fn steps_serialize_as_flat_json() {
    let events = parse_trace(CALL.as_bytes()).unwrap();
    let mut ctl = controller(EntryPreset::Pipeline);
    let steps = replay(&mut ctl, &events);
    let line = serde_json::to_string(&steps[0]).unwrap();
    assert!(line.contains("\"command\":\"stop_assistant_speech\""));
    assert!(line.contains("\"event\":3"));
    assert!(line.contains("\"state\":\"user_speaking\""));
}

#[test]
fn trace_written_by_the_serializer_parses_back() {
    let events = vec![
        TraceEvent::Vad {
            at: Timestamp::from_millis(0),
            speaking: true,
        },
        TraceEvent::Transcript {
            at: Timestamp::from_millis(200),
            text: "namaste".to_owned(),
        },
        TraceEvent::Cancel,
    ];
    let body: String = events
        .iter()
        .map(|e| serde_json::to_string(e).unwrap() + "\n")
        .collect();
    assert_eq!(parse_trace(body.as_bytes()).unwrap(), events);
}
