//! End-to-end call sessions on a paused clock.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vaani::pipeline::hooks::Hooks;
use vaani::pipeline::session::feed_json_lines;
use vaani::{
    AgentConfig, CallSession, ChatContext, ChatRole, EntryPreset, SessionHandle, SessionInput,
    SessionOutput,
};

struct Call {
    handle: SessionHandle,
    out: mpsc::Receiver<SessionOutput>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<vaani::Result<()>>,
}

fn dial(config: &AgentConfig, hooks: Hooks) -> Call {
    let (session, handle, out) =
        CallSession::new(config, ChatContext::with_system("script"), hooks).unwrap();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(session.run(cancel.clone()));
    Call {
        handle,
        out,
        cancel,
        task,
    }
}

async fn send(call: &Call, input: SessionInput) {
    call.handle.send(input).await.unwrap();
}

async fn user_says(call: &Call, text: &str, speak_for: Duration) {
    send(call, SessionInput::VoiceActivity { is_speaking: true }).await;
    tokio::time::sleep(speak_for).await;
    send(
        call,
        SessionInput::Transcript {
            text: text.to_owned(),
        },
    )
    .await;
    send(call, SessionInput::VoiceActivity { is_speaking: false }).await;
}

#[tokio::test(start_paused = true)]
async fn greeting_barge_in_and_reply() {
    let config = AgentConfig::from_preset(EntryPreset::Pipeline);
    let mut call = dial(&config, Hooks::identity());

    let SessionOutput::Speak { text, interruptible } = call.out.recv().await.unwrap() else {
        panic!("expected the greeting");
    };
    assert_eq!(text, config.persona.greeting);
    assert!(interruptible);
    send(
        &call,
        SessionInput::AssistantSpeechStarted {
            interruptible: true,
        },
    )
    .await;

    user_says(&call, "haan ji boliye", Duration::from_millis(800)).await;
    assert!(matches!(
        call.out.recv().await.unwrap(),
        SessionOutput::StopPlayback { .. }
    ));

    let SessionOutput::LlmRequest { turn, context } = call.out.recv().await.unwrap() else {
        panic!("expected an LLM request");
    };
    assert_eq!(turn.text(), "haan ji boliye");
    let roles: Vec<ChatRole> = context.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![ChatRole::System, ChatRole::Assistant, ChatRole::User]
    );

    send(
        &call,
        SessionInput::Say {
            text: "Naye namkeen ka stock aaya hai.".to_owned(),
            interruptible: true,
        },
    )
    .await;
    let SessionOutput::Speak { text, .. } = call.out.recv().await.unwrap() else {
        panic!("expected the reply");
    };
    assert_eq!(text, "Naye namkeen ka stock aaya hai.");

    call.handle.hang_up().await.unwrap();
    assert_eq!(call.out.recv().await.unwrap(), SessionOutput::Ended);
    call.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn uninterruptible_reply_is_not_stopped() {
    let mut config = AgentConfig::from_preset(EntryPreset::Assistant);
    config.session.greet_on_connect = false;
    let mut call = dial(&config, Hooks::identity());

    send(
        &call,
        SessionInput::AssistantSpeechStarted {
            interruptible: false,
        },
    )
    .await;
    send(&call, SessionInput::VoiceActivity { is_speaking: true }).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    send(&call, SessionInput::VoiceActivity { is_speaking: false }).await;
    send(&call, SessionInput::AssistantSpeechEnded).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    call.cancel.cancel();
    assert_eq!(call.out.recv().await.unwrap(), SessionOutput::Ended);
    call.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn history_is_trimmed_before_the_llm_sees_it() {
    let mut config = AgentConfig::from_preset(EntryPreset::Pipeline);
    config.session.greet_on_connect = false;
    config.llm.max_history_messages = 2;
    let mut call = dial(&config, Hooks::identity());

    for (i, reply) in ["pehla", "doosra"].iter().enumerate() {
        user_says(&call, &format!("sawaal {i}"), Duration::from_millis(400)).await;
        assert!(matches!(
            call.out.recv().await.unwrap(),
            SessionOutput::LlmRequest { .. }
        ));
        send(
            &call,
            SessionInput::Say {
                text: (*reply).to_owned(),
                interruptible: true,
            },
        )
        .await;
        assert!(matches!(
            call.out.recv().await.unwrap(),
            SessionOutput::Speak { .. }
        ));
    }

    user_says(&call, "aakhri sawaal", Duration::from_millis(400)).await;
    let SessionOutput::LlmRequest { context, .. } = call.out.recv().await.unwrap() else {
        panic!("expected an LLM request");
    };
    let texts: Vec<&str> = context.messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["script", "doosra", "aakhri sawaal"]);

    call.cancel.cancel();
    call.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn before_tts_hook_can_silence_an_utterance() {
    let mut config = AgentConfig::from_preset(EntryPreset::Pipeline);
    config.session.greet_on_connect = false;
    let mut hooks = Hooks::identity();
    hooks
        .before_tts
        .push(|text: String| if text.contains("[skip]") { String::new() } else { text });
    let mut call = dial(&config, hooks);

    send(
        &call,
        SessionInput::Say {
            text: "[skip] internal note".to_owned(),
            interruptible: true,
        },
    )
    .await;
    send(
        &call,
        SessionInput::Say {
            text: "Dhanyavaad".to_owned(),
            interruptible: true,
        },
    )
    .await;
    let SessionOutput::Speak { text, .. } = call.out.recv().await.unwrap() else {
        panic!("expected speech");
    };
    assert_eq!(text, "Dhanyavaad");

    drop(call.handle);
    assert_eq!(call.out.recv().await.unwrap(), SessionOutput::Ended);
}

#[tokio::test]
async fn json_lines_feed_from_a_plain_thread() {
    let mut config = AgentConfig::from_preset(EntryPreset::Pipeline);
    config.session.greet_on_connect = false;
    let Call {
        handle,
        mut out,
        task,
        ..
    } = dial(&config, Hooks::identity());

    let input = concat!(
        "{\"type\":\"say\",\"text\":\"Namaste ji\"}\n",
        "\n",
        "not json\n",
        "{\"type\":\"say\",\"text\":\"Order note kar liya\",\"interruptible\":false}\n",
    );
    let feeder = std::thread::spawn(move || {
        feed_json_lines(std::io::Cursor::new(input), &handle).unwrap()
    });

    let mut lines = Vec::new();
    while let Some(output) = out.recv().await {
        lines.push(serde_json::to_string(&output).unwrap());
        if output == SessionOutput::Ended {
            break;
        }
    }
    assert_eq!(feeder.join().unwrap(), 2);
    assert_eq!(
        lines,
        vec![
            r#"{"type":"speak","text":"Namaste ji","interruptible":true}"#,
            r#"{"type":"speak","text":"Order note kar liya","interruptible":false}"#,
            r#"{"type":"ended"}"#,
        ]
    );
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn blocking_send_fails_once_the_session_is_gone() {
    let config = AgentConfig::from_preset(EntryPreset::Pipeline);
    let Call {
        handle,
        mut out,
        cancel,
        task,
    } = dial(&config, Hooks::identity());
    cancel.cancel();
    assert_eq!(out.recv().await.unwrap(), SessionOutput::Ended);
    task.await.unwrap().unwrap();

    let result = std::thread::spawn(move || handle.blocking_send(SessionInput::HangUp))
        .join()
        .unwrap();
    assert!(matches!(result, Err(vaani::AgentError::Channel(_))));
}
