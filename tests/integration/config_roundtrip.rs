//! Config persistence and validation through the controller and prompt.

use std::time::Duration;
use vaani::config::Gender;
use vaani::{AgentConfig, AgentError, EntryPreset, TurnController};

#[test]
fn assistant_preset_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let saved = AgentConfig::from_preset(EntryPreset::Assistant);
    saved.save_to_file(&path).unwrap();

    let loaded = AgentConfig::from_file(&path).unwrap();
    assert_eq!(loaded.persona.gender, Gender::Male);
    assert_eq!(loaded.persona.greeting, saved.persona.greeting);
    assert!(loaded.persona.extra_guidelines.is_empty());
    assert!((loaded.turn.min_speech_duration - 0.5).abs() < f64::EPSILON);
    assert_eq!(loaded.turn.interrupt_min_words, 0);
    assert!(loaded.turn.allow_interruptions);
}

#[test]
fn loaded_thresholds_drive_the_controller() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[turn]\nmin_speech_duration = 0.25\nmin_endpointing_delay = 0.8\nallow_interruptions = false\n",
    )
    .unwrap();

    let config = AgentConfig::from_file(&path).unwrap();
    let ctl = TurnController::from_settings(&config.turn).unwrap();
    assert_eq!(ctl.config().min_speech_duration(), Duration::from_millis(250));
    assert_eq!(ctl.config().min_endpointing_delay(), Duration::from_millis(800));
    assert_eq!(ctl.config().interrupt_speech_duration(), Duration::from_millis(500));
    assert!(!ctl.config().allow_interruptions());
    // Sections not in the file keep the pipeline preset.
    assert_eq!(config.persona.gender, Gender::Female);
}

#[test]
fn non_positive_thresholds_are_rejected() {
    for body in [
        "[turn]\nmin_speech_duration = 0.0\n",
        "[turn]\ninterrupt_speech_duration = -0.5\n",
        "[turn]\nmin_endpointing_delay = 0\n",
        "[turn]\ninterrupt_min_words = -1\n",
    ] {
        let config: AgentConfig = toml::from_str(body).unwrap();
        let err = TurnController::from_settings(&config.turn).unwrap_err();
        assert!(
            matches!(err, AgentError::InvalidConfiguration(_)),
            "{body}: {err}"
        );
    }
}

#[test]
fn prompt_uses_configured_script_path() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("script.yaml");
    std::fs::write(&script, "sales_script: |\n  Step 1: Namaste bolo.\n").unwrap();

    let mut config = AgentConfig::from_preset(EntryPreset::Pipeline);
    config.persona.sales_script_path = script;
    let path = dir.path().join("config.toml");
    config.save_to_file(&path).unwrap();

    let loaded = AgentConfig::from_file(&path).unwrap();
    let context = vaani::prompt::initial_context(&loaded).unwrap();
    let system = context.system_prompt().unwrap();
    assert!(system.starts_with("You are a female outbound sales voice assistant"));
    assert!(system.contains("Encourage the retailer"));
    assert!(system.ends_with("Sales Script:\nStep 1: Namaste bolo.\n"));
}
