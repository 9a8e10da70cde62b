//! Policy files on disk: loading, normalization, legacy migration

use std::io::Write;

use notification_readout::config::{ContentCap, DuckFallback, GestureKind, MediaBehavior};
use notification_readout::{BehaviorMode, PolicyConfig, ReadoutError, SpeechTemplate};
use tempfile::NamedTempFile;

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_policy_file() {
    // Given: a policy file touching every section
    let file = write_config(
        r#"{
            "behavior_mode": "interrupt",
            "priority_apps": ["com.pager"],
            "cooldowns": {"com.chat": 60},
            "content_cap": {"mode": "words", "limit": 12},
            "delay_before_readout_secs": 2,
            "media_behavior": {"type": "duck", "volume_percent": 20, "fallback": "pause"},
            "template": "Varied",
            "gestures": {"shake": {"enabled": true, "threshold": 15.0}}
        }"#,
    );

    // When: it is loaded strictly
    let (config, violations) = PolicyConfig::load_strict(file.path()).unwrap();

    // Then: every value is kept and nothing is normalized
    assert!(violations.is_empty());
    assert_eq!(config.behavior_mode, BehaviorMode::Interrupt);
    assert!(config.is_priority("com.pager"));
    assert_eq!(config.cooldown_for("com.chat").map(|d| d.as_secs()), Some(60));
    assert_eq!(config.content_cap, ContentCap::Words(12));
    assert_eq!(config.readout_delay().map(|d| d.as_secs()), Some(2));
    assert_eq!(
        config.media_behavior,
        MediaBehavior::Duck {
            volume_percent: 20,
            fallback: DuckFallback::Pause
        }
    );
    assert_eq!(config.template, SpeechTemplate::Varied);
    assert!(config.gestures.is_active(GestureKind::Shake));
}

#[test]
fn test_out_of_range_values_are_normalized() {
    let file = write_config(
        r#"{
            "cooldowns": {"com.chat": 3, "com.mail": 0},
            "gestures": {
                "wave": {"threshold_percent": 95, "timeout": {"secs": 2}},
                "press": {"timeout": {"secs": 0}}
            }
        }"#,
    );

    let (config, violations) = PolicyConfig::load_strict(file.path()).unwrap();

    assert_eq!(config.cooldowns.get("com.chat"), Some(&30));
    assert!(config.cooldown_for("com.mail").is_none());
    assert_eq!(config.gestures.wave.threshold_percent(), 60);
    assert_eq!(config.gestures.timeout(GestureKind::Wave).secs(), 30);
    // 0 without a persisted confirmation is not honoured
    assert_eq!(config.gestures.timeout(GestureKind::Press).secs(), 30);
    let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
    assert!(fields.contains(&"cooldowns.com.chat"));
    assert!(fields.contains(&"gestures.wave.threshold_percent"));
    assert!(fields.contains(&"gestures.press.timeout"));
}

#[test]
fn test_oversized_and_negative_numbers_keep_rest_of_file() {
    // Given: a file whose numbers do not fit the settings they configure
    let file = write_config(
        r#"{
            "behavior_mode": "queue",
            "priority_apps": ["com.pager"],
            "template": "{app}: {title}",
            "cooldowns": {"com.chat": -1},
            "delay_before_readout_secs": 500,
            "gestures": {"wave": {"threshold_percent": 300}}
        }"#,
    );

    // When: it is loaded through the lenient path
    let (config, violations) = PolicyConfig::load(Some(file.path()));

    // Then: only the bad numbers are replaced
    assert_eq!(config.behavior_mode, BehaviorMode::Queue);
    assert!(config.is_priority("com.pager"));
    assert_eq!(config.template, SpeechTemplate::Fixed("{app}: {title}".into()));
    assert_eq!(config.cooldown_for("com.chat").map(|d| d.as_secs()), Some(30));
    assert_eq!(config.readout_delay().map(|d| d.as_secs()), Some(3));
    assert_eq!(config.gestures.wave.threshold_percent(), 60);
    assert_eq!(violations.len(), 3);

    // And: the strict path accepts the same file
    assert!(PolicyConfig::load_strict(file.path()).is_ok());
}

#[test]
fn test_legacy_audio_mode_migrates_once() {
    let legacy = write_config(r#"{"honour": {"audio_mode": false}}"#);
    let (config, _) = PolicyConfig::load_strict(legacy.path()).unwrap();
    assert!(!config.honour.silent_mode);
    assert!(!config.honour.vibrate_mode);

    // Saving and reloading the migrated config changes nothing
    let saved = write_config(&serde_json::to_string(&config).unwrap());
    let (reloaded, _) = PolicyConfig::load_strict(saved.path()).unwrap();
    assert_eq!(reloaded.honour, config.honour);

    // Both new flags present: legacy value ignored
    let mixed = write_config(
        r#"{"honour": {"audio_mode": false, "silent_mode": true, "vibrate_mode": true}}"#,
    );
    let (config, _) = PolicyConfig::load_strict(mixed.path()).unwrap();
    assert!(config.honour.silent_mode);
    assert!(config.honour.vibrate_mode);
}

#[test]
fn test_broken_file_strict_error_and_lenient_defaults() {
    let file = write_config("{ not json");

    let err = PolicyConfig::load_strict(file.path()).unwrap_err();
    assert!(matches!(err, ReadoutError::ConfigParse { .. }));

    let (config, violations) = PolicyConfig::load(Some(file.path()));
    assert_eq!(config, PolicyConfig::default());
    assert!(violations.is_empty());
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    let (config, _) = PolicyConfig::load(Some(&path));
    assert_eq!(config, PolicyConfig::default());
    assert!(matches!(
        PolicyConfig::load_strict(&path),
        Err(ReadoutError::ConfigRead { .. })
    ));
}
