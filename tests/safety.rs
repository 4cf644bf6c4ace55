//! Safety Limits Integration Tests
//!
//! Tests for note validation before anything is sent to a provider.

use cidlens::core::{SafetyLimits, SafetyViolation};
use std::path::Path;

#[test]
fn test_max_note_bytes() {
    let limits = SafetyLimits {
        max_note_bytes: 100,
        ..Default::default()
    };

    assert!(limits.validate_note(&"x".repeat(50)).is_ok());
    assert!(limits.validate_note(&"x".repeat(100)).is_ok());

    match limits.validate_note(&"x".repeat(200)) {
        Err(SafetyViolation::MaxNoteBytes { actual, limit }) => {
            assert_eq!(actual, 200);
            assert_eq!(limit, 100);
        }
        other => panic!("Expected MaxNoteBytes violation, got {:?}", other),
    }
}

#[test]
fn test_note_size_counts_bytes_not_chars() {
    let limits = SafetyLimits {
        max_note_bytes: 10,
        ..Default::default()
    };

    // 6 chars, 12 bytes
    let note = "ãããããã";
    assert!(matches!(
        limits.validate_note(note),
        Err(SafetyViolation::MaxNoteBytes { actual: 12, .. })
    ));
}

#[test]
fn test_blank_notes_rejected() {
    let limits = SafetyLimits::default();

    for note in ["", "   ", "\n\t\n"] {
        assert_eq!(
            limits.validate_note(note),
            Err(SafetyViolation::EmptyNote)
        );
    }
}

#[test]
fn test_denylist_blocks_secret_files() {
    let limits = SafetyLimits::default();

    assert!(limits.is_denylisted(".env"));
    assert!(limits.is_denylisted("config/.env.production"));
    assert!(limits.is_denylisted("secrets.yaml"));
    assert!(limits.is_denylisted("deploy/aws-credentials.json"));
    assert!(limits.is_denylisted("certs/server.pem"));
    assert!(limits.is_denylisted("ssl/private.key"));
}

#[test]
fn test_denylist_allows_notes() {
    let limits = SafetyLimits::default();

    assert!(!limits.is_denylisted("nota.txt"));
    assert!(!limits.is_denylisted("notas/paciente-042.md"));
    assert!(!limits.is_denylisted("/tmp/evolucao.txt"));
}

#[test]
fn test_check_source_refuses_denylisted_path() {
    let limits = SafetyLimits::default();

    assert!(limits.check_source(Path::new("notas/caso.txt")).is_ok());

    match limits.check_source(Path::new(".env.local")) {
        Err(SafetyViolation::DenylistMatch { path }) => assert!(path.contains(".env.local")),
        other => panic!("Expected DenylistMatch violation, got {:?}", other),
    }
}

#[test]
fn test_limits_from_yaml_fill_defaults() {
    let limits: SafetyLimits = serde_yaml::from_str("max_note_bytes: 2048\n").unwrap();

    assert_eq!(limits.max_note_bytes, 2048);
    assert_eq!(limits.request_timeout_seconds, 120);
    assert_eq!(limits.max_retries, 2);
    assert_eq!(limits.denylist_patterns.len(), 5);
}
