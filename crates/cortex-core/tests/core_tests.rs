//! Tests for cortex-core: session keys, roles, capabilities, tiers, errors

use cortex_core::*;

// ===========================================================================
// SessionKey
// ===========================================================================

#[test]
fn session_key_new_and_display() {
    let key = SessionKey::new("abc-123");
    assert_eq!(key.as_str(), "abc-123");
    assert_eq!(format!("{}", key), "abc-123");
}

#[test]
fn session_key_from_string() {
    let key: SessionKey = "hello".into();
    assert_eq!(key.as_str(), "hello");
    let key2: SessionKey = String::from("world").into();
    assert_eq!(key2.as_str(), "world");
}

#[test]
fn session_key_equality_and_hash() {
    use std::collections::HashSet;
    let a = SessionKey::new("same");
    let b = SessionKey::new("same");
    let c = SessionKey::new("different");
    assert_eq!(a, b);
    assert_ne!(a, c);
    let mut set = HashSet::new();
    set.insert(a.clone());
    assert!(set.contains(&b));
    assert!(!set.contains(&c));
}

#[test]
fn session_key_serializes_as_plain_string() {
    let key = SessionKey::new("s-1");
    assert_eq!(serde_json::to_string(&key).unwrap(), r#""s-1""#);
    let back: SessionKey = serde_json::from_str(r#""s-1""#).unwrap();
    assert_eq!(back, key);
}

// ===========================================================================
// Role
// ===========================================================================

#[test]
fn role_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
    assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), r#""assistant""#);
    assert_eq!(Role::Assistant.as_str(), "assistant");
}

// ===========================================================================
// Capability
// ===========================================================================

#[test]
fn capability_parses_case_insensitively() {
    assert_eq!("CODE".parse::<Capability>().unwrap(), Capability::Code);
    assert_eq!(" research ".parse::<Capability>().unwrap(), Capability::Research);
    assert!(matches!(
        "juggling".parse::<Capability>(),
        Err(Error::UnknownCapability(_))
    ));
}

#[test]
fn capability_order_is_declaration_order() {
    let mut caps = vec![Capability::General, Capability::Code, Capability::Research];
    caps.sort();
    assert_eq!(caps, vec![Capability::Research, Capability::Code, Capability::General]);
}

// ===========================================================================
// Tier
// ===========================================================================

#[test]
fn tier_ordering_matches_cost_classes() {
    assert!(Tier::Local < Tier::Fast);
    assert!(Tier::Fast < Tier::Balanced);
    assert!(Tier::Balanced < Tier::Smart);
    assert!(Tier::Smart < Tier::Coding);
    assert!(Tier::Coding < Tier::Vision);
}

#[test]
fn tier_escalation_chains() {
    assert_eq!(Tier::Local.escalation(), &[Tier::Fast, Tier::Balanced, Tier::Smart]);
    assert_eq!(Tier::Fast.escalation(), &[Tier::Balanced, Tier::Smart]);
    assert!(Tier::Smart.escalation().is_empty());
    assert!(Tier::Vision.escalation().is_empty());
    assert_eq!(Tier::Coding.escalation(), &[Tier::Smart]);
}

#[test]
fn tier_serde_and_parse() {
    assert_eq!(serde_json::to_string(&Tier::Balanced).unwrap(), r#""balanced""#);
    assert_eq!("smart".parse::<Tier>().unwrap(), Tier::Smart);
    assert!(matches!("turbo".parse::<Tier>(), Err(Error::UnknownTier(_))));
}

#[test]
fn tier_deserializes_from_toml() {
    #[derive(serde::Deserialize)]
    struct Row {
        tier: Tier,
    }
    let row: Row = toml::from_str(r#"tier = "coding""#).unwrap();
    assert_eq!(row.tier, Tier::Coding);
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn error_display_messages() {
    assert_eq!(Error::UnknownAgent("x".into()).to_string(), "unknown agent: x");
    assert_eq!(Error::DuplicateAgent("x".into()).to_string(), "duplicate agent: x");
    assert_eq!(
        Error::EmptyCapabilities("x".into()).to_string(),
        "agent x declares no capabilities"
    );
    assert_eq!(Error::config("bad").to_string(), "config error: bad");
}

#[test]
fn error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: Error = io.into();
    assert!(err.to_string().contains("gone"));
}
