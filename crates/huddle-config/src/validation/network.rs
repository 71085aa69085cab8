//! Validation for signaling, API, ICE and relay sections.

use crate::schema::HuddleConfig;

use super::helpers::{validate_range, validate_scheme};

pub(crate) fn validate_signaling(errors: &mut Vec<String>, config: &HuddleConfig) {
    let s = &config.signaling;
    validate_scheme(errors, "signaling.url", &s.url, &["ws://", "wss://"]);
    validate_range(
        errors,
        "signaling.max_reconnect_attempts",
        s.max_reconnect_attempts,
        1,
        20,
    );
    if s.reconnect_base_delay_ms == 0 {
        errors.push("signaling.reconnect_base_delay_ms must be greater than 0".into());
    }
    if s.reconnect_base_delay_ms > s.max_reconnect_delay_ms {
        errors.push(format!(
            "signaling.reconnect_base_delay_ms = {} exceeds signaling.max_reconnect_delay_ms = {}",
            s.reconnect_base_delay_ms, s.max_reconnect_delay_ms
        ));
    }
    if s.connect_timeout_secs == 0 {
        errors.push("signaling.connect_timeout_secs must be greater than 0".into());
    }
}

pub(crate) fn validate_api(errors: &mut Vec<String>, config: &HuddleConfig) {
    validate_scheme(
        errors,
        "api.base_url",
        &config.api.base_url,
        &["http://", "https://"],
    );
}

pub(crate) fn validate_ice(errors: &mut Vec<String>, config: &HuddleConfig) {
    for (i, server) in config.ice.servers.iter().enumerate() {
        if server.urls.is_empty() {
            errors.push(format!("ice.servers[{i}].urls must not be empty"));
        }
        for url in &server.urls {
            validate_scheme(
                errors,
                &format!("ice.servers[{i}].urls"),
                url,
                &["stun:", "stuns:", "turn:", "turns:"],
            );
        }
    }
}

pub(crate) fn validate_relay(errors: &mut Vec<String>, config: &HuddleConfig) {
    if config.relay.port == 0 {
        errors.push("relay.port must not be 0".into());
    }
}
