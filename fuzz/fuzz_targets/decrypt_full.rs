#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;
use tiered_envelope::{Engine, EngineConfig, InMemoryPreferences, SoftwareKeyStore};

static ENGINE: Lazy<Engine> = Lazy::new(|| {
    let engine = Engine::with_config(
        EngineConfig::new(0, 2),
        Arc::new(SoftwareKeyStore::in_memory()),
        Arc::new(InMemoryPreferences::new()),
    )
    .unwrap();
    engine.initialize().unwrap();
    engine
});

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // any input must fail cleanly; forging a valid MAC is out of reach
    if let Err(e) = ENGINE.decrypt(text) {
        assert!(e.is_format() || e.is_crypto() || e.is_unsupported_tier());
    } else {
        assert!(text.is_empty());
    }
});
