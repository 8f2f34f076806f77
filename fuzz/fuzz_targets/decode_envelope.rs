#![no_main]

use libfuzzer_sys::fuzz_target;
use tiered_envelope::wire;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(envelope) = wire::decode(text) {
        assert_eq!(envelope.fields.len(), envelope.mode.arity());
        // canonical base64 means decoding is injective
        assert_eq!(wire::encode(&envelope).unwrap(), text);
    }
});
