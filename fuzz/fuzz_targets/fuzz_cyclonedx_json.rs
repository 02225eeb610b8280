#![no_main]
use libfuzzer_sys::fuzz_target;
use sbom_binscan::{FormatFactory, FormatHandler};

const MAX_WRAPPED_INPUT_LEN: usize = 10_000;

/// Fuzz the CycloneDX JSON validator and parser.
///
/// Prefixes input with a minimal CycloneDX JSON wrapper to increase
/// the likelihood of reaching component handling rather than failing
/// at the envelope.
fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let Some(handler) = FormatFactory::create("cyclonedx", "1.5") else {
            return;
        };

        let _ = handler.validate(s);
        let _ = handler.parse_components(s);

        if s.len() < MAX_WRAPPED_INPUT_LEN {
            let wrapped = format!(
                r#"{{"bomFormat":"CycloneDX","specVersion":"1.5","components":[{s}]}}"#,
            );
            let _ = handler.validate(&wrapped);
            let _ = handler.parse_components(&wrapped);
        }
    }
});
