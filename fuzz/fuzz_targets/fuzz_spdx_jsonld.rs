#![no_main]
use libfuzzer_sys::fuzz_target;
use sbom_binscan::{FormatFactory, FormatHandler};

const MAX_WRAPPED_INPUT_LEN: usize = 10_000;

/// Fuzz the SPDX 3.0 JSON-LD validator and parser.
///
/// Wraps input as `@graph` elements so node handling is reached instead of
/// failing on the envelope.
fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let Some(handler) = FormatFactory::create("spdx", "3.0.1") else {
            return;
        };

        let _ = handler.validate(s);
        let _ = handler.parse_components(s);

        if s.len() < MAX_WRAPPED_INPUT_LEN {
            let wrapped = format!(
                r#"{{"@context":"https://spdx.org/rdf/3.0.1/spdx-context.jsonld","@graph":[{s}]}}"#,
            );
            let _ = handler.validate(&wrapped);
            let _ = handler.parse_components(&wrapped);
        }
    }
});
