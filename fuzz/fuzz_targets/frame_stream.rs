#![no_main]

use libfuzzer_sys::fuzz_target;
use nvsniff::config::SnifferConfig;
use nvsniff::pipeline::Pipeline;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a captured stream; must never panic
    if let Ok(pipeline) = Pipeline::new(SnifferConfig::new()) {
        let _ = pipeline.process(data);
    }
});
