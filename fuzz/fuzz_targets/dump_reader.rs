#![no_main]

use libfuzzer_sys::fuzz_target;
use nvsniff::dump::{DumpEntry, DumpReader};

fuzz_target!(|data: &[u8]| {
    for entry in DumpReader::new(data) {
        let _ = entry;
    }
    let _ = DumpEntry::from_exact_bytes(data);
});
