//! Document fuzz target: feed arbitrary text to the markup front end and the facade.
//! Neither may panic; malformed input must end up as diagnostics.
//! Build with: cargo fuzz run document_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    let _ = wiredsl::parse_document(s);
    let mut protocol = wiredsl::Protocol::new();
    if protocol.parse(s) {
        let _ = protocol.validate();
        let _ = protocol.all_messages();
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run document_fuzz");
}
