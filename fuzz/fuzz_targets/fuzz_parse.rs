#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Program JSON must never panic the deserializer or the validator.
        if let Ok(program) = cohere_ir::Program::from_json(s) {
            let _ = program.validate();
        }
    }
});
