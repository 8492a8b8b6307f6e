#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(program) = cohere_ir::Program::from_json(s) {
            if let Ok(mut compiled) = program.compile() {
                // Every event belongs to exactly one branch class.
                let be = &compiled.branch_equivalence;
                for event in &compiled.events {
                    assert!(be.is_implied(event.id, event.id));
                }
                compiled
                    .branch_equivalence
                    .assign_visible_representatives(&compiled.events);
            }
        }
    }
});
