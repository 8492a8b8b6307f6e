#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(program) = cohere_ir::Program::from_json(s) {
            if let Ok(compiled) = program.compile() {
                // Encode and print; skip solving.
                let enc = cohere_smt::encoder::encode_program(&compiled);
                let approx =
                    cohere_smt::encoder::encode_po_loc_rf_acyclicity(&compiled, &enc.rf_candidates);
                let _ = cohere_smt::backends::smtlib_printer::to_script(
                    &enc.declarations,
                    &enc.assertions,
                );
                let _ = cohere_smt::backends::smtlib_printer::to_script(
                    &approx.declarations,
                    &approx.assertions,
                );
                let _ = cohere_smt::encoder::encode_assertion_violation(&compiled);
            }
        }
    }
});
