#![no_main]
use kstep_smt::backends::smtlib_parser::{parse_model_value, parse_sexp};
use kstep_smt::sorts::SmtSort;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Solver output parsing must never panic.
        let _ = parse_sexp(s);
        for sort in [SmtSort::Bool, SmtSort::Int, SmtSort::Real] {
            let _ = parse_model_value(s, &sort);
        }
    }
});
