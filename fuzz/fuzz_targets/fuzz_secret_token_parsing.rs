#![no_main]

use libfuzzer_sys::fuzz_target;

use moltguard::pii::validators::{aba_checksum, has_valid_aba_prefix, luhn_check, shannon_entropy};

fuzz_target!(|data: &str| {
    // These validators gate the bank-account, routing-number, credit-card,
    // and generic-secret-token layers of the entity detector. None of them
    // should ever panic regardless of input shape -- non-digit characters,
    // empty strings, or strings far longer than any real-world instance of
    // the format they check.
    let _ = luhn_check(data);
    let _ = aba_checksum(data);
    let _ = has_valid_aba_prefix(data);

    let entropy = shannon_entropy(data);
    assert!(entropy.is_finite());
    assert!(entropy >= 0.0);
});
