//! Checksum and statistical validators used to cut false positives in the
//! entity detector: Luhn for card numbers, the ABA routing-number
//! algorithm, and Shannon entropy for secret-token candidates.

/// Luhn checksum, used to confirm a digit run plausibly shapes a real
/// credit-card number rather than an arbitrary 16-digit string.
pub fn luhn_check(digits: &str) -> bool {
    let digits: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 2 {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// ABA routing-number checksum: `3(d1+d4+d7) + 7(d2+d5+d8) + (d3+d6+d9) mod 10 == 0`.
/// Expects exactly 9 ASCII digits.
pub fn aba_checksum(digits: &str) -> bool {
    let d: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if d.len() != 9 {
        return false;
    }

    let sum = 3 * (d[0] + d[3] + d[6]) + 7 * (d[1] + d[4] + d[7]) + (d[2] + d[5] + d[8]);
    sum % 10 == 0
}

/// Known-valid ABA routing-number prefixes (first two digits). Routing
/// numbers are assigned in bands; this is a coarse prefilter applied
/// before the checksum, matching the banking-context layer's
/// "ABA prefix validation" step.
pub fn has_valid_aba_prefix(digits: &str) -> bool {
    match digits.get(0..2) {
        Some(prefix) => matches!(
            prefix,
            "00" | "01" | "02" | "03" | "04" | "05" | "06" | "07" | "08" | "09" | "10" | "11"
                | "12" | "21" | "22" | "23" | "24" | "25" | "26" | "27" | "28" | "29" | "30"
                | "31" | "32"
        ),
        None => false,
    }
}

/// Shannon entropy in bits per character, used to distinguish random
/// secret-shaped tokens from ordinary words/identifiers of the same length.
pub fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut counts = std::collections::HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_insert(0u32) += 1;
    }

    let len = s.chars().count() as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_accepts_known_valid_card() {
        assert!(luhn_check("4532015112830366"));
    }

    #[test]
    fn luhn_rejects_invalid_card() {
        assert!(!luhn_check("4532015112830367"));
    }

    #[test]
    fn aba_checksum_accepts_known_valid_routing_number() {
        // 322271627 is a published-valid test routing number.
        assert!(aba_checksum("322271627"));
    }

    #[test]
    fn aba_checksum_rejects_bad_checksum() {
        assert!(!aba_checksum("123456789"));
    }

    #[test]
    fn aba_checksum_requires_nine_digits() {
        assert!(!aba_checksum("12345678"));
    }

    #[test]
    fn entropy_of_repeated_char_is_zero() {
        assert_eq!(shannon_entropy("aaaaaaaa"), 0.0);
    }

    #[test]
    fn entropy_of_random_looking_token_is_high() {
        let entropy = shannon_entropy("aK9z2Qm7Lp4Xr8Wt");
        assert!(entropy >= 3.0, "entropy was {entropy}");
    }

    #[test]
    fn entropy_of_dictionary_word_is_lower_than_random() {
        let word = shannon_entropy("passwordpassword");
        let random = shannon_entropy("aK9z2Qm7Lp4Xr8Wt");
        assert!(word < random);
    }
}
