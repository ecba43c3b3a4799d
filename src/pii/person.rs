//! Person-name recognition
//!
//! The detector depends on this through the `PersonEntityRecognizer` trait
//! so that a real NLP model can be dropped in without touching the regex
//! layers around it. `RuleBasedPersonRecognizer` is the on-host fallback:
//! title-case / ALL-CAPS / lowercase word-sequence heuristics gated on a
//! first-name list and an exclusion-word union, the same context-gated
//! matching shape the rest of this crate's regex layers use.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// A capability the detector depends on for person-name spans. Must run
/// entirely on-host, be deterministic for a given input, and return only
/// spans on non-structural lines whose text doesn't match the tax-form
/// label shape (`Form`, `Schedule`, `Statement`, `Wage`, `Tax` followed by
/// a word boundary).
pub trait PersonEntityRecognizer: Send + Sync {
    fn recognize(&self, text: &str) -> Vec<(usize, usize, String)>;
}

static TAX_FORM_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Form|Schedule|Statement|Wage|Tax)\b").unwrap());

/// A line counts as "structural" if, after leading whitespace, it begins
/// with a markdown heading/list marker or emphasis run.
pub fn is_structural_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#')
        || trimmed.starts_with("**")
        || trimmed.starts_with('-')
        || trimmed.starts_with('*')
        || trimmed.starts_with('_')
    {
        return true;
    }
    static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\s").unwrap());
    LIST_MARKER.is_match(trimmed)
}

const FIRST_NAMES: &[&str] = &[
    "james", "john", "robert", "michael", "william", "david", "richard", "joseph", "thomas",
    "charles", "christopher", "daniel", "matthew", "anthony", "mark", "donald", "steven",
    "andrew", "paul", "joshua", "kenneth", "kevin", "brian", "george", "edward", "ronald",
    "timothy", "jason", "jeffrey", "ryan", "jacob", "gary", "nicholas", "eric", "jonathan",
    "stephen", "larry", "justin", "scott", "brandon", "benjamin", "samuel", "raymond",
    "patrick", "alexander", "jack", "dennis", "jerry", "tyler", "aaron", "jose", "adam",
    "henry", "nathan", "douglas", "zachary", "peter", "kyle", "walter", "ethan", "jeremy",
    "harold", "keith", "christian", "roger", "noah", "gerald", "carl", "terry", "sean",
    "austin", "arthur", "lawrence", "jesse", "dylan", "bryan", "joe", "jordan", "billy",
    "bruce", "albert", "willie", "gabriel", "logan", "alan", "juan", "wayne", "roy",
    "mary", "patricia", "jennifer", "linda", "elizabeth", "barbara", "susan", "jessica",
    "sarah", "karen", "lisa", "nancy", "betty", "margaret", "sandra", "ashley", "kimberly",
    "emily", "donna", "michelle", "carol", "amanda", "dorothy", "melissa", "deborah",
    "stephanie", "rebecca", "sharon", "laura", "cynthia", "kathleen", "amy", "angela",
    "shirley", "anna", "brenda", "pamela", "emma", "nicole", "helen", "samantha",
    "katherine", "christine", "debra", "rachel", "catherine", "carolyn", "janet", "ruth",
    "maria", "heather", "diane", "virginia", "julie", "joyce", "victoria", "olivia",
    "kelly", "christina", "lauren", "joan", "evelyn", "judith", "megan", "cheryl",
    "andrea", "hannah", "jacqueline", "martha", "gloria", "teresa", "sara", "janice",
    "marie", "julia", "grace", "judy", "abigail", "alice", "jean",
];

static FIRST_NAME_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| FIRST_NAMES.iter().copied().collect());

fn is_known_first_name(word: &str) -> bool {
    FIRST_NAME_SET.contains(word.to_lowercase().as_str())
}

const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

const US_STATES: &[&str] = &[
    "alabama", "alaska", "arizona", "arkansas", "california", "colorado", "connecticut",
    "delaware", "florida", "georgia", "hawaii", "idaho", "illinois", "indiana", "iowa",
    "kansas", "kentucky", "louisiana", "maine", "maryland", "massachusetts", "michigan",
    "minnesota", "mississippi", "missouri", "montana", "nebraska", "nevada", "ohio",
    "oklahoma", "oregon", "pennsylvania", "tennessee", "texas", "utah", "vermont",
    "virginia", "washington", "wisconsin", "wyoming",
];

const TAX_TERMS: &[&str] = &[
    "form", "schedule", "statement", "wage", "tax", "irs", "withholding", "payroll",
    "deduction", "exemption", "refund", "filing", "return", "dependent", "taxpayer",
    "employer", "employee",
];

const STRUCTURAL_TERMS: &[&str] = &[
    "the", "and", "for", "with", "from", "this", "that", "section", "table", "figure",
    "appendix", "chapter", "part", "note", "page", "total", "amount", "summary",
];

const COMMON_ORGS: &[&str] = &[
    "inc", "llc", "corp", "corporation", "company", "co", "ltd", "department", "bureau",
    "agency", "office", "bank", "group", "holdings", "partners", "associates",
];

fn exclusion_union_contains(word: &str) -> bool {
    let lower = word.to_lowercase();
    MONTHS.contains(&lower.as_str())
        || US_STATES.contains(&lower.as_str())
        || TAX_TERMS.contains(&lower.as_str())
        || STRUCTURAL_TERMS.contains(&lower.as_str())
        || COMMON_ORGS.contains(&lower.as_str())
}

/// Every word of the candidate is in the exclusion union -> reject outright,
/// regardless of case shape.
fn all_words_excluded(words: &[&str]) -> bool {
    words.iter().all(|w| exclusion_union_contains(w))
}

static TITLE_CASE_WORD: &str = r"[A-Z][a-zA-Z'\.-]*";

static TITLE_CASE_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b{TITLE_CASE_WORD}(?:\s+{TITLE_CASE_WORD}){{1,3}}\b")).unwrap()
});

static ALL_CAPS_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,}(?:\s+[A-Z]{2,}){1,2}\b").unwrap());

static LOWERCASE_BIGRAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-z]+\s+[a-z]+\b").unwrap());

static EMAIL_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:From|To|Cc|Bcc|Reply-To|Sender):\s*([A-Z][a-zA-Z'-]*(?:\s+[A-Z][a-zA-Z'-]*){0,2})\s*<[^>]+>").unwrap()
});

static NAME_BEFORE_ANGLE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][a-zA-Z'-]*(?:\s+[A-Z][a-zA-Z'-]*){0,2})\s*<[^>@\s]+@[^>\s]+>").unwrap()
});

static SALUTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:Hi|Hey|Hello|Dear|Thanks|Thank you),?\s+([A-Z][a-zA-Z'-]*(?:\s+[A-Z][a-zA-Z'-]*)?)\b").unwrap()
});

/// Rule-based fallback implementation of `PersonEntityRecognizer`, good
/// enough for common name-bearing phrasing without depending on a real NLP
/// model. Precision will trail a trained recognizer on ambiguous
/// organization-vs-person capitalized phrases; see the open-question note
/// in the design ledger.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedPersonRecognizer;

impl RuleBasedPersonRecognizer {
    pub fn new() -> Self {
        Self
    }

    fn push_if_valid(
        &self,
        out: &mut Vec<(usize, usize, String)>,
        seen: &mut HashSet<(usize, usize)>,
        start: usize,
        end: usize,
        text: &str,
    ) {
        if seen.contains(&(start, end)) {
            return;
        }
        if TAX_FORM_LABEL.is_match(text) {
            return;
        }
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() || all_words_excluded(&words) {
            return;
        }
        seen.insert((start, end));
        out.push((start, end, text.to_string()));
    }
}

impl PersonEntityRecognizer for RuleBasedPersonRecognizer {
    fn recognize(&self, text: &str) -> Vec<(usize, usize, String)> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        // Header / salutation / angle-email patterns operate across the
        // whole buffer since they anchor on punctuation, not line shape;
        // the structural-line guard below still applies per-candidate.
        for re in [&*EMAIL_HEADER, &*NAME_BEFORE_ANGLE_EMAIL, &*SALUTATION] {
            for caps in re.captures_iter(text) {
                if let Some(m) = caps.get(1) {
                    let line_start = text[..m.start()].rfind('\n').map(|i| i + 1).unwrap_or(0);
                    let line_end = text[m.start()..].find('\n').map(|i| m.start() + i).unwrap_or(text.len());
                    if is_structural_line(&text[line_start..line_end]) {
                        continue;
                    }
                    self.push_if_valid(&mut out, &mut seen, m.start(), m.end(), m.as_str());
                }
            }
        }

        let mut offset = 0usize;
        for line in text.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();
            let trimmed_line = line.trim_end_matches('\n');
            if is_structural_line(trimmed_line) {
                continue;
            }

            for m in TITLE_CASE_SEQUENCE.find_iter(trimmed_line) {
                let words: Vec<&str> = m.as_str().split_whitespace().collect();
                let any_first_name = words.iter().any(|w| is_known_first_name(w));
                let all_pass_exclusion = words.iter().all(|w| !exclusion_union_contains(w));
                let accept = if words.len() == 2 {
                    all_pass_exclusion || any_first_name
                } else {
                    any_first_name
                };
                if accept {
                    self.push_if_valid(
                        &mut out,
                        &mut seen,
                        line_start + m.start(),
                        line_start + m.end(),
                        m.as_str(),
                    );
                }
            }

            for m in ALL_CAPS_SEQUENCE.find_iter(trimmed_line) {
                let words: Vec<&str> = m.as_str().split_whitespace().collect();
                if words.iter().any(|w| is_known_first_name(w)) {
                    self.push_if_valid(
                        &mut out,
                        &mut seen,
                        line_start + m.start(),
                        line_start + m.end(),
                        m.as_str(),
                    );
                }
            }

            for m in LOWERCASE_BIGRAM.find_iter(trimmed_line) {
                let words: Vec<&str> = m.as_str().split_whitespace().collect();
                if let [first, _second] = words[..] {
                    if is_known_first_name(first) {
                        self.push_if_valid(
                            &mut out,
                            &mut seen,
                            line_start + m.start(),
                            line_start + m.end(),
                            m.as_str(),
                        );
                    }
                }
            }
        }

        out.sort_by_key(|(start, end, _)| (*start, *end));
        out
    }
}
