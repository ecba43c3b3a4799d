//! PII detection, placeholder tokens, and reversible-tokenization types
//!
//! This module owns the data model shared by the sanitizer, the vault, and
//! the restorer: the closed set of entity `Category` values, the
//! `[category_n]` `Placeholder` format, and the transient `EntityMatch`
//! produced by one detector pass.

pub mod detector;
pub mod person;
pub mod validators;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A closed enumeration of the kinds of sensitive value the detector
/// recognizes. Order here doubles as the precedence the detector's layered
/// regex passes rely on when two categories could plausibly match the same
/// span (earlier declared category wins on overlap, per the detector's own
/// layer ordering — this enum's variant order is documentation, not a
/// runtime precedence table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Ssn,
    Itin,
    Ein,
    Email,
    Phone,
    Url,
    Ip,
    Iban,
    CreditCard,
    BankCard,
    Currency,
    TaxYear,
    Dob,
    Date,
    BankAccount,
    RoutingNumber,
    Address,
    PartialAddress,
    Person,
    Secret,
}

impl Category {
    /// The lowercase, snake_case prefix used in placeholders, e.g.
    /// `bank_account` for `Category::BankAccount`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ssn => "ssn",
            Category::Itin => "itin",
            Category::Ein => "ein",
            Category::Email => "email",
            Category::Phone => "phone",
            Category::Url => "url",
            Category::Ip => "ip",
            Category::Iban => "iban",
            Category::CreditCard => "credit_card",
            Category::BankCard => "bank_card",
            Category::Currency => "currency",
            Category::TaxYear => "tax_year",
            Category::Dob => "dob",
            Category::Date => "date",
            Category::BankAccount => "bank_account",
            Category::RoutingNumber => "routing_number",
            Category::Address => "address",
            Category::PartialAddress => "partial_address",
            Category::Person => "person",
            Category::Secret => "secret",
        }
    }

    /// All categories, in the order new placeholder prefixes are recognized
    /// by the restorer's fabricated-placeholder pass.
    pub const ALL: &'static [Category] = &[
        Category::Ssn,
        Category::Itin,
        Category::Ein,
        Category::Email,
        Category::Phone,
        Category::Url,
        Category::Ip,
        Category::Iban,
        Category::CreditCard,
        Category::BankCard,
        Category::Currency,
        Category::TaxYear,
        Category::Dob,
        Category::Date,
        Category::BankAccount,
        Category::RoutingNumber,
        Category::Address,
        Category::PartialAddress,
        Category::Person,
        Category::Secret,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or(())
    }
}

/// `[category_n]`, with `n >= 1` a per-session, per-category monotonic
/// counter. Canonical display form is bracketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placeholder {
    pub category: Category,
    pub n: u32,
}

impl Placeholder {
    pub fn new(category: Category, n: u32) -> Self {
        Self { category, n }
    }

    /// The bare `category_n` form some upstream models strip brackets down
    /// to; the restorer's bracket-stripped pass matches on this.
    pub fn bare(&self) -> String {
        format!("{}_{}", self.category.as_str(), self.n)
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.bare())
    }
}

/// A candidate sensitive span found by one `EntityDetector::detect` call.
/// Lives only for the duration of the sanitizer's processing of one text
/// buffer; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMatch {
    pub start: usize,
    pub end: usize,
    pub category: Category,
    pub original_text: String,
}

impl EntityMatch {
    pub fn new(start: usize, end: usize, category: Category, original_text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            category,
            original_text: original_text.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.original_text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.original_text.is_empty()
    }
}
