//! Token sets: ordered word sequences with first-occurrence dedup.

use placelink_models::{AddressRecord, FieldSelection};

/// An ordered sequence of word tokens with insertion-order duplicates
/// removed (first occurrence wins).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenSet {
    tokens: Vec<String>,
}

impl TokenSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Appends a token unless it is already present.
    pub fn push(&mut self, token: &str) {
        if !self.tokens.iter().any(|t| t == token) {
            self.tokens.push(token.to_string());
        }
    }

    /// Whether the set contains a token.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// `true` when the set holds no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterates tokens in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// The tokens as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.tokens
    }
}

impl<'a> FromIterator<&'a str> for TokenSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for token in iter {
            set.push(token);
        }
        set
    }
}

/// Tokenizes a record over the selected fields.
///
/// Each included field is split on whitespace and concatenated in the
/// fixed field order (name, number, street, locality, town); duplicate
/// tokens are removed preserving first occurrence. Missing or empty
/// fields contribute nothing — an empty selection yields an empty set,
/// never an error.
#[must_use]
pub fn tokenize(record: &AddressRecord, fields: FieldSelection) -> TokenSet {
    let mut set = TokenSet::new();
    for field in fields.fields() {
        if let Some(value) = field.value(record) {
            for token in value.split_whitespace() {
                set.push(token);
            }
        }
    }
    set
}

/// Removes a leading house-number token.
///
/// If the *first* token contains a digit, it is removed from the
/// sequence and returned separately as the extracted number. Tokens with
/// digits elsewhere in the sequence are unaffected — callers wanting all
/// digit-bearing tokens gone use [`remove_digit_tokens`] instead.
#[must_use]
pub fn strip_leading_number(tokens: &TokenSet) -> (TokenSet, Option<String>) {
    match tokens.as_slice().first() {
        Some(first) if first.chars().any(|c| c.is_ascii_digit()) => {
            let rest = tokens.iter().skip(1).collect();
            (rest, Some(first.clone()))
        }
        _ => (tokens.clone(), None),
    }
}

/// Removes every token that contains a digit anywhere.
///
/// A distinct behavior from [`strip_leading_number`]: this drops all
/// digit-bearing tokens without reporting which was the house number.
#[must_use]
pub fn remove_digit_tokens(tokens: &TokenSet) -> TokenSet {
    tokens
        .iter()
        .filter(|t| !t.chars().any(|c| c.is_ascii_digit()))
        .collect()
}
