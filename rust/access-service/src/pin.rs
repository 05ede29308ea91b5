//! Pins for the email-less confirmation flow.
//!
//! A pin is a short sequence of distinct digits 1-9, read as a path on a
//! 3x3 keypad:
//!
//! ```text
//! 1 2 3
//! 4 5 6
//! 7 8 9
//! ```
//!
//! Consecutive digits listed in [`CONFLICTS`] would cross the key between
//! them, so they never follow each other.
//!
//! Both the account and the agent can derive the same disposable signer
//! from the account DID and the pin.

use std::fmt;

use access_principal::{Did, Ed25519Signer};
use rand::{Rng, seq::SliceRandom};
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Pairs of digits that may not be adjacent, in either order.
pub const CONFLICTS: &[(u8, u8)] = &[
    (1, 3),
    (1, 7),
    (1, 9),
    (2, 8),
    (3, 7),
    (3, 9),
    (4, 6),
    (7, 9),
];

const DIGITS: [u8; 9] = [1, 2, 3, 4, 5, 6, 7, 8, 9];

/// Error type for pin generation and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    /// Pins have between 1 and 9 digits.
    #[error("pin length must be between 1 and 9, got {0}")]
    Length(usize),

    /// The text is not a valid pin.
    #[error("invalid pin {0}")]
    Invalid(String),

    /// No pin of this length exists.
    #[error("could not generate a pin of length {0}")]
    Exhausted(usize),

    /// The disposable signer could not be derived.
    #[error("failed to encode pin seed: {0}")]
    Seed(String),
}

/// A pin.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Pin(String);

impl Pin {
    /// Generate a pin of `length` digits.
    ///
    /// # Errors
    ///
    /// Fails if `length` is not between 1 and 9.
    pub fn generate<R: Rng + ?Sized>(length: usize, rng: &mut R) -> Result<Self, PinError> {
        if !(1..=DIGITS.len()).contains(&length) {
            return Err(PinError::Length(length));
        }
        let mut digits = Vec::with_capacity(length);
        if extend(&mut digits, length, rng) {
            Ok(Pin(digits.iter().map(|d| char::from(b'0' + d)).collect()))
        } else {
            Err(PinError::Exhausted(length))
        }
    }

    /// The digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the disposable signer for `account` and this pin.
    ///
    /// The seed is the SHA-256 of the JSON object `{"account", "pin"}`.
    ///
    /// # Errors
    ///
    /// Fails if the seed document cannot be encoded.
    pub fn signer(&self, account: &Did) -> Result<Ed25519Signer, PinError> {
        let document = json!({ "account": account.as_str(), "pin": self.0 });
        let bytes = serde_json::to_vec(&document).map_err(|e| PinError::Seed(e.to_string()))?;
        let seed: [u8; 32] = Sha256::digest(bytes).into();
        Ok(Ed25519Signer::from_seed(&seed))
    }
}

/// Extend `digits` to `length` with a random path, backtracking out of
/// dead ends.
fn extend<R: Rng + ?Sized>(digits: &mut Vec<u8>, length: usize, rng: &mut R) -> bool {
    if digits.len() == length {
        return true;
    }
    let mut candidates: Vec<u8> = DIGITS
        .iter()
        .copied()
        .filter(|digit| !digits.contains(digit))
        .filter(|digit| digits.last().is_none_or(|last| !conflicts(*last, *digit)))
        .collect();
    candidates.shuffle(rng);
    for digit in candidates {
        digits.push(digit);
        if extend(digits, length, rng) {
            return true;
        }
        digits.pop();
    }
    false
}

/// Whether `a` and `b` may not be adjacent.
pub fn conflicts(a: u8, b: u8) -> bool {
    CONFLICTS
        .iter()
        .any(|&(x, y)| (x, y) == (a, b) || (y, x) == (a, b))
}

/// Whether `text` is a valid pin.
pub fn is_valid(text: &str) -> bool {
    let digits: Vec<u8> = text.bytes().map(|b| b.wrapping_sub(b'0')).collect();
    !digits.is_empty()
        && digits.len() <= DIGITS.len()
        && digits.iter().all(|digit| DIGITS.contains(digit))
        && digits
            .iter()
            .enumerate()
            .all(|(i, digit)| !digits[..i].contains(digit))
        && digits.windows(2).all(|pair| !conflicts(pair[0], pair[1]))
}

impl std::str::FromStr for Pin {
    type Err = PinError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if is_valid(text) {
            Ok(Pin(text.to_string()))
        } else {
            Err(PinError::Invalid(text.to_string()))
        }
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(******)")
    }
}
