//! Human-typeable room codes drawn from an alphabet without look-alike characters.

use std::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of characters in every room code.
pub const ROOM_CODE_LEN: usize = 6;
/// Allowed characters; `I`, `O`, `0` and `1` are left out on purpose.
pub const ROOM_CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Error returned when user input cannot be interpreted as a room code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomCodeError {
    /// Input does not have [`ROOM_CODE_LEN`] characters.
    #[error("room code must be {expected} characters, got {found}")]
    InvalidLength {
        /// Expected length.
        expected: usize,
        /// Length of the rejected input.
        found: usize,
    },
    /// Input contains a character outside of [`ROOM_CODE_ALPHABET`].
    #[error("invalid character '{ch}' at position {index} in room code")]
    InvalidCharacter {
        /// Offending character.
        ch: char,
        /// Zero-based position of the character.
        index: usize,
    },
}

/// Primary key of a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Parse user input, ignoring surrounding whitespace and letter case.
    pub fn parse(value: &str) -> Result<Self, RoomCodeError> {
        let normalized = value.trim().to_ascii_uppercase();
        let found = normalized.chars().count();
        if found != ROOM_CODE_LEN {
            return Err(RoomCodeError::InvalidLength {
                expected: ROOM_CODE_LEN,
                found,
            });
        }
        for (index, ch) in normalized.chars().enumerate() {
            if !ROOM_CODE_ALPHABET.contains(ch) {
                return Err(RoomCodeError::InvalidCharacter { ch, index });
            }
        }
        Ok(Self(normalized))
    }

    /// Draw a fresh random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let alphabet = ROOM_CODE_ALPHABET.as_bytes();
        let code = (0..ROOM_CODE_LEN)
            .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
            .collect();
        Self(code)
    }

    /// Borrow the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomCode {
    type Err = RoomCodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = RoomCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(value: RoomCode) -> Self {
        value.0
    }
}
