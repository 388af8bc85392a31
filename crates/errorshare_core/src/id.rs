use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const CHAR_TABLE: &[char; 36] = &[
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Number of characters of a freshly generated [`Name`].
pub const DEFAULT_LENGTH: usize = 8;

/// Longest name accepted when parsing.
const MAX_LENGTH: usize = 64;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("illegal characters")]
    IllegalCharacters,
    #[error("wrong size")]
    WrongSize,
}

/// Public identifier of a shared item.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    /// Generate a new random [`Name`] of [`DEFAULT_LENGTH`] characters. Uniqueness is left to the
    /// database.
    #[must_use]
    pub fn rand() -> Self {
        Self::rand_with_length(DEFAULT_LENGTH)
    }

    /// Generate a new random [`Name`] of `digits` characters drawn uniformly from `a-z0-9`.
    #[must_use]
    pub fn rand_with_length(digits: usize) -> Self {
        let mut rng = rand::rng();

        let name = (0..digits)
            .map(|_| CHAR_TABLE[rng.random_range(0..CHAR_TABLE.len())])
            .collect();

        Self(name)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() || value.len() > MAX_LENGTH {
            return Err(Error::WrongSize);
        }

        if !value.chars().all(|c| CHAR_TABLE.contains(&c)) {
            return Err(Error::IllegalCharacters);
        }

        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for Name {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}
