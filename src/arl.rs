//! The `arl` session cookie.

use std::{fmt, ops::Deref, str::FromStr};

use veil::Redact;

use crate::error::{Error, Result};

/// Authentication cookie value of a Deezer account.
#[derive(Clone, Eq, PartialEq, Hash, Redact)]
#[redact(all)]
pub struct Arl(String);

impl Arl {
    const LENGTH: usize = 192;
}

impl FromStr for Arl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let chars = s.chars().count();
        if chars != Self::LENGTH {
            return Err(Error::invalid_argument(format!(
                "arl should be {} characters long but is {chars}",
                Self::LENGTH
            )));
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::invalid_argument("arl contains invalid characters"));
        }

        Ok(Self(s.to_owned()))
    }
}

impl Deref for Arl {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Arl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_validated() {
        assert!("a".repeat(192).parse::<Arl>().is_ok());
        assert!("a".repeat(191).parse::<Arl>().is_err());
        assert!(format!("{};", "a".repeat(191)).parse::<Arl>().is_err());
    }

    #[test]
    fn debug_is_redacted() {
        let arl: Arl = "b".repeat(192).parse().unwrap();
        assert!(!format!("{arl:?}").contains("bbbb"));
    }
}
