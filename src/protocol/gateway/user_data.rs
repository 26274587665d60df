//! Session data from `deezer.getUserData`.
//!
//! Only the tokens the downloader needs are kept:
//!
//! ```json
//! {
//!     "USER": {
//!         "USER_ID": "123456789",
//!         "OPTIONS": { "license_token": "secret" }
//!     },
//!     "checkForm": "api_token"
//! }
//! ```

use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use veil::Redact;

use super::Method;

impl Method for UserData {
    const METHOD: &'static str = "deezer.getUserData";
}

#[derive(Clone, Eq, PartialEq, Deserialize, Redact)]
pub struct UserData {
    #[serde(rename = "USER")]
    pub user: User,

    /// Token for subsequent gateway calls
    #[serde(rename = "checkForm")]
    #[redact]
    pub api_token: String,
}

#[serde_as]
#[derive(Clone, Eq, PartialEq, Deserialize, Debug)]
pub struct User {
    /// `0` when the session is not logged in.
    #[serde(rename = "USER_ID")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    #[serde(default, rename = "OPTIONS")]
    pub options: Options,
}

#[derive(Clone, Default, Eq, PartialEq, Deserialize, Redact)]
pub struct Options {
    /// Token for media URL requests
    #[serde(default)]
    #[redact]
    pub license_token: String,
}

impl UserData {
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.user.id != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tokens() {
        let body = r#"{
            "USER": { "USER_ID": "42", "OPTIONS": { "license_token": "lt" } },
            "checkForm": "token"
        }"#;
        let data: UserData = serde_json::from_str(body).unwrap();
        assert!(data.is_logged_in());
        assert_eq!(data.user.options.license_token, "lt");
        assert_eq!(data.api_token, "token");
    }
}
