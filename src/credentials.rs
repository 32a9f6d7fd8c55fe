//! Basic-auth credential encoding for the NTRIP handshake.

use base64::{engine::general_purpose, Engine};

/// A `user:password` pair, encoded for the `Authorization: Basic` header.
#[derive(Clone, Default, PartialEq)]
pub(crate) struct NtripCredentials {
    user: String,
    password: String,
}

impl NtripCredentials {
    pub(crate) fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_string(),
            password: password.to_string(),
        }
    }

    pub(crate) fn encode(&self) -> String {
        general_purpose::STANDARD.encode(format!("{}:{}", self.user, self.password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_user_colon_password() {
        let creds = NtripCredentials::new("u", "p");
        assert_eq!(creds.encode(), "dTpw");
    }

    #[test]
    fn empty_credentials_still_encode() {
        let creds = NtripCredentials::new("", "");
        assert_eq!(creds.encode(), general_purpose::STANDARD.encode(":"));
    }
}
