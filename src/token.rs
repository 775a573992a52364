// SPDX-License-Identifier: Apache-2.0
use std::fmt;

use rand::Rng;
use subtle::ConstantTimeEq;
use tracing::info;

/// Number of random bytes in a generated token (hex-encoded to twice as many chars)
pub const GENERATED_TOKEN_BYTES: usize = 16;

/// The shared secret guarding the upstream. An empty token disables
/// authentication altogether.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Token(value.into())
    }

    /// Use the configured value verbatim when one was given, even an empty one.
    /// Otherwise generate a fresh random token for this process.
    pub fn resolve(configured: Option<String>) -> Self {
        match configured {
            Some(value) => Token(value),
            None => {
                info!("No token configured, generating a random one");
                Self::generate()
            }
        }
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; GENERATED_TOKEN_BYTES];
        rand::rng().fill(&mut bytes);
        Token(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn is_disabled(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare a client-supplied value in constant time.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();
        if expected.len() != candidate.len() {
            return false;
        }
        expected.ct_eq(candidate).into()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_disabled() {
            f.write_str("Token(<disabled>)")
        } else {
            f.write_str("Token(<redacted>)")
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
