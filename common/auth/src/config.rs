use std::fmt;

/// Runtime configuration for HS256 verification.
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared signing secret.
    pub secret: Vec<u8>,
    /// Allowable clock skew in seconds when checking `exp`. Zero unless configured.
    pub leeway_seconds: u32,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            leeway_seconds: 0,
        }
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}
