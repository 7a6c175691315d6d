use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// EXMO authenticates requests with the API key in a `Key` header and a
/// hex-encoded HMAC-SHA512 of the form-encoded body in a `Sign` header.
#[derive(Clone)]
pub struct Signer {
    api_key: String,
    api_secret: SecretString,
}

impl Signer {
    pub fn new(api_key: String, api_secret: SecretString) -> Self {
        Self { api_key, api_secret }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Sign the exact bytes that go on the wire; any re-encoding after
    /// signing would invalidate the signature.
    pub fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = HmacSha512::new_from_slice(self.api_secret.expose_secret().as_bytes())
            .context("hmac init")?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("EXMO_API_KEY").context("EXMO_API_KEY not set")?;
        let api_secret = std::env::var("EXMO_API_SECRET").context("EXMO_API_SECRET not set")?;
        Ok(Self::new(api_key, SecretString::new(api_secret)))
    }
}
