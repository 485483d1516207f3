use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::debug;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Raw tokeninfo payload. Google encodes booleans as strings here.
#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: String,
    pub email_verified: bool,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
}

/// Explicit Google OAuth client: owns its HTTP client and client id, lives in
/// `AppState`, and is passed into each operation. No module-level mutable
/// credentials, so concurrent requests cannot race on shared configuration.
pub struct GoogleAuth {
    http: reqwest::Client,
    client_id: String,
}

impl GoogleAuth {
    pub fn new(client_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
        }
    }

    /// Verify an ID token against Google's tokeninfo endpoint and check it
    /// was minted for this application.
    pub async fn verify_id_token(&self, id_token: &str) -> anyhow::Result<GoogleProfile> {
        let info: TokenInfoResponse = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .context("tokeninfo request failed")?
            .error_for_status()
            .context("tokeninfo rejected the id token")?
            .json()
            .await
            .context("tokeninfo returned an unreadable payload")?;
        let profile = profile_from(info, &self.client_id)?;
        debug!(google_id = %profile.sub, "google id token verified");
        Ok(profile)
    }
}

fn profile_from(info: TokenInfoResponse, client_id: &str) -> anyhow::Result<GoogleProfile> {
    if info.aud != client_id {
        bail!("id token audience mismatch");
    }
    let Some(email) = info.email else {
        bail!("id token carries no email claim");
    };
    Ok(GoogleProfile {
        sub: info.sub,
        email: email.trim().to_lowercase(),
        email_verified: info.email_verified.as_deref() == Some("true"),
        given_name: info.given_name,
        family_name: info.family_name,
        picture: info.picture,
    })
}
