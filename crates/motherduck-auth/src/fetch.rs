//! Client for the service's own token endpoint
//!
//! Consumers that open a database session call this to obtain a credential.
//! `read_scaling = true` asks for a freshly minted, expiring token.

use serde::Deserialize;

use crate::constants::TOKEN_ENDPOINT_PATH;
use crate::credential::validate;
use crate::error::{Error, Result};

#[derive(Deserialize)]
struct TokenEndpointBody {
    #[serde(rename = "mdToken", default)]
    md_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Fetch a credential from `{base_url}/api/md-token`.
///
/// The returned token has passed the structural check.
pub async fn fetch_md_token(
    client: &reqwest::Client,
    base_url: &str,
    read_scaling: bool,
) -> Result<String> {
    let url = format!(
        "{}{TOKEN_ENDPOINT_PATH}?read_scaling={read_scaling}",
        base_url.trim_end_matches('/')
    );

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token endpoint request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        // Intermediaries may answer with a non-JSON body; keep the status either way
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        let message = serde_json::from_str::<TokenEndpointBody>(&text)
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| text.chars().take(200).collect());
        return Err(Error::Mint(format!("token endpoint returned {status}: {message}")));
    }

    let body = response
        .json::<TokenEndpointBody>()
        .await
        .map_err(|e| Error::Decode(format!("token endpoint response: {e}")))?;

    let token = body.md_token.unwrap_or_default();
    validate(&token)
        .into_result()
        .map(|credential| credential.into_inner())
        .map_err(Error::InvalidCredential)
}
