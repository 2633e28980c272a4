use reqwest::{header::CONTENT_TYPE, Client};

use crate::{config::Config, FetchError, Result};

/// A downloaded response body plus its declared content type.
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Builds the client every request goes through.
/// `Client` uses an `Arc` internally so it's cheap to clone into tasks.
pub fn build_client(config: &Config) -> Result<Client> {
    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout)
        .build()?;
    Ok(client)
}

/// Requests a page and returns its HTML.
pub async fn request_page_html(client: &Client, url: &str) -> std::result::Result<String, FetchError> {
    let res = client
        .get(url)
        .send()
        .await
        .and_then(|res| res.error_for_status())
        .map_err(|e| FetchError::from_reqwest(url, e))?;
    res.text().await.map_err(|e| FetchError::from_reqwest(url, e))
}

/// Requests raw bytes, reading at most `max_bytes` of body.
/// Only a non-2xx status or an oversized body is rejected here, the rest is validated by the caller.
pub async fn request_bytes(
    client: &Client,
    url: &str,
    max_bytes: usize,
) -> std::result::Result<Payload, FetchError> {
    let mut res = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    let status = res.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.into(),
            status: status.as_u16(),
        });
    }

    let too_large = || FetchError::TooLarge {
        url: url.into(),
        limit: max_bytes,
    };
    if res
        .content_length()
        .is_some_and(|len| len > max_bytes as u64)
    {
        return Err(too_large());
    }

    let content_type = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase());

    // The declared length can be missing or wrong, so count what actually arrives.
    let mut bytes = Vec::new();
    while let Some(chunk) = res
        .chunk()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?
    {
        if bytes.len() + chunk.len() > max_bytes {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(Payload {
        bytes,
        content_type,
    })
}
