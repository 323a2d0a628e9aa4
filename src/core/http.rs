use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

pub const APP_USER_AGENT: &str = concat!("PureLauncher/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for manifest and artifact downloads.
///
/// `identity` encoding keeps the bytes on disk equal to the bytes the
/// upstream SHA-1 was computed over.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .build()
}
