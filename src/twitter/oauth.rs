//! OAuth 1.0a request signing
//!
//! HMAC-SHA1 signatures over the RFC 5849 base string, with RFC 3986
//! percent encoding. Only the OAuth protocol parameters and any
//! query/form parameters enter the signature; RFC 5849 excludes multipart
//! and JSON bodies.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::{distr::Alphanumeric, Rng};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Pre-provisioned user-context credentials
#[derive(Debug, Clone)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

/// Build the `Authorization: OAuth ...` header value for a request
///
/// `extra_params` are query/form parameters that must be covered by the
/// signature. A fresh nonce and timestamp are generated per call.
pub fn authorization_header(
    creds: &Credentials,
    method: &str,
    url: &str,
    extra_params: &[(&str, &str)],
) -> String {
    let nonce: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let timestamp = Utc::now().timestamp().to_string();
    build_header(creds, method, url, extra_params, &nonce, &timestamp)
}

fn build_header(
    creds: &Credentials,
    method: &str,
    url: &str,
    extra_params: &[(&str, &str)],
    nonce: &str,
    timestamp: &str,
) -> String {
    let oauth_params = [
        ("oauth_consumer_key", creds.consumer_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", creds.access_token.as_str()),
        ("oauth_version", "1.0"),
    ];

    let signature = sign(creds, method, url, &oauth_params, extra_params);

    let mut header = String::from("OAuth ");
    for (key, value) in oauth_params {
        header.push_str(&format!("{}=\"{}\", ", percent(key), percent(value)));
    }
    header.push_str(&format!("oauth_signature=\"{}\"", percent(&signature)));
    header
}

/// RFC 3986 percent encoding (unreserved characters pass through)
fn percent(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn sign(
    creds: &Credentials,
    method: &str,
    url: &str,
    oauth_params: &[(&str, &str)],
    extra_params: &[(&str, &str)],
) -> String {
    // Parameters are encoded first, then sorted by encoded key/value
    let mut pairs: Vec<(String, String)> = oauth_params
        .iter()
        .chain(extra_params.iter())
        .map(|(k, v)| (percent(k), percent(v)))
        .collect();
    pairs.sort();

    let param_string = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent(url),
        percent(&param_string)
    );
    let key = format!(
        "{}&{}",
        percent(&creds.consumer_secret),
        percent(&creds.access_token_secret)
    );

    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(base.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}
