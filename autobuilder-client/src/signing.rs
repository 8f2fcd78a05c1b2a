//! AWS Signature Version 4
//!
//! Only what the worker needs: signing a request with a fully buffered body.
//! Header names are lowercased; the returned list contains every header that
//! must be sent, `authorization` included.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use crate::credentials::Credentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Scope a request is signed for
#[derive(Debug, Clone)]
pub struct SigningScope<'a> {
    pub region: &'a str,
    pub service: &'a str,
}

/// Signs a request and returns the headers to send with it
///
/// `headers` are the caller's own headers (e.g. `content-type`,
/// `x-amz-target`); `host`, `x-amz-date` and `x-amz-security-token` are added
/// here and every header is signed.
pub fn sign_request(
    method: &str,
    url: &Url,
    headers: &[(&str, &str)],
    body: &[u8],
    credentials: &Credentials,
    scope: &SigningScope<'_>,
    now: DateTime<Utc>,
) -> Vec<(String, String)> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let mut all: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    all.push(("host".to_string(), host_header(url)));
    all.push(("x-amz-date".to_string(), amz_date.clone()));
    if let Some(token) = &credentials.session_token {
        all.push(("x-amz-security-token".to_string(), token.clone()));
    }
    all.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers = all
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = all
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        canonical_path(url),
        canonical_query(url),
        canonical_headers,
        signed_headers,
        hex::encode(Sha256::digest(body))
    );

    let credential_scope = format!("{}/{}/{}/aws4_request", date, scope.region, scope.service);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        credential_scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(&credentials.secret_access_key, &date, scope);
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    all.push((
        "authorization".to_string(),
        format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, credentials.access_key_id, credential_scope, signed_headers, signature
        ),
    ));
    all
}

/// Derives the per-day signing key
pub fn signing_key(secret: &str, date: &str, scope: &SigningScope<'_>) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, scope.region.as_bytes());
    let k_service = hmac(&k_region, scope.service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn canonical_path(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn uri_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scope() -> SigningScope<'static> {
        SigningScope {
            region: "us-east-2",
            service: "sqs",
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_signed_headers_are_sorted_and_complete() {
        let url = Url::parse("https://sqs.us-east-2.amazonaws.com/").unwrap();
        let headers = sign_request(
            "POST",
            &url,
            &[
                ("X-Amz-Target", "AmazonSQS.ReceiveMessage"),
                ("Content-Type", "application/x-amz-json-1.0"),
            ],
            b"{}",
            &Credentials::new("AKIDEXAMPLE", "secret"),
            &scope(),
            fixed_time(),
        );

        assert_eq!(header(&headers, "host"), Some("sqs.us-east-2.amazonaws.com"));
        assert_eq!(header(&headers, "x-amz-date"), Some("20240301T123000Z"));

        let authorization = header(&headers, "authorization").unwrap();
        assert!(authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240301/us-east-2/sqs/aws4_request, "
        ));
        assert!(authorization.contains("SignedHeaders=content-type;host;x-amz-date;x-amz-target,"));

        let signature = authorization.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_session_token_is_signed() {
        let url = Url::parse("https://sqs.us-east-2.amazonaws.com/").unwrap();
        let mut credentials = Credentials::new("ASIA", "secret");
        credentials.session_token = Some("session".to_string());

        let headers = sign_request("POST", &url, &[], b"", &credentials, &scope(), fixed_time());

        assert_eq!(header(&headers, "x-amz-security-token"), Some("session"));
        assert!(header(&headers, "authorization")
            .unwrap()
            .contains("SignedHeaders=host;x-amz-date;x-amz-security-token,"));
    }

    #[test]
    fn test_signature_depends_on_body() {
        let url = Url::parse("https://sqs.us-east-2.amazonaws.com/").unwrap();
        let credentials = Credentials::new("AKID", "secret");
        let sign = |body: &[u8]| {
            let headers = sign_request("POST", &url, &[], body, &credentials, &scope(), fixed_time());
            header(&headers, "authorization").unwrap().to_string()
        };

        assert_eq!(sign(b"a"), sign(b"a"));
        assert_ne!(sign(b"a"), sign(b"b"));
    }

    fn suite_credentials() -> Credentials {
        Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
    }

    fn suite_scope() -> SigningScope<'static> {
        SigningScope {
            region: "us-east-1",
            service: "service",
        }
    }

    fn suite_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    // Vectors from the AWS SigV4 test suite
    #[test]
    fn test_aws_suite_get_vanilla() {
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let headers = sign_request(
            "GET",
            &url,
            &[],
            b"",
            &suite_credentials(),
            &suite_scope(),
            suite_time(),
        );

        assert_eq!(
            header(&headers, "authorization"),
            Some(
                "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
                 SignedHeaders=host;x-amz-date, \
                 Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
            )
        );
    }

    #[test]
    fn test_aws_suite_post_x_www_form_urlencoded() {
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let headers = sign_request(
            "POST",
            &url,
            &[("Content-Type", "application/x-www-form-urlencoded")],
            b"Param1=value1",
            &suite_credentials(),
            &suite_scope(),
            suite_time(),
        );

        assert_eq!(
            header(&headers, "authorization"),
            Some(
                "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
                 SignedHeaders=content-type;host;x-amz-date, \
                 Signature=ff11897932ad3f4e8b18135d722051e5ac45fc38421b1da7b9d196a0fe09473a"
            )
        );
    }

    #[test]
    fn test_host_with_port() {
        let url = Url::parse("http://localhost:9324/").unwrap();
        assert_eq!(host_header(&url), "localhost:9324");
    }

    #[test]
    fn test_canonical_query_sorted_and_encoded() {
        let url = Url::parse("https://example.com/?b=2&a=x y").unwrap();
        assert_eq!(canonical_query(&url), "a=x%20y&b=2");
    }
}
