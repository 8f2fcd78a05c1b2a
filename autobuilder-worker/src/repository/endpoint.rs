//! Endpoint URLs of the job API

use anyhow::{Context, Result, anyhow};
use reqwest::Url;

/// Appends `segments` to the path of `base`
///
/// Each segment is percent-encoded on its own, so an id containing `/` or
/// `?` stays a single path segment.
pub fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid API URL '{}'", base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("API URL '{}' cannot take a path", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_are_encoded() {
        let url = endpoint("http://localhost:8080", &["api", "jobs", "a/b c?d"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/jobs/a%2Fb%20c%3Fd");
    }

    #[test]
    fn test_keeps_base_path() {
        let url = endpoint("https://jobs.internal/v1", &["api", "repos", "cloud-docs", "branches"])
            .unwrap();
        assert_eq!(url.path(), "/v1/api/repos/cloud-docs/branches");
    }

    #[test]
    fn test_rejects_invalid_base() {
        assert!(endpoint("not a url", &["api"]).is_err());
        assert!(endpoint("mailto:ops@example.com", &["api"]).is_err());
    }
}
