//! Staging path prefixes
//!
//! Where a build lands in the staging bucket and the URL it is served from.
//! Derived per job from the payload; never stored.

use crate::domain::payload::Payload;

/// User segment every staged URL is published under
pub const WORKER_USER: &str = "docsworker-xlarge";

/// Resolved staging location of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefix {
    pub prefix: String,
    pub hosted_at_url: String,
}

/// Computes the staging prefix and hosted URL of a build
///
/// The base prefix is the mutation prefix, falling back to the project. A
/// patch build whose mutation prefix *is* the project is namespaced by
/// `{newHead}/{patch}` so it cannot collide with the mainline build.
///
/// `base_url` and `bucket` must already be validated by the caller.
pub fn resolve_prefix(payload: &Payload, base_url: &str, _bucket: &str) -> PathPrefix {
    let base_url = base_url.trim_end_matches('/');
    let branch = &payload.branch_name;

    if let (Some(patch), Some(new_head), Some(mut_prefix)) =
        (payload.patch(), payload.new_head(), payload.mut_prefix())
    {
        if payload.project == mut_prefix {
            let prefix = format!("{}/{}/{}", new_head, patch, mut_prefix);
            let hosted_at_url = format!("{}/{}/{}/{}/", base_url, prefix, WORKER_USER, branch);
            return PathPrefix {
                prefix,
                hosted_at_url,
            };
        }
    }

    let prefix = base_prefix(payload).to_string();
    let hosted_at_url = format!("{}/{}/{}/{}/", base_url, prefix, WORKER_USER, branch);

    PathPrefix {
        prefix,
        hosted_at_url,
    }
}

/// Mutation prefix if present, else the project
pub fn base_prefix(payload: &Payload) -> &str {
    payload.mut_prefix().unwrap_or(&payload.project)
}
