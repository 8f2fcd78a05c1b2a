//! Prefix resolution from the command line

use anyhow::Result;
use autobuilder_core::domain::payload::Payload;
use autobuilder_core::domain::prefix::resolve_prefix;
use clap::Args;
use colored::*;

#[derive(Args)]
pub struct PrefixArgs {
    #[arg(long)]
    project: String,

    /// Staging mutation prefix
    #[arg(long)]
    mut_prefix: Option<String>,

    #[arg(long, default_value = "master")]
    branch: String,

    #[arg(long)]
    patch: Option<String>,

    /// Commit the patch applies to
    #[arg(long)]
    new_head: Option<String>,

    #[arg(long)]
    base_url: String,
}

impl PrefixArgs {
    fn payload(&self) -> Payload {
        Payload {
            repo_name: self.project.clone(),
            project: self.project.clone(),
            directory: None,
            branch_name: self.branch.clone(),
            is_fork: false,
            repo_owner: String::new(),
            url: String::new(),
            mut_prefix: self.mut_prefix.clone(),
            patch: self.patch.clone(),
            new_head: self.new_head.clone(),
            job_type: String::new(),
            source: String::new(),
            action: String::new(),
            include_in_global_search: false,
        }
    }
}

pub fn print_prefix(args: &PrefixArgs) -> Result<()> {
    if args.base_url.trim().is_empty() {
        anyhow::bail!("--base-url cannot be empty");
    }

    let resolved = resolve_prefix(&args.payload(), &args.base_url, "");
    println!("  Prefix:    {}", resolved.prefix.cyan());
    println!("  Hosted at: {}", resolved.hosted_at_url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_build_args() {
        let args = PrefixArgs {
            project: "docs-qa/x".to_string(),
            mut_prefix: Some("docs-qa/x".to_string()),
            branch: "master".to_string(),
            patch: Some("p1".to_string()),
            new_head: Some("abc123".to_string()),
            base_url: "https://cdn".to_string(),
        };

        let resolved = resolve_prefix(&args.payload(), &args.base_url, "");
        assert_eq!(resolved.prefix, "abc123/p1/docs-qa/x");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let args = PrefixArgs {
            project: "cloud-docs".to_string(),
            mut_prefix: None,
            branch: "master".to_string(),
            patch: None,
            new_head: None,
            base_url: " ".to_string(),
        };
        assert!(print_prefix(&args).is_err());
    }
}
