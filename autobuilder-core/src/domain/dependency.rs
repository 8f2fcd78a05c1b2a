//! Build dependencies
//!
//! Files a repository needs in its checkout before it can be parsed, such
//! as code examples hosted in other repositories. Listed per repository by
//! the metadata service.

use serde::{Deserialize, Serialize};

/// Files downloaded into one directory of the checkout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDependencies {
    /// Target directory relative to the project root; the root itself when `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

/// One file to download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub url: String,
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_groups() {
        let groups: Vec<BuildDependencies> = serde_json::from_str(
            r#"[
                {"dependencies": [{"url": "https://example.com/a.yaml", "filename": "a.yaml"}]},
                {"buildDir": "source/driver-examples", "dependencies": []}
            ]"#,
        )
        .unwrap();

        assert_eq!(groups[0].build_dir, None);
        assert_eq!(groups[0].dependencies[0].filename, "a.yaml");
        assert_eq!(groups[1].build_dir.as_deref(), Some("source/driver-examples"));
    }
}
