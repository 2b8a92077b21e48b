use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::warn;

use kiln_core::error::KilnResult;

use super::{RemoteRepository, RepoLocation, TreeEntry, get_json};

const API_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeNode>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeNode {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// A GitHub repository read through the git trees API.
pub struct GitHubRepository {
    location: RepoLocation,
    http: Client,
    token: Option<String>,
}

impl GitHubRepository {
    pub(crate) fn new(location: RepoLocation, http: Client, token: Option<String>) -> Self {
        Self {
            location,
            http,
            token,
        }
    }

    fn tree_url(&self) -> String {
        format!(
            "{API_BASE}/repos/{}/{}/git/trees/{}?recursive=1",
            self.location.owner, self.location.name, self.location.branch
        )
    }
}

impl RemoteRepository for GitHubRepository {
    fn url(&self) -> String {
        format!(
            "https://github.com/{}/{}",
            self.location.owner, self.location.name
        )
    }

    fn name(&self) -> &str {
        &self.location.name
    }

    fn branch(&self) -> &str {
        &self.location.branch
    }

    fn file_path(&self) -> Option<&str> {
        self.location.file.as_deref()
    }

    fn list_tree_entries(&self) -> KilnResult<Vec<TreeEntry>> {
        let url = self.tree_url();
        let (response, _) = get_json::<TreeResponse>(&self.http, &url, self.token.as_deref())?;
        if response.truncated {
            warn!(%url, "GitHub truncated the tree listing; some entries are missing");
        }

        Ok(response
            .tree
            .into_iter()
            .filter(|node| node.kind == "tree" || node.kind == "blob")
            .map(|node| TreeEntry {
                is_dir: node.kind == "tree",
                path: node.path,
            })
            .collect())
    }

    fn raw_file_url(&self, path: &str) -> String {
        format!(
            "https://raw.githubusercontent.com/{}/{}/{}/{}",
            self.location.owner,
            self.location.name,
            self.location.branch,
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> GitHubRepository {
        GitHubRepository::new(
            RepoLocation {
                owner: "me".into(),
                name: "tool".into(),
                branch: "dev".into(),
                file: None,
            },
            Client::new(),
            None,
        )
    }

    #[test]
    fn urls() {
        let repo = repo();
        assert_eq!(repo.url(), "https://github.com/me/tool");
        assert_eq!(
            repo.tree_url(),
            "https://api.github.com/repos/me/tool/git/trees/dev?recursive=1"
        );
        assert_eq!(
            repo.raw_file_url("/docs/a.md"),
            "https://raw.githubusercontent.com/me/tool/dev/docs/a.md"
        );
    }

    #[test]
    fn tree_response_decodes() {
        let json = r#"{"sha":"abc","tree":[
            {"path":"src","type":"tree","mode":"040000"},
            {"path":"src/lib.rs","type":"blob","mode":"100644"},
            {"path":"vendor/sub","type":"commit","mode":"160000"}
        ],"truncated":false}"#;
        let response: TreeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.tree.len(), 3);
        assert_eq!(response.tree[0].kind, "tree");
    }
}
