use reqwest::blocking::Client;
use serde::Deserialize;
use url::Url;

use kiln_core::error::{KilnError, KilnResult};

use super::{RemoteRepository, RepoLocation, TreeEntry, get_json};

const API_BASE: &str = "https://gitlab.com/api/v4/projects";
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct TreeNode {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// A gitlab.com project read through the paginated repository tree API.
pub struct GitLabRepository {
    location: RepoLocation,
    http: Client,
    token: Option<String>,
}

impl GitLabRepository {
    pub(crate) fn new(location: RepoLocation, http: Client, token: Option<String>) -> Self {
        Self {
            location,
            http,
            token,
        }
    }

    fn tree_url(&self, page: u32) -> KilnResult<Url> {
        let mut url = Url::parse(API_BASE).map_err(|e| KilnError::Internal {
            message: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|_| KilnError::Internal {
                message: format!("{API_BASE} cannot be a base URL"),
            })?
            .push(&format!("{}/{}", self.location.owner, self.location.name))
            .extend(["repository", "tree"]);
        url.query_pairs_mut()
            .append_pair("ref", &self.location.branch)
            .append_pair("recursive", "true")
            .append_pair("per_page", &PAGE_SIZE.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }
}

impl RemoteRepository for GitLabRepository {
    fn url(&self) -> String {
        format!(
            "https://gitlab.com/{}/{}",
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
        let mut entries = Vec::new();
        let mut page = 1;
        loop {
            let url = self.tree_url(page)?;
            let (nodes, headers) =
                get_json::<Vec<TreeNode>>(&self.http, url.as_str(), self.token.as_deref())?;
            entries.extend(
                nodes
                    .into_iter()
                    .filter(|node| node.kind == "tree" || node.kind == "blob")
                    .map(|node| TreeEntry {
                        is_dir: node.kind == "tree",
                        path: node.path,
                    }),
            );

            let next = headers
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok());
            match next {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        Ok(entries)
    }

    fn raw_file_url(&self, path: &str) -> String {
        format!(
            "https://gitlab.com/{}/{}/-/raw/{}/{}",
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

    #[test]
    fn tree_url_encodes_project_path() {
        let repo = GitLabRepository::new(
            RepoLocation {
                owner: "inkscape".into(),
                name: "inkscape".into(),
                branch: "master".into(),
                file: None,
            },
            Client::new(),
            None,
        );
        assert_eq!(
            repo.tree_url(2).unwrap().as_str(),
            "https://gitlab.com/api/v4/projects/inkscape%2Finkscape/repository/tree\
             ?ref=master&recursive=true&per_page=100&page=2"
        );
        assert_eq!(repo.url(), "https://gitlab.com/inkscape/inkscape");
    }
}
