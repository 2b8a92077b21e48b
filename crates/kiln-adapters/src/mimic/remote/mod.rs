//! Remote repositories (GitHub, GitLab) as mimic and import sources.
//!
//! Accepted sources:
//!
//! ```text
//! https://github.com/owner/repo                       default branch "master"
//! https://github.com/owner/repo/tree/dev              branch "dev"
//! https://github.com/owner/repo/blob/dev/pkgs/py.toml branch "dev", file "pkgs/py.toml"
//! https://gitlab.com/owner/repo/-/tree/dev
//! gh:owner/repo@dev
//! gl:owner/repo
//! ```

mod github;
mod gitlab;

use std::time::Duration;

use regex::Regex;
use reqwest::{StatusCode, blocking::Client};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use kiln_core::{
    application::ApplicationError,
    domain::Package,
    error::{KilnError, KilnResult},
};

use super::{MimicOptions, build_package};
use crate::portability::{self, FileFormat};

pub use github::GitHubRepository;
pub use gitlab::GitLabRepository;

/// Used when the source names no branch.
pub const DEFAULT_BRANCH: &str = "master";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One node of a repository tree, relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub is_dir: bool,
}

/// A repository at a fixed branch.
pub trait RemoteRepository: Send + Sync {
    /// Web URL of the repository, recorded as a package's upstream.
    fn url(&self) -> String;

    fn name(&self) -> &str;

    fn branch(&self) -> &str;

    /// File named by a `/blob/<branch>/<path>` source, if any.
    fn file_path(&self) -> Option<&str>;

    /// Every directory and file in the tree, recursively.
    fn list_tree_entries(&self) -> KilnResult<Vec<TreeEntry>>;

    /// Direct download URL of a file in the tree.
    fn raw_file_url(&self, path: &str) -> String;
}

/// Access tokens for private repositories and higher rate limits.
#[derive(Debug, Clone, Default)]
pub struct RemoteTokens {
    pub github: Option<String>,
    pub gitlab: Option<String>,
}

/// Owner, repository, branch and optional file parsed from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RepoLocation {
    pub owner: String,
    pub name: String,
    pub branch: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Host {
    GitHub,
    GitLab,
}

/// Blocking HTTP client shared by all repositories it resolves.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: Client,
    tokens: RemoteTokens,
}

pub(crate) fn remote_error(url: &str, reason: impl std::fmt::Display) -> KilnError {
    ApplicationError::Remote {
        url: url.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

impl RemoteClient {
    pub fn new(tokens: RemoteTokens) -> KilnResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("kiln/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| KilnError::Internal {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, tokens })
    }

    /// Parse a source into a repository handle. Does not touch the network.
    pub fn resolve(&self, source: &str) -> KilnResult<Box<dyn RemoteRepository>> {
        let (host, location) = parse_source(source)?;
        debug!(?host, owner = %location.owner, repo = %location.name, branch = %location.branch, "Resolved remote");
        Ok(match host {
            Host::GitHub => Box::new(GitHubRepository::new(
                location,
                self.http.clone(),
                self.tokens.github.clone(),
            )),
            Host::GitLab => Box::new(GitLabRepository::new(
                location,
                self.http.clone(),
                self.tokens.gitlab.clone(),
            )),
        })
    }

    /// Download a package file named by a `/blob/` source and parse it.
    #[instrument(skip(self))]
    pub fn fetch_package(&self, source: &str) -> KilnResult<Package> {
        let repo = self.resolve(source)?;
        let file = repo
            .file_path()
            .ok_or_else(|| remote_error(source, "the URL does not name a file"))?;
        let format = FileFormat::from_path(std::path::Path::new(file))
            .ok_or_else(|| remote_error(source, "package files must end in .toml or .json"))?;

        let url = repo.raw_file_url(file);
        let text = self
            .http
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| remote_error(&url, e))?;

        let mut package = portability::from_str(&text, format)?;
        if package.upstream_url.is_none() {
            package.upstream_url = Some(repo.url());
        }
        Ok(package)
    }
}

/// Mimic a remote repository. Entries are sorted by path.
#[instrument(skip_all, fields(repo = %repo.name(), branch = %repo.branch()))]
pub fn mimic_repository(repo: &dyn RemoteRepository, options: &MimicOptions) -> KilnResult<Package> {
    let mut entries = repo.list_tree_entries()?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(count = entries.len(), "Remote tree listed");

    build_package(
        repo.name(),
        Some(repo.url()),
        entries.into_iter().map(|e| (e.path, e.is_dir)),
        options,
    )
}

fn parse_source(source: &str) -> KilnResult<(Host, RepoLocation)> {
    if let Some(rest) = source.strip_prefix("gh:") {
        return Ok((Host::GitHub, parse_shorthand(source, rest)?));
    }
    if let Some(rest) = source.strip_prefix("gl:") {
        return Ok((Host::GitLab, parse_shorthand(source, rest)?));
    }

    let url = Url::parse(source).map_err(|e| remote_error(source, e))?;
    let host = match url.host_str() {
        Some("github.com" | "www.github.com") => Host::GitHub,
        Some("gitlab.com" | "www.gitlab.com") => Host::GitLab,
        Some(other) => return Err(remote_error(source, format!("unsupported host '{other}'"))),
        None => return Err(remote_error(source, "URL has no host")),
    };
    Ok((host, parse_url_path(source, url.path())?))
}

/// `owner/repo[@branch]`
fn parse_shorthand(source: &str, rest: &str) -> KilnResult<RepoLocation> {
    let (repo, branch) = match rest.split_once('@') {
        Some((repo, branch)) if !branch.is_empty() => (repo, branch.to_string()),
        Some(_) => return Err(remote_error(source, "empty branch name")),
        None => (rest, DEFAULT_BRANCH.to_string()),
    };
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(RepoLocation {
                owner: owner.to_string(),
                name: name.to_string(),
                branch,
                file: None,
            })
        }
        _ => Err(remote_error(source, "expected owner/repository")),
    }
}

fn parse_url_path(source: &str, path: &str) -> KilnResult<RepoLocation> {
    let pattern =
        Regex::new(r"^/([^/]+)/([^/]+?)(?:\.git)?(?:/-)?(?:/(?:tree|blob)/([^/]+)(?:/(.+))?)?/?$")
            .map_err(|e| KilnError::Internal {
                message: e.to_string(),
            })?;
    let caps = pattern
        .captures(path)
        .ok_or_else(|| remote_error(source, "could not find owner and repository in the URL"))?;

    let owner = caps.get(1).map_or("", |m| m.as_str());
    let name = caps.get(2).map_or("", |m| m.as_str());
    let branch = caps
        .get(3)
        .map_or(DEFAULT_BRANCH, |m| m.as_str())
        .to_string();
    let file = caps
        .get(4)
        .map(|m| m.as_str().trim_end_matches('/').to_string())
        .filter(|f| !f.is_empty());

    Ok(RepoLocation {
        owner: owner.to_string(),
        name: name.to_string(),
        branch,
        file,
    })
}

/// GET `url` and decode JSON, mapping HTTP failures to `Remote` errors.
pub(crate) fn get_json<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    token: Option<&str>,
) -> KilnResult<(T, reqwest::header::HeaderMap)> {
    let mut request = http.get(url);
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {token}"));
    }
    let response = request.send().map_err(|e| remote_error(url, e))?;

    match response.status() {
        StatusCode::NOT_FOUND => {
            return Err(remote_error(url, "repository or branch not found"));
        }
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            warn!(url, "Remote refused the request");
            return Err(remote_error(
                url,
                "access denied or rate limit exceeded; configure an access token",
            ));
        }
        status if !status.is_success() => {
            return Err(remote_error(url, format!("server returned {status}")));
        }
        _ => {}
    }

    let headers = response.headers().clone();
    let body = response.json::<T>().map_err(|e| remote_error(url, e))?;
    Ok((body, headers))
}
