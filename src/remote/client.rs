use anyhow::{bail, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

use super::transport::{HttpRequest, HttpResponse, Method, Transport};
use super::types::{
    CommitOptions, FileDiff, RawBranch, RawTreeEntry, RemoteCommit, RemoteFile, TreeEntry,
};
use super::url::{encode_path, with_query};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::notify::Notifier;
use crate::settings::SyncSettings;
use crate::vault::Vault;

/// Page size used by every paginated listing
pub const DEFAULT_PER_PAGE: usize = 100;

/// How many commits `save_last_commit` looks at
const LATEST_COMMITS: usize = 3;

/// Hard stop for a listing that never returns an empty page
const MAX_PAGES: usize = 10_000;

/// Connection and authorship details for one repository
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteOptions {
    pub api: String,
    pub project: String,
    pub repository: String,
    pub branch: String,
    pub email: String,
    pub username: String,
    pub notifications: bool,
}

impl From<&SyncSettings> for RemoteOptions {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            api: settings.api_url.trim_end_matches('/').to_string(),
            project: settings.project_name.clone(),
            repository: settings.repo_name.clone(),
            branch: settings.branch.clone(),
            email: settings.email.clone(),
            username: settings.username.clone(),
            notifications: settings.notifications,
        }
    }
}

/// Maps file operations onto the GitLab repository REST API
pub struct GitLabClient {
    options: RemoteOptions,
    transport: Arc<dyn Transport>,
    vault: Arc<dyn Vault>,
    notifier: Arc<dyn Notifier>,
}

impl GitLabClient {
    pub fn new(
        options: RemoteOptions,
        transport: Arc<dyn Transport>,
        vault: Arc<dyn Vault>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            options,
            transport,
            vault,
            notifier,
        }
    }

    pub fn options(&self) -> &RemoteOptions {
        &self.options
    }

    fn project_id(&self) -> String {
        encode_path(&format!("{}/{}", self.options.project, self.options.repository))
    }

    fn repository_url(&self, suffix: &str) -> String {
        format!(
            "{}/projects/{}/repository/{}",
            self.options.api,
            self.project_id(),
            suffix
        )
    }

    fn file_url(&self, path: &str, branch: &str) -> Result<String> {
        let base = self.repository_url(&format!("files/{}", encode_path(path)));
        Ok(with_query(&base, &[("ref", branch.to_string())])?.into())
    }

    fn notify(&self, message: &str) {
        if self.options.notifications {
            self.notifier.notify(message);
        }
    }

    fn send(&self, method: Method, url: String, body: Option<Value>) -> Result<HttpResponse> {
        log::debug!("{method} {url}");
        self.transport.send(&HttpRequest { method, url, body })
    }

    fn send_checked(&self, method: Method, url: String, body: Option<Value>) -> Result<HttpResponse> {
        let shown = url.clone();
        let response = self.send(method, url, body)?;
        if !response.is_success() {
            let mut detail = response.body.clone();
            detail.truncate(200);
            bail!("{method} {shown} returned {}: {detail}", response.status);
        }
        Ok(response)
    }

    fn local_file_base64(&self, path: &str) -> Result<String> {
        Ok(STANDARD.encode(self.vault.read(path)?))
    }

    fn commit_body(&self, opts: &CommitOptions, default_message: &str) -> (String, Value) {
        let branch = opts
            .branch
            .clone()
            .unwrap_or_else(|| self.options.branch.clone());
        let body = json!({
            "branch": branch,
            "author_email": opts.author_email.as_deref().unwrap_or(&self.options.email),
            "author_name": opts.author_name.as_deref().unwrap_or(&self.options.username),
            "commit_message": opts.commit_message.as_deref().unwrap_or(default_message),
        });
        (branch, body)
    }

    fn write_file(
        &self,
        method: Method,
        path: &str,
        opts: &CommitOptions,
        default_message: &str,
    ) -> Result<()> {
        let content = self.local_file_base64(path)?;
        let (branch, mut body) = self.commit_body(opts, default_message);
        body["encoding"] = json!("base64");
        body["content"] = json!(content);

        let url = self.file_url(path, &branch)?;
        self.send_checked(method, url, Some(body))?;
        Ok(())
    }

    /// Create `path` remotely with the local content
    ///
    /// With `fallback`, a failed create is retried once as a modify (the file
    /// probably exists already).
    pub fn create(&self, path: &str, opts: &CommitOptions, fallback: bool) -> Result<()> {
        match self.write_file(Method::Post, path, opts, "created file") {
            Ok(()) => Ok(()),
            Err(e) if fallback => {
                log::info!("Create of {path} failed, trying update: {e:#}");
                self.notify("Cannot create file\nTrying update file");
                self.modify(path, opts, false).inspect_err(|_| {
                    self.notify("Cannot update file");
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Overwrite `path` remotely with the local content
    ///
    /// With `fallback`, a failed modify is retried once as a create (the file
    /// probably does not exist remotely).
    pub fn modify(&self, path: &str, opts: &CommitOptions, fallback: bool) -> Result<()> {
        match self.write_file(Method::Put, path, opts, "modified file") {
            Ok(()) => Ok(()),
            Err(e) if fallback => {
                log::info!("Update of {path} failed, trying create: {e:#}");
                self.notify("Cannot update file\nTrying create file");
                self.create(path, opts, false).inspect_err(|_| {
                    self.notify("Cannot create file");
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Delete `path` remotely; no fallback
    pub fn delete(&self, path: &str, opts: &CommitOptions) -> Result<()> {
        let (branch, body) = self.commit_body(opts, "deleted file");
        let url = self.file_url(path, &branch)?;
        self.send_checked(Method::Delete, url, Some(body))
            .map(|_| ())
            .inspect_err(|_| self.notify("Cannot delete file"))
    }

    /// Fetch a remote file; `None` when it is absent or the request fails
    pub fn read(&self, path: &str, branch: Option<&str>) -> Option<RemoteFile> {
        let branch = branch.unwrap_or(&self.options.branch);
        let url = match self.file_url(path, branch) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Cannot build URL for {path}: {e:#}");
                return None;
            }
        };

        match self.send(Method::Get, url, None) {
            Ok(response) if response.status == 404 => {
                log::debug!("{path} does not exist on {branch}");
                None
            }
            Ok(response) if response.is_success() => match response.json::<RemoteFile>() {
                Ok(file) => Some(file),
                Err(e) => {
                    log::warn!("Unexpected payload for {path}: {e:#}");
                    None
                }
            },
            Ok(response) => {
                log::warn!("Reading {path} returned {}", response.status);
                self.notify("Cannot read file");
                None
            }
            Err(e) => {
                log::warn!("Reading {path} failed: {e:#}");
                self.notify("Cannot read file");
                None
            }
        }
    }

    /// Walk a paginated listing starting at `start_page`
    ///
    /// A page is final only when it holds zero items, so a short page is
    /// always followed by one more request. Returns the number of requests made.
    pub fn paginate<T, F>(
        &self,
        start_page: usize,
        base: &str,
        params: &[(&str, String)],
        per_page: usize,
        mut on_page: F,
    ) -> Result<usize>
    where
        T: DeserializeOwned,
        F: FnMut(Vec<T>) -> Result<()>,
    {
        let mut page = start_page;
        let mut requests = 0;

        loop {
            let mut query = params.to_vec();
            query.push(("per_page", per_page.to_string()));
            query.push(("page", page.to_string()));

            let url = with_query(base, &query)?;
            let response = self.send_checked(Method::Get, url.into(), None)?;
            requests += 1;

            let items: Vec<T> = response.json()?;
            if items.is_empty() {
                return Ok(requests);
            }
            on_page(items)?;

            if requests >= MAX_PAGES {
                bail!("Listing {base} did not end after {MAX_PAGES} pages");
            }
            page += 1;
        }
    }

    fn collect_pages<T: DeserializeOwned>(
        &self,
        base: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut all = Vec::new();
        self.paginate(1, base, params, DEFAULT_PER_PAGE, |page: Vec<T>| {
            all.extend(page);
            Ok(())
        })?;
        Ok(all)
    }

    /// Recursive tree listing below `path` ("" for the whole repository)
    pub fn read_repo_tree(&self, path: &str, notify: bool) -> Result<Vec<TreeEntry>> {
        let mut params = Vec::new();
        let path = path.trim_matches('/');
        if !path.is_empty() {
            params.push(("path", path.to_string()));
        }
        params.push(("ref", self.options.branch.clone()));
        params.push(("recursive", "true".to_string()));

        let raw: Vec<RawTreeEntry> = self.collect_pages(&self.repository_url("tree"), &params)?;
        let tree: Vec<TreeEntry> = raw.into_iter().map(TreeEntry::from).collect();

        if notify {
            for entry in tree.iter().filter(|e| e.is_dir) {
                self.notify(&format!("Fetching: \"{}\"", entry.path));
            }
        }
        Ok(tree)
    }

    /// Commits on the branch since the checkpoint's commit date
    pub fn get_commits(&self, checkpoint: &Checkpoint) -> Result<Vec<RemoteCommit>> {
        let since = checkpoint
            .last_commit_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| Utc::now().to_rfc3339());

        let params = [
            ("with_stats", "true".to_string()),
            ("all", "true".to_string()),
            ("ref_name", self.options.branch.clone()),
            ("since", since),
        ];
        self.collect_pages(&self.repository_url("commits"), &params)
    }

    /// The few most recent commits on the branch, unfiltered
    pub fn latest_commits(&self) -> Result<Vec<RemoteCommit>> {
        let url = with_query(
            &self.repository_url("commits"),
            &[
                ("with_stats", "true".to_string()),
                ("ref_name", self.options.branch.clone()),
                ("per_page", LATEST_COMMITS.to_string()),
                ("page", "1".to_string()),
            ],
        )?;
        self.send_checked(Method::Get, url.into(), None)?.json()
    }

    /// Persist the newest remote commit as the checkpoint
    pub fn save_last_commit(&self, store: &CheckpointStore) -> Result<Option<RemoteCommit>> {
        let commits = self.latest_commits()?;
        let Some(newest) = newest_commit(&commits) else {
            log::debug!("Remote branch {} has no commits", self.options.branch);
            return Ok(None);
        };

        if store.advance(&newest.id, newest.committed_date)? {
            log::info!("Checkpoint advanced to {}", newest.id);
        }
        Ok(Some(newest.clone()))
    }

    /// Changed files of one commit
    pub fn get_diffs(&self, commit_id: &str) -> Result<Vec<FileDiff>> {
        self.collect_pages(&self.repository_url(&format!("commits/{commit_id}/diff")), &[])
    }

    /// Names of every branch
    pub fn get_branches(&self) -> Result<Vec<String>> {
        let raw: Vec<RawBranch> = self.collect_pages(&self.repository_url("branches"), &[])?;
        Ok(raw.into_iter().map(|b| b.name).collect())
    }

    /// Create `branch` from `parent`
    pub fn create_branch(&self, branch: &str, parent: &str) -> Result<()> {
        let url = with_query(
            &self.repository_url("branches"),
            &[("branch", branch.to_string()), ("ref", parent.to_string())],
        )?;
        self.send_checked(Method::Post, url.into(), None)
            .map(|_| ())
            .inspect_err(|_| self.notify("Error while creating branch"))
    }

    /// Copy a remote file to `local_path` (defaults to the same path)
    ///
    /// When the remote file is missing and `create_if_missing` is set, the
    /// local file is uploaded instead. Returns whether anything was written locally.
    pub fn save_local_file(
        &self,
        remote_path: &str,
        local_path: Option<&str>,
        create_if_missing: bool,
    ) -> Result<bool> {
        let local_path = local_path.unwrap_or(remote_path);
        match self.read(remote_path, None) {
            Some(file) => {
                self.vault.write(local_path, &file.bytes()?)?;
                Ok(true)
            }
            None if create_if_missing => {
                self.create(remote_path, &CommitOptions::default(), true)?;
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

/// Newest commit by `committed_date`; the earliest listed wins ties
pub fn newest_commit(commits: &[RemoteCommit]) -> Option<&RemoteCommit> {
    commits.iter().fold(None, |best, commit| match best {
        Some(b) if b.committed_date >= commit.committed_date => Some(b),
        _ => Some(commit),
    })
}
