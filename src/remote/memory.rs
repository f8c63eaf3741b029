//! In-memory stand-in for the GitLab repository API.
//!
//! Implements just enough of the files, tree, commits, diff and branches
//! endpoints for the adapter to run end to end without a network.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use reqwest::Url;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::transport::{HttpRequest, HttpResponse, Method, Transport};
use super::types::{FileDiff, RemoteCommit};
use super::url::decode_path;

const EPOCH: &str = "2024-01-01T00:00:00+00:00";
const EPOCH_SECS: i64 = 1_704_067_200;

/// A request as the emulated server saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Path below `/repository/`, with the file path decoded
    pub route: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Decoded `content` of a file write
    pub fn content(&self) -> Option<Vec<u8>> {
        let encoded = self.body.as_ref()?.get("content")?.as_str()?;
        STANDARD.decode(encoded).ok()
    }
}

struct StoredCommit {
    commit: RemoteCommit,
    diffs: Vec<FileDiff>,
}

struct Repo {
    files: BTreeMap<String, Vec<u8>>,
    commits: Vec<StoredCommit>,
    branches: Vec<String>,
    requests: Vec<RecordedRequest>,
    failures: HashSet<(Method, String)>,
    next_id: usize,
}

#[derive(Serialize)]
struct TreeItem<'a> {
    id: String,
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    path: &'a str,
}

/// Thread-safe in-memory repository
pub struct MemoryTransport {
    repo: Mutex<Repo>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Empty repository with a single `master` branch
    pub fn new() -> Self {
        Self {
            repo: Mutex::new(Repo {
                files: BTreeMap::new(),
                commits: Vec::new(),
                branches: vec!["master".to_string()],
                requests: Vec::new(),
                failures: HashSet::new(),
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Repo> {
        self.repo.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Place a file without creating a commit
    pub fn seed_file(&self, path: &str, content: &[u8]) {
        self.lock().files.insert(path.to_string(), content.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// Record a commit with the given diffs; files are not touched
    pub fn push_commit(&self, id: &str, date: DateTime<FixedOffset>, diffs: Vec<FileDiff>) {
        let commit = RemoteCommit {
            id: id.to_string(),
            short_id: id.chars().take(8).collect(),
            title: format!("commit {id}"),
            author_name: "memory".to_string(),
            committed_date: date,
        };
        self.lock().commits.push(StoredCommit { commit, diffs });
    }

    pub fn commits(&self) -> Vec<RemoteCommit> {
        self.lock().commits.iter().map(|c| c.commit.clone()).collect()
    }

    /// Make every `method` request to `route` answer 500
    pub fn fail(&self, method: Method, route: &str) {
        self.lock().failures.insert((method, route.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }
}

impl Transport for MemoryTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = Url::parse(&request.url).with_context(|| format!("Invalid URL: {}", request.url))?;
        let path = url.path();
        let raw_route = path
            .split_once("/repository/")
            .map(|(_, rest)| rest)
            .unwrap_or(path);
        let route = match raw_route.strip_prefix("files/") {
            Some(file) => format!("files/{}", decode_path(file)),
            None => raw_route.to_string(),
        };
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        let recorded = RecordedRequest {
            method: request.method,
            route,
            query,
            body: request.body.clone(),
        };

        let mut repo = self.lock();
        repo.requests.push(recorded.clone());
        if repo.failures.contains(&(recorded.method, recorded.route.clone())) {
            return Ok(respond(500, json!({"message": "500 Internal Server Error"})));
        }
        Ok(repo.handle(&recorded))
    }
}

fn respond(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        body: body.to_string(),
    }
}

fn page_of<T: Serialize>(items: &[T], request: &RecordedRequest) -> HttpResponse {
    let per_page = request
        .param("per_page")
        .and_then(|v| v.parse().ok())
        .unwrap_or(20usize)
        .max(1);
    let page = request
        .param("page")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1usize)
        .max(1);
    let start = (page - 1) * per_page;
    let slice = if start >= items.len() {
        &[][..]
    } else {
        &items[start..items.len().min(start + per_page)]
    };
    respond(200, json!(slice))
}

impl Repo {
    fn handle(&mut self, request: &RecordedRequest) -> HttpResponse {
        if let Some(path) = request.route.strip_prefix("files/") {
            return self.handle_file(request, path);
        }
        match (request.method, request.route.as_str()) {
            (Method::Get, "tree") => self.tree(request),
            (Method::Get, "commits") => self.list_commits(request),
            (Method::Get, "branches") => page_of(&self.branch_items(), request),
            (Method::Post, "branches") => self.create_branch(request),
            (Method::Get, route) => match route
                .strip_prefix("commits/")
                .and_then(|rest| rest.strip_suffix("/diff"))
            {
                Some(id) => self.diff(request, id),
                None => not_found(),
            },
            _ => not_found(),
        }
    }

    fn handle_file(&mut self, request: &RecordedRequest, path: &str) -> HttpResponse {
        let exists = self.files.contains_key(path);
        match request.method {
            Method::Get if exists => {
                let content = &self.files[path];
                let last = self.commits.last().map(|c| c.commit.id.clone());
                respond(
                    200,
                    json!({
                        "file_path": path,
                        "encoding": "base64",
                        "content": STANDARD.encode(content),
                        "last_commit_id": last,
                    }),
                )
            }
            Method::Get => respond(404, json!({"message": "404 File Not Found"})),
            Method::Post if exists => respond(400, json!({"message": "A file with this name already exists"})),
            Method::Put | Method::Delete if !exists => {
                respond(400, json!({"message": "A file with this name doesn't exist"}))
            }
            Method::Post | Method::Put => {
                let Some(content) = request.content() else {
                    return respond(400, json!({"message": "content is missing"}));
                };
                self.files.insert(path.to_string(), content);
                self.commit(FileDiff {
                    old_path: path.to_string(),
                    new_path: path.to_string(),
                    new_file: request.method == Method::Post,
                    renamed_file: false,
                    deleted_file: false,
                });
                let status = if request.method == Method::Post { 201 } else { 200 };
                respond(status, json!({"file_path": path, "branch": request.param("ref")}))
            }
            Method::Delete => {
                self.files.remove(path);
                self.commit(FileDiff {
                    old_path: path.to_string(),
                    new_path: path.to_string(),
                    new_file: false,
                    renamed_file: false,
                    deleted_file: true,
                });
                HttpResponse {
                    status: 204,
                    body: String::new(),
                }
            }
        }
    }

    fn commit(&mut self, diff: FileDiff) {
        let date = match self.commits.iter().map(|c| c.commit.committed_date).max() {
            Some(latest) => latest + Duration::minutes(1),
            None => DateTime::<Utc>::from_timestamp(EPOCH_SECS, 0)
                .unwrap_or_default()
                .fixed_offset(),
        };
        let id = format!("{:040x}", self.next_id);
        self.next_id += 1;
        self.commits.push(StoredCommit {
            commit: RemoteCommit {
                short_id: id[..8].to_string(),
                title: format!("update {}", diff.new_path),
                author_name: "memory".to_string(),
                committed_date: date,
                id,
            },
            diffs: vec![diff],
        });
    }

    fn list_commits(&self, request: &RecordedRequest) -> HttpResponse {
        let since = request
            .param("since")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
        let mut listed: Vec<&RemoteCommit> = self
            .commits
            .iter()
            .rev()
            .map(|c| &c.commit)
            .filter(|c| since.map_or(true, |s| c.committed_date >= s))
            .collect();
        listed.sort_by(|a, b| b.committed_date.cmp(&a.committed_date));
        page_of(&listed, request)
    }

    fn diff(&self, request: &RecordedRequest, id: &str) -> HttpResponse {
        match self.commits.iter().find(|c| c.commit.id == id) {
            Some(stored) => page_of(&stored.diffs, request),
            None => not_found(),
        }
    }

    fn tree(&self, request: &RecordedRequest) -> HttpResponse {
        let prefix = request.param("path").unwrap_or("").trim_matches('/');
        let under = |p: &str| prefix.is_empty() || p.starts_with(&format!("{prefix}/"));

        let mut dirs = BTreeSet::new();
        let mut files = Vec::new();
        for path in self.files.keys().filter(|p| under(p)) {
            files.push(path.as_str());
            let mut ancestor = path.as_str();
            while let Some((parent, _)) = ancestor.rsplit_once('/') {
                if under(parent) && parent != prefix {
                    dirs.insert(parent);
                }
                ancestor = parent;
            }
        }
        if !prefix.is_empty() && files.is_empty() {
            return respond(404, json!({"message": "404 Tree Not Found"}));
        }

        let items: Vec<TreeItem> = dirs
            .iter()
            .map(|p| (*p, "tree"))
            .chain(files.iter().map(|p| (*p, "blob")))
            .enumerate()
            .map(|(i, (path, kind))| TreeItem {
                id: format!("{i:040x}"),
                name: path.rsplit('/').next().unwrap_or(path),
                kind,
                path,
            })
            .collect();
        page_of(&items, request)
    }

    fn branch_items(&self) -> Vec<Value> {
        self.branches.iter().map(|b| json!({"name": b})).collect()
    }

    fn create_branch(&mut self, request: &RecordedRequest) -> HttpResponse {
        let (Some(branch), Some(parent)) = (request.param("branch"), request.param("ref")) else {
            return respond(400, json!({"message": "branch and ref are required"}));
        };
        if self.branches.iter().any(|b| b == branch) {
            return respond(400, json!({"message": "Branch already exists"}));
        }
        if !self.branches.iter().any(|b| b == parent) {
            return respond(400, json!({"message": "Invalid reference name"}));
        }
        self.branches.push(branch.to_string());
        respond(201, json!({"name": branch}))
    }
}

fn not_found() -> HttpResponse {
    respond(404, json!({"message": "404 Not Found"}))
}
