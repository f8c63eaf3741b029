//! GitLab repository API adapter.
//!
//! [`GitLabClient`] maps file operations onto the REST API through a
//! [`Transport`]: [`ReqwestTransport`] talks to a real server. With the
//! `testing` feature, `MemoryTransport` emulates one in memory.

pub mod client;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod transport;
pub mod types;
pub mod url;

pub use client::{newest_commit, GitLabClient, RemoteOptions, DEFAULT_PER_PAGE};
#[cfg(any(test, feature = "testing"))]
pub use memory::{MemoryTransport, RecordedRequest};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
pub use types::{CommitOptions, DiffKind, FileDiff, RemoteCommit, RemoteFile, TreeEntry};
pub use url::{decode_path, encode_path};
