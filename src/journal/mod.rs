//! Change log and sync log.
//!
//! Both logs are bounded, line-oriented text files that only ever grow at the
//! tail. The change log is the source of truth for what happened locally since
//! the last boundary marker; the sync log is an audit trail of remote outcomes.

mod change_log;
mod event;
mod store;
mod sync_log;
mod types;

pub use change_log::ChangeLog;
pub use event::ChangeEvent;
pub use store::LineStore;
pub use sync_log::{message_of, SyncLog, FAIL_PREFIX};
pub use types::{ChangeAction, BOUNDARY_PHRASE};
