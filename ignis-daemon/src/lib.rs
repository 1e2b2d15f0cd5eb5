//! Long-running side of ignis: supervises the local nginx process, watches
//! the model file, rotates logs on a schedule and answers control requests
//! over a Unix socket.

mod error;
pub mod logs;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod scheduler;
pub mod supervisor;

pub use error::{DaemonError, SupervisorError};
pub use logs::{rotate_logs, search, tail, Highlight, SearchLine};
pub use protocol::{request, request_status, send_request, DaemonRequest, DaemonResponse};
pub use runtime::{init_tracing, run, start_blocking, start_with_retry, ENV_LOG_FORMAT};
pub use supervisor::{ServerState, Supervisor};
