//! Project-level collaborators: command discovery, code metrics, session store

pub mod discovery;
pub mod metrics;
pub mod session;

pub use discovery::{discover, ProjectCommands};
pub use metrics::{CodeMetrics, FileLines, LineCountMetrics, MetricsReport};
pub use session::{FileSessionStore, ProjectInfo, SessionStore};
