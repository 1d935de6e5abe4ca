pub mod export_service;
pub mod progress_reporter;
pub mod restore_service;
pub mod restore_task_service;

pub use export_service::{ArchiveFile, ExportService};
pub use progress_reporter::{BroadcastProgressReporter, ProgressEvent, ProgressReporter};
pub use restore_service::RestoreService;
pub use restore_task_service::RestoreTaskService;
