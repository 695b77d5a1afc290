//! Import engine for rimport - the sequential upload loop.
//!
//! The engine owns no IO of its own: uploads go through a [`ResourceSink`] and
//! copy generation through a [`Copywriter`], both implemented for the HTTP
//! clients in `rimport-providers`. Progress is reported as [`ImportEvent`]s on
//! an unbounded channel so a caller can render while the loop runs.

mod import_log;
mod runner;

pub use import_log::{ImportLog, LogEntry, LogStatus};
pub use runner::{
    Copywriter, Enrichment, ImportEvent, ImportOptions, ImportReport, Importer, ResourceSink,
    RowOutcome, RowResult, TAG_LINE_FALLBACK_CHARS, TAG_LINE_TRUNCATE_CHARS,
};

pub use rimport_core;
pub use rimport_providers;
pub use rimport_types;
