//! # usnkit Core Library
//!
//! This crate decodes NTFS change journal records and provides cursors over
//! the journal, enumeration of the master file table, a path-resolving cache
//! and a live monitor. It is platform-agnostic: every privileged volume
//! operation goes through the [`JournalDevice`] trait, implemented for
//! Windows volumes in `usnkit-backend-ntfs`.
//!
//! ## Architecture
//!
//! - **Records** (`record`, `fileref`, `reason`, `attr`): Wire format codec and
//!   the flag types it carries
//! - **Device** (`device`, `handle`): The device trait, buffer growth and the
//!   reference-counted volume handle
//! - **Readers** (`enumerator`, `mft`, `cursor`): File table enumeration and
//!   journal cursors
//! - **Paths** (`filer`, `cache`): Parent chain walking over a record lookup
//! - **Monitor** (`monitor`): Background polling with fan-out to subscribers
//! - **Filters** (`filter`): Composable predicates and processors
//! - **Journal** (`journal`): One entry point per volume
//! - **Config** (`config`): Configuration management
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::{atomic::AtomicBool, Arc};
//! use usnkit_core::{Journal, Reason, RecordPipeline, SharedHandle};
//!
//! let journal = Journal::new(SharedHandle::new(device));
//! let cache = Arc::new(journal.cache(&AtomicBool::new(false), None, 0, i64::MAX)?);
//!
//! let pipeline = RecordPipeline::default().with_filer(cache);
//! let mut cursor = journal.cursor(Reason::ANY, pipeline)?;
//! let mut buf = Vec::new();
//! while let Some(batch) = cursor.next(&mut buf)? {
//!     for record in batch {
//!         println!("{} {}", record.reason, record.path);
//!     }
//! }
//! ```

pub mod attr;
pub mod cache;
pub mod config;
pub mod cursor;
pub mod device;
pub mod enumerator;
pub mod error;
pub mod filer;
pub mod fileref;
pub mod filter;
pub mod handle;
pub mod journal;
pub mod mft;
pub mod monitor;
pub mod reason;
pub mod record;
pub mod stats;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use attr::{AttributeFormat, FileAttributes, SourceInfo};
pub use cache::{Cache, Interrupted};
pub use config::Config;
pub use cursor::{Cursor, RecordPipeline, RecordSource};
pub use device::{BufferPolicy, EnumOptions, JournalData, JournalDevice, ReadOptions};
pub use enumerator::Enumerator;
pub use error::{DecodeError, DeviceError, LengthFault, Operation, Result, UsnError};
pub use filer::Filer;
pub use fileref::FileRef;
pub use filter::{Filter, Processor};
pub use handle::{Release, SharedHandle};
pub use journal::Journal;
pub use mft::Mft;
pub use monitor::{Monitor, Subscription};
pub use reason::{Reason, ReasonFormat};
pub use record::{Page, Record, Usn};
pub use stats::Stats;
