//! # strata-import
//!
//! The bulk import pipeline.
//!
//! A submitted file is hashed and checked against earlier imports, recorded as
//! a PENDING [`ImportOperation`](strata_core::entities::ImportOperation), and then
//! imported in the background by a two-step saga:
//!
//! 1. upload the raw file to object storage (rolled back by deleting it);
//! 2. parse the file on the job queue, record IN_PROGRESS, then open an
//!    IMMEDIATE transaction and merge the records into their version chains
//!    (committed together with the SUCCESS status, or rolled back and marked
//!    FAILED).
//!
//! Every status change is broadcast through the [`ProgressNotifier`].

pub mod error;
pub mod jobs;
pub mod notifier;
pub mod parser;
pub mod saga;
pub mod service;
pub mod steps;

pub use error::{ImportError, JobError, ParseError, UserError};
pub use notifier::ProgressNotifier;
pub use parser::FileFormat;
pub use service::{ImportService, ImportTicket};
