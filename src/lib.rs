//! Cleaning, reconciliation and aggregation of feibra field-control exports.
//!
//! Uploads are read into [`types::RawTable`]s and routed by
//! [`loader::load_batch`]: regular control records are normalized into a
//! [`types::ControlTable`], SOLL/IST sheets go to [`reconcile`], monthly
//! sheets are kept per marker. Everything downstream works on copies of the
//! loaded batch.
pub mod aggregate;
pub mod branches;
pub mod columns;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod logging;
pub mod normalize;
pub mod output;
pub mod reconcile;
pub mod reports;
pub mod session;
pub mod tags;
pub mod types;
pub mod util;

pub use config::Config;
pub use error::{DashboardError, Result};
pub use loader::{load_batch, LoadedBatch, UploadedFile};
