//! Client for the MAST CasJobs batch-SQL job service.
//!
//! CasJobs runs SQL against large astronomical catalogs on the server side:
//! short queries execute synchronously ("quick" jobs), long ones are
//! submitted, polled, and their results land in the user's scratch database
//! (MyDB) for retrieval. This crate speaks that protocol and materializes
//! result tables as [`polars`] DataFrames.
//!
//! [`MastCasJobs`] is the high-level entry point; [`CasJobsClient`] is the
//! deployment-agnostic protocol layer underneath it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use mast_casjobs::{MastCasJobs, PollConfig};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let jobs = MastCasJobs::builder()
//!     .username("astronaut")
//!     .password("hunter2")
//!     .context("PanSTARRS_DR2")
//!     .poll(PollConfig::every(Duration::from_secs(5)))
//!     .build()?;
//!
//! // Short query, synchronous result.
//! let df = jobs.quick("select top 10 objID from ObjectThin", None, "quickie")?;
//!
//! // Long query: submit, wait, fetch from MyDB.
//! let job_id = jobs.submit(
//!     "select objID, raMean into mydb.bright from ObjectThin where nDetections > 50",
//!     None,
//!     "bright_sources",
//! )?;
//! jobs.monitor(job_id)?;
//! let table = jobs.get_table("bright")?;
//! println!("{} rows", table.height());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod credentials;
pub mod error;
pub mod jobs;
pub mod mast;
pub mod prelude;
pub mod requests;
pub mod response;
pub mod table;

pub use client::{CasJobsClient, MYDB};
pub use credentials::Credentials;
pub use error::Error;
pub use jobs::{JobId, JobInfo, JobStatus, PollConfig};
pub use mast::{CONTEXTS, MAST_BASE_URL, MastCasJobs, MastCasJobsBuilder};
pub use requests::RequestType;
pub use table::TableData;
