//! Main crate error.

use std::time::Duration;

use crate::jobs::{JobId, JobStatus};

/// CasJobs client errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /* Configuration */
    /// No username or WSID given and none found in the environment.
    #[error("missing CasJobs user: pass a username or WSID, or set {0} / {1}")]
    MissingUser(&'static str, &'static str),
    /// No password given and none found in the environment.
    #[error("missing CasJobs password: pass it explicitly or set {0}")]
    MissingPassword(&'static str),
    /// The WSID lookup service rejected the username/password pair.
    #[error("incorrect CasJobs username or password")]
    WrongCredentials,

    /* Transport */
    /// HTTP transport failure.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    /// Non-success HTTP status from the service, with the fault text.
    #[error("CasJobs returned {status}: {message}")]
    Server {
        status: reqwest::StatusCode,
        message: String,
    },

    /* Protocol */
    /// Response XML that could not be read.
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    /// Response that parsed but did not carry what the protocol promises.
    #[error("malformed CasJobs response: {0}")]
    MalformedResponse(String),

    /* Jobs */
    /// A monitored job reached a terminal failure state.
    #[error("job {job_id} ended in {status} state")]
    JobFailed { job_id: JobId, status: JobStatus },
    /// A monitored job did not reach a terminal state in time.
    #[error("job {job_id} still not terminal after {waited:?}")]
    Timeout { job_id: JobId, waited: Duration },

    /* Tables */
    /// The named table does not exist in MyDB.
    #[error("table MyDB.{0} not found")]
    TableNotFound(String),
    /// DataFrame construction or (de)serialization failed.
    #[error(transparent)]
    Table(#[from] polars::error::PolarsError),

    /* Deployment */
    /// Operation not available on this CasJobs deployment.
    #[error("{0} is only available on the MAST CasJobs deployment")]
    Unsupported(&'static str),
}
