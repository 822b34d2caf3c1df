//! High-level MAST CasJobs client.
//!
//! Wraps the generic protocol client with MAST deployment defaults, typed
//! DataFrame results, and the table conveniences: the MAST-only fast
//! retrieval path, the portable extract-job fallback, listing, idempotent
//! drop, and upload.

use std::time::{Duration, Instant};

use polars::prelude::DataFrame;
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::client::{CasJobsClient, MYDB};
use crate::credentials::Credentials;
use crate::jobs::{JobId, JobInfo, JobStatus, PollConfig};
use crate::prelude::*;
use crate::requests::{ApiClient, RequestType};
use crate::table::{self, TableData};

/// Default service root: the MAST PS1 CasJobs deployment.
pub const MAST_BASE_URL: &str = "http://mastweb.stsci.edu/ps1casjobs/services/jobs.asmx";
const MAST_WSID_URL: &str = "https://mastweb.stsci.edu/ps1casjobs/casusers.asmx/GetWebServiceId";
const MAST_FAST_URL: &str = "https://ps1images.stsci.edu/cgi-bin/quick_casjobs.cgi";

/// Common MAST database contexts.
pub const CONTEXTS: &[&str] = &[
    "GAIA_DR1",
    "GALEX_Catalogs",
    "GALEX_GR6Plus7",
    "GALEX_UV_BKGD",
    "HLSP_47Tuc",
    "HSLP_GSWLC",
    "HSCv3",
    "HSCv2",
    "HSCv1",
    "Kepler",
    "PanSTARRS_DR1",
    "PanSTARRS_DR2",
    "PHATv2",
    "SDSS_DR12",
];

/// Client for the MAST CasJobs services.
///
/// Build with [`MastCasJobs::builder`]; credentials resolve from explicit
/// values or the `CASJOBS_USERID` / `CASJOBS_PW` environment variables.
///
/// # Examples
///
/// ```rust,no_run
/// use mast_casjobs::MastCasJobs;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let jobs = MastCasJobs::builder().context("PanSTARRS_DR2").build()?;
/// let df = jobs.quick(
///     "select top 10 objID, raMean, decMean from ObjectThin",
///     None,
///     "quickie",
/// )?;
/// println!("{df}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MastCasJobs {
    client: CasJobsClient,
    fast_url: Option<String>,
    poll: PollConfig,
}

impl MastCasJobs {
    /// Create a builder with MAST defaults.
    pub fn builder() -> MastCasJobsBuilder {
        MastCasJobsBuilder::new()
    }

    /// The underlying protocol client.
    pub fn client(&self) -> &CasJobsClient {
        &self.client
    }

    /// Run a quick job and materialize the result.
    ///
    /// `context` of `None` uses the client default. Fails with
    /// [`Error::Server`] if the query exceeds the service's synchronous
    /// time budget.
    pub fn quick(
        &self,
        query: &str,
        context: Option<&str>,
        task_name: &str,
    ) -> Result<DataFrame> {
        table::quick_frame(&self.quick_raw(query, context, task_name)?)
    }

    /// Run a quick job and return the raw CSV payload.
    pub fn quick_raw(
        &self,
        query: &str,
        context: Option<&str>,
        task_name: &str,
    ) -> Result<String> {
        self.client.quick(query, context, task_name, false)
    }

    /// Submit a long-running query; returns its job id without blocking.
    pub fn submit(&self, query: &str, context: Option<&str>, task_name: &str) -> Result<JobId> {
        self.client.submit(query, context, task_name, 30)
    }

    /// Current status of a job.
    pub fn status(&self, job_id: JobId) -> Result<JobStatus> {
        self.client.status(job_id)
    }

    /// Block until the job is terminal, using the configured poll settings.
    pub fn monitor(&self, job_id: JobId) -> Result<JobStatus> {
        self.client.monitor(job_id, self.poll)
    }

    /// Block until the job is terminal with caller-supplied poll settings.
    pub fn monitor_with(&self, job_id: JobId, poll: PollConfig) -> Result<JobStatus> {
        self.client.monitor(job_id, poll)
    }

    /// Request cancellation of a job. Best effort.
    pub fn cancel(&self, job_id: JobId) -> Result<()> {
        self.client.cancel(job_id)
    }

    /// Metadata for a job.
    pub fn job_info(&self, job_id: JobId) -> Result<JobInfo> {
        self.client.job_info(job_id)
    }

    /// Table names in MyDB (or another context).
    pub fn list_tables(&self, context: Option<&str>) -> Result<Vec<String>> {
        let context = context.unwrap_or(MYDB);
        let res = self.client.quick(
            "SELECT Distinct TABLE_NAME FROM information_schema.TABLES",
            Some(context),
            "listtables",
            true,
        )?;
        // First line is the header; names come back double-quoted.
        Ok(res
            .lines()
            .skip(1)
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.trim_matches('"').to_string())
            .collect())
    }

    /// Drop a MyDB table, silently succeeding when it does not exist.
    pub fn drop_table_if_exists(&self, table: &str) -> Result<()> {
        self.client.quick(
            &format!("DROP TABLE IF EXISTS {table}"),
            Some(MYDB),
            "droptable",
            false,
        )?;
        Ok(())
    }

    /// Retrieve a MyDB table through the MAST fast path, skipping the
    /// output queue.
    ///
    /// Requires the fast-retrieval URL and a username; on other
    /// deployments, or when the client was configured with a bare WSID,
    /// this is [`Error::Unsupported`].
    pub fn fast_table(&self, table: &str) -> Result<DataFrame> {
        let Some(fast_url) = self.fast_url.as_deref() else {
            return Err(Error::Unsupported("fast_table"));
        };
        let Some(username) = self.client.credentials().username() else {
            return Err(Error::Unsupported("fast_table without a username"));
        };
        self.ensure_exists(table)?;
        let started = Instant::now();
        let params = [
            ("userid", username),
            ("pw", self.client.credentials().password()),
            ("table", table),
        ];
        let text = match self.client.api().post_form(fast_url, &params) {
            Err(Error::Server { status, .. }) if status == StatusCode::NOT_FOUND => {
                return Err(Error::TableNotFound(table.to_string()));
            }
            other => other?,
        };
        info!(
            table,
            bytes = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fast table retrieved"
        );
        table::fast_frame(&text)
    }

    /// Retrieve a MyDB table on any CasJobs deployment.
    ///
    /// Tries the quick path first; when the service refuses (result too
    /// large for a quick job), falls back to an extract job: submit,
    /// monitor, download.
    pub fn get_table(&self, table: &str) -> Result<DataFrame> {
        self.ensure_exists(table)?;
        match self.quick(&format!("select * from {table}"), Some(MYDB), "gettable") {
            Ok(df) => return Ok(df),
            Err(Error::Server { status, message }) => {
                debug!(table, %status, %message, "quick retrieval refused");
            }
            Err(err) => return Err(err),
        }
        info!(table, "retrieving through the output queue");
        let job_id = self.client.request_output(table)?;
        self.client.monitor(job_id, self.poll)?;
        let job = self.client.job_info(job_id)?;
        let url = job.output_loc.ok_or_else(|| {
            Error::MalformedResponse(format!("extract job {job_id} has no output location"))
        })?;
        let text = self.client.api().get_url(&url)?;
        table::csv_frame(&text)
    }

    /// Upload a table to MyDB from raw CSV text or a DataFrame.
    pub fn upload_table(&self, table: &str, data: impl Into<TableData>) -> Result<()> {
        let csv = match data.into() {
            TableData::Csv(csv) => csv,
            TableData::Frame(df) => table::frame_to_csv(&df)?,
        };
        self.client.upload(table, &csv, false)
    }

    /// Probe that `table` exists in MyDB.
    fn ensure_exists(&self, table: &str) -> Result<()> {
        match self.client.quick(
            &format!("select top 0 * from {table}"),
            Some(MYDB),
            "checktable",
            false,
        ) {
            Ok(_) => Ok(()),
            Err(Error::Server { .. }) => Err(Error::TableNotFound(table.to_string())),
            Err(err) => Err(err),
        }
    }
}

/// Builder for [`MastCasJobs`].
pub struct MastCasJobsBuilder {
    username: Option<String>,
    wsid: Option<String>,
    password: Option<String>,
    context: String,
    base_url: String,
    wsid_url: Option<String>,
    fast_url: Option<String>,
    request_type: RequestType,
    timeout: Duration,
    poll: PollConfig,
}

impl MastCasJobsBuilder {
    fn new() -> Self {
        Self {
            username: None,
            wsid: None,
            password: None,
            context: "PanSTARRS_DR1".to_string(),
            base_url: MAST_BASE_URL.to_string(),
            wsid_url: None,
            fast_url: None,
            request_type: RequestType::default(),
            timeout: Duration::from_secs(600),
            poll: PollConfig::default(),
        }
    }

    /// CasJobs username. Falls back to `CASJOBS_USERID`.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// WSID from the CasJobs profile, for deployments without a username
    /// lookup. Falls back to `CASJOBS_WSID`. Ignored when a username is
    /// given.
    pub fn wsid(mut self, wsid: impl Into<String>) -> Self {
        self.wsid = Some(wsid.into());
        self
    }

    /// CasJobs password. Falls back to `CASJOBS_PW`.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Default query context.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Service root. The MAST WSID-lookup and fast-retrieval URLs are only
    /// defaulted when this is the MAST deployment.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// WSID lookup endpoint, for non-MAST deployments that have one.
    pub fn wsid_url(mut self, wsid_url: impl Into<String>) -> Self {
        self.wsid_url = Some(wsid_url.into());
        self
    }

    /// Fast-retrieval endpoint.
    pub fn fast_url(mut self, fast_url: impl Into<String>) -> Self {
        self.fast_url = Some(fast_url.into());
        self
    }

    /// Send parameters as a POST form instead of a query string. Needed for
    /// queries beyond URL-length limits.
    pub fn request_type(mut self, request_type: RequestType) -> Self {
        self.request_type = request_type;
        self
    }

    /// Per-request HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Poll settings used by [`MastCasJobs::monitor`].
    pub fn poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Resolve credentials and build the client.
    ///
    /// Configuration errors (unresolved username or password) surface here,
    /// before any network call.
    pub fn build(self) -> Result<MastCasJobs> {
        let credentials = Credentials::resolve(self.username, self.wsid, self.password)?;
        let is_mast = self.base_url.to_lowercase().contains("//mastweb.stsci.edu/");
        let wsid_url = self
            .wsid_url
            .or_else(|| is_mast.then(|| MAST_WSID_URL.to_string()));
        let fast_url = self
            .fast_url
            .or_else(|| is_mast.then(|| MAST_FAST_URL.to_string()));
        let api = ApiClient::new(self.base_url, self.request_type, self.timeout)?;
        let client = CasJobsClient::new(api, credentials, self.context, wsid_url);
        Ok(MastCasJobs {
            client,
            fast_url,
            poll: self.poll,
        })
    }
}
