//! Generic CasJobs protocol client.
//!
//! Speaks the `jobs.asmx` service methods shared by every CasJobs
//! deployment (MAST, SDSS, ...): quick jobs, submitted jobs with a polled
//! lifecycle, extract jobs, and MyDB table upkeep. Deployment conveniences
//! such as the MAST fast retrieval path live in [`crate::mast`].

use std::sync::OnceLock;
use std::thread;
use std::time::Instant;

use tracing::{debug, info};

use crate::credentials::Credentials;
use crate::jobs::{JobId, JobInfo, JobStatus, PollConfig};
use crate::prelude::*;
use crate::requests::ApiClient;
use crate::response;

/// The user's scratch-database context.
pub const MYDB: &str = "MYDB";

/// Client for one CasJobs deployment.
///
/// Holds the resolved credentials and default context for its lifetime.
/// All calls are blocking; [`monitor`](Self::monitor) is the only one that
/// loops.
#[derive(Debug)]
pub struct CasJobsClient {
    api: ApiClient,
    credentials: Credentials,
    context: String,
    wsid_url: Option<String>,
    wsid: OnceLock<String>,
}

impl CasJobsClient {
    /// Create a client against `base_url` (the `jobs.asmx` service root).
    ///
    /// `wsid_url`, when given, is the endpoint that exchanges a
    /// username/password pair for a WSID; deployments without one require
    /// the WSID in the credentials.
    pub fn new(
        api: ApiClient,
        credentials: Credentials,
        context: impl Into<String>,
        wsid_url: Option<String>,
    ) -> Self {
        Self {
            api,
            credentials,
            context: context.into(),
            wsid_url,
            wsid: OnceLock::new(),
        }
    }

    /// Resolved credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Default query context.
    pub fn context(&self) -> &str {
        &self.context
    }

    pub(crate) fn api(&self) -> &ApiClient {
        &self.api
    }

    /// The WSID used to authenticate protocol calls.
    ///
    /// Taken from the credentials when configured explicitly; otherwise
    /// looked up once from `wsid_url` and cached for the client's lifetime.
    pub fn wsid(&self) -> Result<&str> {
        if let Some(wsid) = self.wsid.get() {
            return Ok(wsid);
        }
        let resolved = match self.credentials.wsid() {
            Some(wsid) => wsid.to_string(),
            None => self.lookup_wsid()?,
        };
        Ok(self.wsid.get_or_init(|| resolved))
    }

    fn lookup_wsid(&self) -> Result<String> {
        let Some(url) = self.wsid_url.as_deref() else {
            return Err(Error::Unsupported("WSID lookup by username"));
        };
        let Some(username) = self.credentials.username() else {
            return Err(Error::Unsupported("WSID lookup without a username"));
        };
        let body = self.api.post_form(
            url,
            &[
                ("userid", username),
                ("password", self.credentials.password()),
            ],
        )?;
        let text = response::element_text(&body)?;
        let wsid = text.trim();
        if wsid.is_empty() || wsid == "-1" {
            return Err(Error::WrongCredentials);
        }
        debug!("resolved WSID from username");
        Ok(wsid.to_string())
    }

    /// Invoke a service method with the authentication parameters attached.
    fn exec(&self, method: &str, extra: &[(&str, &str)]) -> Result<String> {
        let wsid = self.wsid()?.to_string();
        let mut params: Vec<(&str, &str)> =
            vec![("wsid", wsid.as_str()), ("pw", self.credentials.password())];
        params.extend_from_slice(extra);
        self.api.call(method, &params)
    }

    /// Run a quick job: a short query executed synchronously within the
    /// service's time budget. Returns the raw CSV payload.
    ///
    /// `system` jobs are hidden from the web UI and history.
    pub fn quick(
        &self,
        query: &str,
        context: Option<&str>,
        task_name: &str,
        system: bool,
    ) -> Result<String> {
        let context = context.unwrap_or(&self.context);
        debug!(context, task_name, "quick job");
        let body = self.exec(
            "ExecuteQuickJob",
            &[
                ("qry", query),
                ("context", context),
                ("taskname", task_name),
                ("isSystem", if system { "true" } else { "false" }),
            ],
        )?;
        response::element_text(&body)
    }

    /// Submit a long-running query. Returns the job id immediately.
    ///
    /// `estimate_minutes` is the queue-time hint the service asks for.
    pub fn submit(
        &self,
        query: &str,
        context: Option<&str>,
        task_name: &str,
        estimate_minutes: u32,
    ) -> Result<JobId> {
        let context = context.unwrap_or(&self.context);
        let estimate = estimate_minutes.to_string();
        let body = self.exec(
            "SubmitJob",
            &[
                ("qry", query),
                ("context", context),
                ("taskname", task_name),
                ("estimate", &estimate),
            ],
        )?;
        let job_id = parse_job_id(&body)?;
        info!(job_id, context, task_name, "job submitted");
        Ok(job_id)
    }

    /// Current status of a job.
    pub fn status(&self, job_id: JobId) -> Result<JobStatus> {
        let id = job_id.to_string();
        let body = self.exec("GetJobStatus", &[("jobid", &id)])?;
        Ok(JobStatus::from_code(response::element_int(&body)?))
    }

    /// Request cancellation. Best effort: the job may still run to
    /// completion.
    pub fn cancel(&self, job_id: JobId) -> Result<()> {
        let id = job_id.to_string();
        // The service spells this one parameter with a capital I.
        self.exec("CancelJob", &[("jobId", &id)])?;
        info!(job_id, "cancellation requested");
        Ok(())
    }

    /// Metadata for a single job from the server's job listing.
    pub fn job_info(&self, job_id: JobId) -> Result<JobInfo> {
        let conditions = format!("jobid : {job_id}");
        let body = self.exec(
            "GetJobs",
            &[("conditions", &conditions), ("includeSystem", "true")],
        )?;
        let record = response::job_records(&body)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedResponse(format!("no record for job {job_id}")))?;
        let status = match record.get("Status") {
            Some(value) => match value.trim().parse::<i64>() {
                Ok(code) => JobStatus::from_code(code),
                Err(_) => JobStatus::from_label(value),
            },
            None => JobStatus::Unknown,
        };
        Ok(JobInfo {
            job_id: record
                .get("JobID")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(job_id),
            status,
            task_name: record.get("TaskName").cloned(),
            output_loc: record.get("OutputLoc").cloned(),
            time_submit: record.get("TimeSubmit").cloned(),
        })
    }

    /// Block until `job_id` reaches a terminal state.
    ///
    /// Sleeps `poll.interval` between status calls. Returns the status on
    /// success, [`Error::JobFailed`] on a failed or cancelled job, and
    /// [`Error::Timeout`] once `poll.timeout` is exceeded.
    pub fn monitor(&self, job_id: JobId, poll: PollConfig) -> Result<JobStatus> {
        let started = Instant::now();
        loop {
            let status = self.status(job_id)?;
            debug!(job_id, %status, "job poll");
            if status == JobStatus::Finished {
                info!(job_id, "job finished");
                return Ok(status);
            }
            if status.is_failure() {
                return Err(Error::JobFailed { job_id, status });
            }
            if let Some(timeout) = poll.timeout {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(Error::Timeout { job_id, waited });
                }
            }
            thread::sleep(poll.interval);
        }
    }

    /// Submit an extract job for a MyDB table, CSV output. Returns the job
    /// id; once finished, [`job_info`](Self::job_info) carries the download
    /// location.
    pub fn request_output(&self, table: &str) -> Result<JobId> {
        let body = self.exec("SubmitExtractJob", &[("tableName", table), ("type", "CSV")])?;
        let job_id = parse_job_id(&body)?;
        info!(job_id, table, "extract job submitted");
        Ok(job_id)
    }

    /// Drop a MyDB table. Errors if it does not exist; see
    /// [`MastCasJobs::drop_table_if_exists`](crate::MastCasJobs::drop_table_if_exists)
    /// for the idempotent form.
    pub fn drop_table(&self, table: &str) -> Result<()> {
        self.quick(&format!("DROP TABLE {table}"), Some(MYDB), "droptable", false)?;
        Ok(())
    }

    /// Upload CSV data as a MyDB table.
    pub fn upload(&self, table: &str, csv: &str, table_exists: bool) -> Result<()> {
        self.exec(
            "UploadData",
            &[
                ("tableName", table),
                ("data", csv),
                ("tableExists", if table_exists { "true" } else { "false" }),
            ],
        )?;
        info!(table, bytes = csv.len(), "table uploaded");
        Ok(())
    }
}

fn parse_job_id(body: &str) -> Result<JobId> {
    let id = response::element_int(body)?;
    JobId::try_from(id)
        .map_err(|_| Error::MalformedResponse(format!("negative job id {id} from server")))
}
