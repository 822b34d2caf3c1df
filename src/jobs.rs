//! Job identifiers, lifecycle status, and polling configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Server-assigned job identifier.
pub type JobId = u64;

/// Lifecycle status of a submitted job.
///
/// The service reports numeric codes from `GetJobStatus` and textual labels
/// in job listings; both map onto this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Accepted, waiting to be picked up.
    Ready,
    /// Waiting in the execution queue.
    Queued,
    /// Executing.
    Running,
    /// Cancellation requested, not yet effective.
    Cancelling,
    /// Cancelled before completion.
    Cancelled,
    /// Ended in error.
    Failed,
    /// Completed successfully.
    Finished,
    /// Status code or label this client does not recognize.
    Unknown,
}

impl JobStatus {
    /// Map a numeric wire code from `GetJobStatus`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => JobStatus::Ready,
            1 => JobStatus::Running,
            2 => JobStatus::Cancelling,
            3 => JobStatus::Cancelled,
            4 => JobStatus::Failed,
            5 => JobStatus::Finished,
            _ => JobStatus::Unknown,
        }
    }

    /// Map a textual status label from a job listing.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "ready" => JobStatus::Ready,
            "queued" => JobStatus::Queued,
            "started" | "running" => JobStatus::Running,
            "canceling" | "cancelling" => JobStatus::Cancelling,
            "cancelled" | "canceled" => JobStatus::Cancelled,
            "failed" => JobStatus::Failed,
            "finished" => JobStatus::Finished,
            _ => JobStatus::Unknown,
        }
    }

    /// Whether the job will never change state again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Cancelled | JobStatus::Failed | JobStatus::Finished
        )
    }

    /// Whether this is a terminal state other than success.
    pub fn is_failure(self) -> bool {
        matches!(self, JobStatus::Cancelled | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Ready => "ready",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Cancelling => "cancelling",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
            JobStatus::Finished => "finished",
            JobStatus::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// Per-job metadata from the server's job listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    /// Server-assigned identifier.
    pub job_id: JobId,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Task name given at submission.
    pub task_name: Option<String>,
    /// Download URL for a completed extract job.
    pub output_loc: Option<String>,
    /// Submission time as reported by the server.
    pub time_submit: Option<String>,
}

impl fmt::Display for JobInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} ({})", self.job_id, self.status)?;
        if let Some(task) = &self.task_name {
            write!(f, " task '{task}'")?;
        }
        Ok(())
    }
}

/// Polling behavior for [`monitor`](crate::CasJobsClient::monitor).
///
/// `timeout` of `None` waits indefinitely; a caller-supplied timeout is
/// honored against wall-clock time across polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between status polls.
    pub interval: Duration,
    /// Overall budget before `monitor` gives up.
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: None,
        }
    }
}

impl PollConfig {
    /// Poll every `interval` with no overall timeout.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    /// Set an overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_map_onto_statuses() {
        assert_eq!(JobStatus::from_code(0), JobStatus::Ready);
        assert_eq!(JobStatus::from_code(1), JobStatus::Running);
        assert_eq!(JobStatus::from_code(2), JobStatus::Cancelling);
        assert_eq!(JobStatus::from_code(3), JobStatus::Cancelled);
        assert_eq!(JobStatus::from_code(4), JobStatus::Failed);
        assert_eq!(JobStatus::from_code(5), JobStatus::Finished);
        assert_eq!(JobStatus::from_code(42), JobStatus::Unknown);
    }

    #[test]
    fn labels_map_case_insensitively() {
        assert_eq!(JobStatus::from_label("Finished"), JobStatus::Finished);
        assert_eq!(JobStatus::from_label("QUEUED"), JobStatus::Queued);
        assert_eq!(JobStatus::from_label("started"), JobStatus::Running);
        assert_eq!(JobStatus::from_label(" ready "), JobStatus::Ready);
        assert_eq!(JobStatus::from_label("whatever"), JobStatus::Unknown);
    }

    #[test]
    fn terminal_and_failure_predicates() {
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Cancelling.is_terminal());

        assert!(JobStatus::Failed.is_failure());
        assert!(JobStatus::Cancelled.is_failure());
        assert!(!JobStatus::Finished.is_failure());
    }

    #[test]
    fn default_poll_config_has_no_timeout() {
        let poll = PollConfig::default();
        assert_eq!(poll.interval, Duration::from_secs(10));
        assert_eq!(poll.timeout, None);
    }
}
