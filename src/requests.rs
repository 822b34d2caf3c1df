//! Blocking HTTP layer for the CasJobs services.
//!
//! Every protocol call is a GET with query-string parameters or a POST with
//! a form body against `{base_url}/{Method}`. GET is the default; POST is
//! needed for queries longer than URL-length limits allow.

use std::time::Duration;

use tracing::debug;

use crate::prelude::*;
use crate::response;

/// How request parameters are sent to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestType {
    /// Query-string parameters. Subject to URL-length limits.
    #[default]
    Get,
    /// Form-encoded body. No length limit; use for long queries.
    Post,
}

/// Blocking HTTP client for a single CasJobs endpoint.
#[derive(Debug)]
pub struct ApiClient {
    base_url: String,
    request_type: RequestType,
    client: reqwest::blocking::Client,
}

impl ApiClient {
    /// Build a client for `base_url`, e.g. the `jobs.asmx` service root.
    pub fn new(
        base_url: impl Into<String>,
        request_type: RequestType,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            request_type,
            client,
        })
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    /// Invoke a service method with the given parameters, returning the raw
    /// response body. Non-success statuses become [`Error::Server`] carrying
    /// the fault text.
    pub fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<String> {
        let url = self.endpoint(method);
        debug!(method, url, "casjobs request");
        let request = match self.request_type {
            RequestType::Get => self.client.get(&url).query(params),
            RequestType::Post => self.client.post(&url).form(params),
        };
        Self::read(request.send()?)
    }

    /// POST a form to an absolute URL outside the service root (WSID lookup,
    /// fast retrieval).
    pub fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<String> {
        debug!(url, "casjobs form post");
        Self::read(self.client.post(url).form(params).send()?)
    }

    /// GET an absolute URL (extract-job downloads).
    pub fn get_url(&self, url: &str) -> Result<String> {
        debug!(url, "casjobs download");
        Self::read(self.client.get(url).send()?)
    }

    fn read(resp: reqwest::blocking::Response) -> Result<String> {
        let status = resp.status();
        let body = resp.text()?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(Error::Server {
                status,
                message: response::fault_message(&body),
            })
        }
    }
}
