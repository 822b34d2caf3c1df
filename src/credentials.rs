//! Credential resolution for CasJobs clients.
//!
//! CasJobs authenticates every request with a WSID (a numeric web-service
//! identity) and a password. MAST users normally know their username rather
//! than their WSID; the client looks the WSID up once when only a username
//! is available.

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Environment variable supplying the username.
pub const USERID_VAR: &str = "CASJOBS_USERID";
/// Environment variable supplying the password.
pub const PASSWORD_VAR: &str = "CASJOBS_PW";
/// Environment variable supplying the WSID.
pub const WSID_VAR: &str = "CASJOBS_WSID";

/// Resolved CasJobs credentials. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    username: Option<String>,
    wsid: Option<String>,
    password: String,
}

impl Credentials {
    /// Resolve credentials from explicit values with environment fallback.
    ///
    /// Preference order for the user identity: explicit username, explicit
    /// WSID, `CASJOBS_USERID`, `CASJOBS_WSID`. The password falls back to
    /// `CASJOBS_PW`. Fails before any network call if either half is
    /// unresolved.
    pub fn resolve(
        username: Option<String>,
        wsid: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let (username, wsid) = match (username, wsid) {
            (Some(name), _) => (Some(name), None),
            (None, Some(wsid)) => (None, Some(wsid)),
            (None, None) => match std::env::var(USERID_VAR).ok() {
                Some(name) => (Some(name), None),
                None => (None, std::env::var(WSID_VAR).ok()),
            },
        };
        if username.is_none() && wsid.is_none() {
            return Err(Error::MissingUser(USERID_VAR, WSID_VAR));
        }
        let password = match password.or_else(|| std::env::var(PASSWORD_VAR).ok()) {
            Some(password) => password,
            None => return Err(Error::MissingPassword(PASSWORD_VAR)),
        };
        Ok(Self {
            username,
            wsid,
            password,
        })
    }

    /// Username, when the client was configured with one.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Explicitly configured WSID, when one was given instead of a username.
    pub fn wsid(&self) -> Option<&str> {
        self.wsid.as_deref()
    }

    /// Password.
    pub fn password(&self) -> &str {
        &self.password
    }
}
