//! Per-operation remote callbacks: credentials, host keys and deadlines

use std::cell::Cell;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use git2::{CertificateCheckStatus, ErrorClass, ErrorCode, RemoteCallbacks};

use crate::auth::CredentialStrategy;
use crate::{Error, Result};

/// libgit2 re-invokes the credential callback after a rejection; stop after this many.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

/// Socket timeout currently installed in libgit2, in milliseconds.
static SOCKET_TIMEOUT_MILLIS: Mutex<Option<i32>> = Mutex::new(None);

/// Wall-clock budget for one remote operation.
///
/// libgit2 has no per-call timeout, so progress callbacks poll the deadline
/// and abort the transfer once it has passed. A remote that never answers
/// fires no callback at all; [`bound_sockets`] covers that case.
#[derive(Debug)]
pub(crate) struct Deadline {
    started: Instant,
    limit: Option<Duration>,
    tripped: Cell<bool>,
}

impl Deadline {
    pub(crate) fn new(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
            tripped: Cell::new(false),
        }
    }

    /// Returns `true` while the operation may continue.
    pub(crate) fn check(&self) -> bool {
        let within = match self.limit {
            Some(limit) => self.started.elapsed() < limit,
            None => true,
        };
        if !within {
            self.tripped.set(true);
        }
        within
    }

    pub(crate) fn expired(&self) -> bool {
        self.tripped.get() || !self.check()
    }

    pub(crate) fn limit(&self) -> Duration {
        self.limit.unwrap_or_default()
    }
}

/// Bound connecting to and reading from a remote by `limit`.
///
/// libgit2 keeps these limits process-wide, so the timeout of the most
/// recently started operation applies to every socket opened after it.
/// `None` restores libgit2's unbounded default.
pub(crate) fn bound_sockets(limit: Option<Duration>) -> Result<()> {
    let millis = limit.map_or(0, |l| i32::try_from(l.as_millis()).unwrap_or(i32::MAX).max(1));
    let mut installed = SOCKET_TIMEOUT_MILLIS
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if *installed == Some(millis) {
        return Ok(());
    }
    // SAFETY: both options are plain integers libgit2 reads when it opens a
    // socket; writers are serialized by `installed`.
    unsafe {
        git2::opts::set_server_connect_timeout_in_milliseconds(millis)?;
        git2::opts::set_server_timeout_in_milliseconds(millis)?;
    }
    *installed = Some(millis);
    Ok(())
}

/// How SSH host keys are verified.
#[derive(Debug, Clone, Default)]
pub(crate) struct HostKeyPolicy {
    pub(crate) strict: bool,
    /// Lowercase hex SHA-256 fingerprints
    pub(crate) accepted: Vec<String>,
}

impl HostKeyPolicy {
    pub(crate) fn new(strict: bool, accepted: &[String]) -> Self {
        Self {
            strict,
            accepted: accepted
                .iter()
                .map(|f| f.trim().replace(':', "").to_ascii_lowercase())
                .collect(),
        }
    }

    fn verify(&self, fingerprint: Option<&[u8; 32]>) -> bool {
        if !self.strict {
            return true;
        }
        fingerprint
            .map(hex::encode)
            .is_some_and(|hex| self.accepted.iter().any(|a| a == &hex))
    }
}

/// Build callbacks for exactly one fetch or clone.
pub(crate) fn remote_callbacks<'a>(
    strategy: Option<&'a CredentialStrategy>,
    host_keys: &'a HostKeyPolicy,
    deadline: &'a Deadline,
) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0u32;

    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS || !deadline.check() {
            return Err(git2::Error::new(
                ErrorCode::Auth,
                ErrorClass::Net,
                "authentication failed",
            ));
        }
        match strategy {
            Some(strategy) => strategy.credential(url, username_from_url, allowed),
            None => git2::Cred::default(),
        }
    });

    callbacks.certificate_check(move |cert, host| {
        match cert.as_hostkey() {
            Some(hostkey) => {
                if host_keys.verify(hostkey.hash_sha256()) {
                    Ok(CertificateCheckStatus::CertificateOk)
                } else {
                    tracing::warn!(host, "Rejected unknown SSH host key");
                    Err(git2::Error::new(
                        ErrorCode::Certificate,
                        ErrorClass::Ssh,
                        format!("unknown host key for {host}"),
                    ))
                }
            }
            None => Ok(CertificateCheckStatus::CertificatePassthrough),
        }
    });

    callbacks.transfer_progress(move |_| deadline.check());
    callbacks.sideband_progress(move |_| deadline.check());
    // no ref moves once the budget is spent
    callbacks.update_tips(move |_, _, _| deadline.check());
    callbacks
}

/// Translate a git2 failure from a remote operation into the error taxonomy.
pub(crate) fn classify(uri: &str, deadline: &Deadline, err: git2::Error) -> Error {
    if deadline.expired() || err.code() == ErrorCode::Timeout {
        return Error::Timeout {
            uri: uri.to_string(),
            after: deadline.limit(),
        };
    }

    let transport = matches!(
        err.class(),
        ErrorClass::Net
            | ErrorClass::Http
            | ErrorClass::Ssh
            | ErrorClass::Ssl
            | ErrorClass::Callback
    ) || matches!(err.code(), ErrorCode::Auth | ErrorCode::Certificate);

    if transport {
        Error::RepositoryUnavailable {
            uri: uri.to_string(),
            message: err.message().to_string(),
        }
    } else {
        Error::NoSuchRepository {
            uri: uri.to_string(),
            message: err.message().to_string(),
        }
    }
}
