//! Error classifier: structured API failures → typed attempt outcomes.
//!
//! Pure and deterministic, no I/O. Matches on failure variants only; there
//! is no message-text inspection anywhere in this module.

use crate::api::{AddError, ResolveError};
use crate::types::AttemptOutcome;

/// Map a membership-API failure to its outcome category.
///
/// Every known failure kind maps to exactly one category. `WriteForbidden`
/// lands in `AdminRequired` (same permission class). `ConnectionLost` is
/// intercepted by the orchestrator before classification ever runs; the arm
/// here is a conservative total-function fallback.
pub fn classify_add_failure(err: &AddError) -> AttemptOutcome {
    match err {
        AddError::AlreadyMember => AttemptOutcome::AlreadyMember,
        AddError::AdminRequired | AddError::WriteForbidden => AttemptOutcome::AdminRequired,
        AddError::PrivacyRestricted => AttemptOutcome::PrivacyRestricted,
        AddError::MutualContactRequired => AttemptOutcome::MutualContactRequired,
        AddError::Banned => AttemptOutcome::Banned,
        AddError::TooManyChannels => AttemptOutcome::TooManyChannels,
        AddError::RateLimited { seconds } => AttemptOutcome::RateLimited {
            retry_after: *seconds,
        },
        AddError::Blocked => AttemptOutcome::Blocked,
        AddError::Unknown { detail } => AttemptOutcome::Unknown {
            detail: detail.clone(),
        },
        AddError::ConnectionLost { detail } => AttemptOutcome::Unknown {
            detail: format!("connection-lost: {detail}"),
        },
    }
}

/// Map a resolver failure, after the bounded lookup retries are exhausted,
/// to its terminal outcome category.
pub fn classify_resolve_failure(err: &ResolveError) -> AttemptOutcome {
    match err {
        ResolveError::NotFound => AttemptOutcome::NotFound,
        ResolveError::RateLimited { .. } | ResolveError::Unknown { .. } => {
            AttemptOutcome::Unresolvable
        }
        ResolveError::ConnectionLost { detail } => AttemptOutcome::Unknown {
            detail: format!("connection-lost: {detail}"),
        },
    }
}

/// Whether a resolver failure is worth another lookup attempt.
pub fn resolve_failure_is_transient(err: &ResolveError) -> bool {
    matches!(
        err,
        ResolveError::RateLimited { .. } | ResolveError::Unknown { .. }
    )
}
