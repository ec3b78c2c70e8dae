//! Trait seams for the external service collaborators.
//!
//! The engine never talks to the network itself. It consumes three
//! capabilities (identity resolution, membership mutation, direct
//! messaging) through the traits here, and the concrete bindings live
//! outside the crate (the [`crate::sim`] module ships in-memory stand-ins).
//!
//! Failures are structured enums, not text: the classifier matches on
//! variants, and substring-matching free-form error messages is deliberately
//! impossible through this seam.

use async_trait::async_trait;

use crate::types::{Group, Identity};

/// Identity lookup failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    /// No account matches the handle.
    #[error("no account matches the handle")]
    NotFound,
    /// The resolver itself is rate limited.
    #[error("resolver rate limited for {seconds}s")]
    RateLimited {
        /// Seconds to wait before the next lookup.
        seconds: u64,
    },
    /// Any other lookup failure.
    #[error("resolver failure: {detail}")]
    Unknown {
        /// Short description of the failure.
        detail: String,
    },
    /// The transport to the service is gone. Aborts the run.
    #[error("connection lost: {detail}")]
    ConnectionLost {
        /// Short description of the transport failure.
        detail: String,
    },
}

/// Membership mutation failures, one variant per service failure kind.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AddError {
    /// The account is already a member of the group.
    #[error("already a member")]
    AlreadyMember,
    /// The acting account lacks admin rights in the group.
    #[error("admin rights required")]
    AdminRequired,
    /// The account's privacy settings forbid being added.
    #[error("privacy settings forbid adding")]
    PrivacyRestricted,
    /// The account requires a mutual-contact relationship first.
    #[error("mutual contact required")]
    MutualContactRequired,
    /// The account is banned from the group.
    #[error("banned from the group")]
    Banned,
    /// The acting account may not write to the group at all.
    #[error("writing to the group is forbidden")]
    WriteForbidden,
    /// The account has joined too many communities.
    #[error("account is in too many channels")]
    TooManyChannels,
    /// Server-imposed mandatory pause.
    #[error("rate limited for {seconds}s")]
    RateLimited {
        /// Seconds the server requires us to wait.
        seconds: u64,
    },
    /// The account has blocked the acting account.
    #[error("blocked by the account")]
    Blocked,
    /// Any other service failure.
    #[error("membership failure: {detail}")]
    Unknown {
        /// Short description of the failure.
        detail: String,
    },
    /// The transport to the service is gone. Aborts the run.
    #[error("connection lost: {detail}")]
    ConnectionLost {
        /// Short description of the transport failure.
        detail: String,
    },
}

/// Direct-message failures during fallback dispatch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
    /// The recipient cannot be messaged (blocked, deactivated, ...).
    #[error("recipient unavailable")]
    PeerUnavailable,
    /// Server-imposed mandatory pause on outbound messages.
    #[error("rate limited for {seconds}s")]
    RateLimited {
        /// Seconds the server requires us to wait.
        seconds: u64,
    },
    /// Any other send failure.
    #[error("send failure: {detail}")]
    Unknown {
        /// Short description of the failure.
        detail: String,
    },
    /// The transport to the service is gone. Aborts fallback dispatch.
    #[error("connection lost: {detail}")]
    ConnectionLost {
        /// Short description of the transport failure.
        detail: String,
    },
}

/// Resolves opaque handles to concrete account identities.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Look up the account behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`]; the engine treats `RateLimited` and
    /// `Unknown` as transient and retries the lookup a bounded number of
    /// times before giving up.
    async fn resolve(&self, handle: &str) -> Result<Identity, ResolveError>;
}

/// Mutates group membership and produces invite links.
#[async_trait]
pub trait MembershipApi: Send + Sync {
    /// Add `identity` to `group` using the operation appropriate to the
    /// group kind.
    ///
    /// # Errors
    ///
    /// Returns [`AddError`]; every variant except `ConnectionLost` is
    /// converted into an [`crate::types::AttemptOutcome`] by the classifier.
    async fn add_to_group(&self, group: &Group, identity: &Identity) -> Result<(), AddError>;

    /// Return a joinable reference for `group`: the public link when one
    /// exists, otherwise a freshly generated invite.
    ///
    /// # Errors
    ///
    /// Returns [`AddError`] when no link can be produced.
    async fn invite_link(&self, group: &Group) -> Result<String, AddError>;
}

/// Sends direct messages to resolved identities.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Deliver `text` to `identity` as a one-off direct message.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] when delivery fails.
    async fn send_direct_message(&self, identity: &Identity, text: &str) -> Result<(), SendError>;
}
