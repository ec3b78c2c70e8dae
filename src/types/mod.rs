//! Core domain types shared across the engine.

use serde::{Deserialize, Serialize};

/// A single roster entry: an opaque account handle queued for one add attempt.
///
/// Immutable once enqueued. Leading `@` is stripped at roster-load time, so
/// the stored handle is always bare.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    handle: String,
}

impl Target {
    /// Wrap a bare handle string.
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
        }
    }

    /// The bare handle, without any `@` prefix.
    pub fn handle(&self) -> &str {
        &self.handle
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.handle)
    }
}

/// Destination community kinds, with different membership-mutation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    /// Small legacy group; members add via the chat-level operation.
    Group,
    /// Large group; members add via the channel-level invite operation.
    Supergroup,
    /// Broadcast-only channel. Never accepts direct adds.
    BroadcastChannel,
}

impl GroupKind {
    /// Human-readable label for logs and reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Supergroup => "supergroup",
            Self::BroadcastChannel => "broadcast channel",
        }
    }
}

/// Destination community. Resolved once per run, read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Stable service-side identifier.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Community kind; decides the add operation (or rejects adds outright).
    pub kind: GroupKind,
    /// Whether the acting account holds admin rights here.
    pub is_admin: bool,
}

/// A resolved account identity, as surfaced by the identity resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Stable service-side identifier.
    pub id: i64,
    /// The handle this identity was resolved from.
    pub handle: String,
    /// Automated account, never added.
    pub is_bot: bool,
    /// Deleted or restricted account, never added.
    pub is_deleted: bool,
}

/// Terminal classification of one attempt on one target.
///
/// Categories are mutually exclusive and exhaustive: every attempt ends in
/// exactly one of these. `RateLimited` is the only category that triggers an
/// automatic retry (at most once); whatever the retry produces is the
/// recorded outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    /// The account was added to the group.
    Added,
    /// The account was already a member.
    AlreadyMember,
    /// Bot account, skipped before reaching the membership API.
    SkippedBot,
    /// Deleted/restricted account, skipped before reaching the membership API.
    SkippedDeleted,
    /// The acting account lacks the rights to add members.
    AdminRequired,
    /// The account's privacy settings forbid being added.
    PrivacyRestricted,
    /// The account only accepts adds from mutual contacts.
    MutualContactRequired,
    /// The account is in too many communities already.
    TooManyChannels,
    /// The account is banned from this group.
    Banned,
    /// The account has blocked the acting account.
    Blocked,
    /// Server-imposed mandatory pause before retrying.
    RateLimited {
        /// Seconds the server requires us to wait.
        retry_after: u64,
    },
    /// No account matches the handle.
    NotFound,
    /// The resolver failed repeatedly for non-terminal reasons.
    Unresolvable,
    /// Any failure kind with no dedicated category.
    Unknown {
        /// Short machine-oriented description of the failure.
        detail: String,
    },
}

impl AttemptOutcome {
    /// Whether this outcome routes the target to the invite-link fallback.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            Self::PrivacyRestricted | Self::MutualContactRequired | Self::TooManyChannels
        )
    }

    /// Short label used in structured log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::AlreadyMember => "already_member",
            Self::SkippedBot => "skipped_bot",
            Self::SkippedDeleted => "skipped_deleted",
            Self::AdminRequired => "admin_required",
            Self::PrivacyRestricted => "privacy_restricted",
            Self::MutualContactRequired => "mutual_contact_required",
            Self::TooManyChannels => "too_many_channels",
            Self::Banned => "banned",
            Self::Blocked => "blocked",
            Self::RateLimited { .. } => "rate_limited",
            Self::NotFound => "not_found",
            Self::Unresolvable => "unresolvable",
            Self::Unknown { .. } => "unknown",
        }
    }
}
