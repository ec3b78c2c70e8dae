//! Deterministic in-memory stand-ins for the external service seams.
//!
//! `convoke rehearse` runs the full engine against this backend: outcomes
//! are derived from a stable hash of each handle, so the same roster always
//! replays the same way. No network, no credentials, real pacing.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{AddError, IdentityResolver, MembershipApi, MessagingApi, ResolveError, SendError};
use crate::types::{Group, Identity};

/// Scripted backend implementing all three service seams.
///
/// Rate-limited handles succeed on the retry, exercising the engine's
/// single-retry path end to end.
#[derive(Debug, Default)]
pub struct SimService {
    add_calls: Mutex<HashMap<String, u32>>,
}

impl SimService {
    /// Fresh backend with no call history.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Stable per-handle hash; `salt` separates the resolve and add rolls.
fn roll(handle: &str, salt: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    handle.hash(&mut hasher);
    salt.hash(&mut hasher);
    hasher.finish()
}

#[async_trait]
impl IdentityResolver for SimService {
    async fn resolve(&self, handle: &str) -> Result<Identity, ResolveError> {
        let roll = roll(handle, "resolve");
        match roll.checked_rem(100).unwrap_or(0) {
            0..=3 => Ok(Identity {
                id: i64::try_from(roll.checked_shr(1).unwrap_or(0)).unwrap_or(i64::MAX),
                handle: handle.to_owned(),
                is_bot: true,
                is_deleted: false,
            }),
            4..=7 => Ok(Identity {
                id: i64::try_from(roll.checked_shr(1).unwrap_or(0)).unwrap_or(i64::MAX),
                handle: handle.to_owned(),
                is_bot: false,
                is_deleted: true,
            }),
            8..=11 => Err(ResolveError::NotFound),
            _ => Ok(Identity {
                id: i64::try_from(roll.checked_shr(1).unwrap_or(0)).unwrap_or(i64::MAX),
                handle: handle.to_owned(),
                is_bot: false,
                is_deleted: false,
            }),
        }
    }
}

#[async_trait]
impl MembershipApi for SimService {
    async fn add_to_group(&self, _group: &Group, identity: &Identity) -> Result<(), AddError> {
        let calls = {
            let mut map = self.add_calls.lock().unwrap_or_else(|e| e.into_inner());
            let entry = map.entry(identity.handle.clone()).or_insert(0);
            *entry = entry.saturating_add(1);
            *entry
        };

        let roll = roll(&identity.handle, "add");
        match roll.checked_rem(100).unwrap_or(0) {
            0..=54 => Ok(()),
            55..=64 => Err(AddError::AlreadyMember),
            65..=71 => Err(AddError::PrivacyRestricted),
            72..=75 => Err(AddError::MutualContactRequired),
            76..=78 => Err(AddError::TooManyChannels),
            79..=82 => Err(AddError::AdminRequired),
            83..=85 => Err(AddError::Banned),
            86..=87 => Err(AddError::Blocked),
            // Rate limited on the first call, added on the retry.
            88..=93 => {
                if calls <= 1 {
                    Err(AddError::RateLimited {
                        seconds: roll.checked_rem(4).unwrap_or(0).saturating_add(1),
                    })
                } else {
                    Ok(())
                }
            }
            _ => Err(AddError::Unknown {
                detail: "sim-opaque-failure".to_owned(),
            }),
        }
    }

    async fn invite_link(&self, group: &Group) -> Result<String, AddError> {
        Ok(format!("https://chat.example/invite/{}", group.id))
    }
}

#[async_trait]
impl MessagingApi for SimService {
    async fn send_direct_message(&self, identity: &Identity, _text: &str) -> Result<(), SendError> {
        if roll(&identity.handle, "send").checked_rem(10).unwrap_or(0) == 0 {
            return Err(SendError::PeerUnavailable);
        }
        Ok(())
    }
}
