//! Scripted collaborators for engine tests.
//!
//! Unscripted handles resolve to a plain person and add cleanly, so tests
//! only script the interesting cases. Scripted results are consumed in
//! order; the last one repeats if the engine calls again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;

use convoke::api::{
    AddError, IdentityResolver, MembershipApi, MessagingApi, ResolveError, SendError,
};
use convoke::engine::BatchRunner;
use convoke::types::{Group, GroupKind, Identity, Target};

/// A plain, addable identity for `handle`.
pub fn person(handle: &str) -> Identity {
    Identity {
        id: 1000,
        handle: handle.to_owned(),
        is_bot: false,
        is_deleted: false,
    }
}

/// A supergroup the acting account administers.
pub fn supergroup() -> Group {
    Group {
        id: 42,
        title: "testers".to_owned(),
        kind: GroupKind::Supergroup,
        is_admin: true,
    }
}

/// Targets from bare handles.
pub fn targets(handles: &[&str]) -> Vec<Target> {
    handles.iter().map(|handle| Target::new(*handle)).collect()
}

#[derive(Default)]
pub struct ScriptedResolver {
    script: Mutex<HashMap<String, Vec<Result<Identity, ResolveError>>>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, handle: &str, results: Vec<Result<Identity, ResolveError>>) -> Self {
        self.script
            .lock()
            .expect("resolver script lock")
            .insert(handle.to_owned(), results);
        self
    }

    pub fn call_count(&self, handle: &str) -> usize {
        self.calls
            .lock()
            .expect("resolver calls lock")
            .iter()
            .filter(|h| h.as_str() == handle)
            .count()
    }
}

#[async_trait]
impl IdentityResolver for ScriptedResolver {
    async fn resolve(&self, handle: &str) -> Result<Identity, ResolveError> {
        self.calls
            .lock()
            .expect("resolver calls lock")
            .push(handle.to_owned());
        let mut script = self.script.lock().expect("resolver script lock");
        match script.get_mut(handle) {
            Some(results) if results.len() > 1 => results.remove(0),
            Some(results) => results.first().cloned().expect("non-empty script"),
            None => Ok(person(handle)),
        }
    }
}

#[derive(Default)]
pub struct ScriptedMembership {
    script: Mutex<HashMap<String, Vec<Result<(), AddError>>>>,
    pub add_calls: Mutex<Vec<String>>,
    pub link_calls: Mutex<u32>,
    link_result: Mutex<Option<Result<String, AddError>>>,
    cancel_on_first_add: Mutex<Option<Arc<AtomicBool>>>,
}

impl ScriptedMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, handle: &str, results: Vec<Result<(), AddError>>) -> Self {
        self.script
            .lock()
            .expect("membership script lock")
            .insert(handle.to_owned(), results);
        self
    }

    pub fn with_link_result(self, result: Result<String, AddError>) -> Self {
        *self.link_result.lock().expect("link result lock") = Some(result);
        self
    }

    /// Raise `flag` when the first add call lands; lets tests cancel a run
    /// from inside an attempt.
    pub fn cancel_on_first_add(self, flag: Arc<AtomicBool>) -> Self {
        *self.cancel_on_first_add.lock().expect("cancel hook lock") = Some(flag);
        self
    }

    pub fn add_call_count(&self, handle: &str) -> usize {
        self.add_calls
            .lock()
            .expect("membership calls lock")
            .iter()
            .filter(|h| h.as_str() == handle)
            .count()
    }

    pub fn total_add_calls(&self) -> usize {
        self.add_calls.lock().expect("membership calls lock").len()
    }

    pub fn link_call_count(&self) -> u32 {
        *self.link_calls.lock().expect("link calls lock")
    }
}

#[async_trait]
impl MembershipApi for ScriptedMembership {
    async fn add_to_group(&self, _group: &Group, identity: &Identity) -> Result<(), AddError> {
        self.add_calls
            .lock()
            .expect("membership calls lock")
            .push(identity.handle.clone());
        if let Some(flag) = self
            .cancel_on_first_add
            .lock()
            .expect("cancel hook lock")
            .as_ref()
        {
            flag.store(true, Ordering::Relaxed);
        }
        let mut script = self.script.lock().expect("membership script lock");
        match script.get_mut(&identity.handle) {
            Some(results) if results.len() > 1 => results.remove(0),
            Some(results) => results.first().cloned().expect("non-empty script"),
            None => Ok(()),
        }
    }

    async fn invite_link(&self, group: &Group) -> Result<String, AddError> {
        let mut calls = self.link_calls.lock().expect("link calls lock");
        *calls = calls.saturating_add(1);
        match self.link_result.lock().expect("link result lock").clone() {
            Some(result) => result,
            None => Ok(format!("https://chat.example/invite/{}", group.id)),
        }
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, String)>>,
    fail_for: Mutex<Vec<String>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(self, handle: &str) -> Self {
        self.fail_for
            .lock()
            .expect("messenger fail lock")
            .push(handle.to_owned());
        self
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("messenger sent lock")
            .iter()
            .map(|(handle, _)| handle.clone())
            .collect()
    }
}

#[async_trait]
impl MessagingApi for RecordingMessenger {
    async fn send_direct_message(&self, identity: &Identity, text: &str) -> Result<(), SendError> {
        if self
            .fail_for
            .lock()
            .expect("messenger fail lock")
            .contains(&identity.handle)
        {
            return Err(SendError::PeerUnavailable);
        }
        self.sent
            .lock()
            .expect("messenger sent lock")
            .push((identity.handle.clone(), text.to_owned()));
        Ok(())
    }
}

/// A runner over the three mocks with a seeded RNG.
pub fn runner(
    resolver: &Arc<ScriptedResolver>,
    membership: &Arc<ScriptedMembership>,
    messenger: &Arc<RecordingMessenger>,
) -> BatchRunner {
    BatchRunner::new(
        Arc::clone(resolver) as Arc<dyn IdentityResolver>,
        Arc::clone(membership) as Arc<dyn MembershipApi>,
        Arc::clone(messenger) as Arc<dyn MessagingApi>,
    )
    .with_rng(StdRng::seed_from_u64(7))
}
