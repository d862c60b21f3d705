//! Group membership and broadcast calls
//!
//! Replicas and the coordinator only talk to each other through a
//! [`GroupTransport`]: a call is broadcast to every current member and
//! the answers that arrive before the timeout form a [`ResponseSet`].
mod in_process;
pub use self::in_process::*;

use crate::rpc::{ReplicaCall, ReplicaReply};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Membership of the group at some point in time
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct View {
    pub id: u64,
    pub members: Vec<MemberId>,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] (", self.id)?;
        for (i, member) in self.members.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{member}")?;
        }
        f.write_str(")")
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("member already in group: {0}")]
    DuplicateMember(MemberId),
    #[error("unknown member: {0}")]
    UnknownMember(MemberId),
}

/// Answers of one broadcast call, in view order
///
/// Members that did not answer in time are listed in `missing`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseSet<T> {
    responses: Vec<(MemberId, T)>,
    missing: Vec<MemberId>,
}

impl<T> Default for ResponseSet<T> {
    fn default() -> Self {
        Self {
            responses: vec![],
            missing: vec![],
        }
    }
}

impl<T> ResponseSet<T> {
    pub fn new(responses: Vec<(MemberId, T)>, missing: Vec<MemberId>) -> Self {
        Self { responses, missing }
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn first(&self) -> Option<&T> {
        self.responses.first().map(|(_, value)| value)
    }

    pub fn get(&self, member: &MemberId) -> Option<&T> {
        self.responses
            .iter()
            .find(|(id, _)| id == member)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MemberId, &T)> {
        self.responses.iter().map(|(id, value)| (id, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.responses.iter().map(|(_, value)| value)
    }

    pub fn missing(&self) -> &[MemberId] {
        &self.missing
    }

    pub fn into_first(self) -> Option<T> {
        self.responses.into_iter().next().map(|(_, value)| value)
    }

    pub fn into_value(self, member: &MemberId) -> Option<T> {
        self.responses
            .into_iter()
            .find(|(id, _)| id == member)
            .map(|(_, value)| value)
    }
}

/// Something that answers broadcast calls
#[async_trait]
pub trait GroupMember: Send + Sync {
    async fn handle(&self, call: ReplicaCall) -> ReplicaReply;
}

pub type SharedGroupMember = Arc<dyn GroupMember + 'static>;

/// Receives membership changes
///
/// Every callback does nothing unless overridden.
pub trait MembershipListener: Send + Sync {
    /// A new view was installed
    fn view_accepted(&self, _view: &View) {}
    /// A member is suspected to have crashed
    fn suspect(&self, _member: &MemberId) {}
    /// Senders should stop sending until `unblock`
    fn block(&self) {}
    fn unblock(&self) {}
}

pub type SharedMembershipListener = Arc<dyn MembershipListener + 'static>;

/// Logs membership changes and takes no other action
#[derive(Clone, Debug, Default)]
pub struct LoggingMembershipListener;

impl MembershipListener for LoggingMembershipListener {
    fn view_accepted(&self, view: &View) {
        info!(%view, "view changed");
    }

    fn suspect(&self, member: &MemberId) {
        info!(%member, "member suspected of crashing");
    }

    fn block(&self) {
        info!("view block");
    }

    fn unblock(&self) {
        info!("view unblock");
    }
}

#[async_trait]
pub trait GroupTransport: Send + Sync {
    fn group_name(&self) -> &str;

    fn view(&self) -> View;

    /// Add a member; it will receive every following broadcast
    fn join(&self, id: MemberId, member: SharedGroupMember) -> Result<(), TransportError>;

    fn leave(&self, id: &MemberId) -> Result<(), TransportError>;

    fn subscribe(&self, listener: SharedMembershipListener);

    /// Send `call` to every current member and wait for their answers
    ///
    /// Returns once all members answered or `timeout` elapsed. Late answers
    /// are dropped; members are not told to stop working on them.
    async fn broadcast(
        &self,
        call: ReplicaCall,
        timeout: Duration,
    ) -> Result<ResponseSet<ReplicaReply>, TransportError>;
}

pub type SharedGroupTransport = Arc<dyn GroupTransport + 'static>;
