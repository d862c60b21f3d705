use super::*;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

#[derive(Default)]
struct GroupState {
    view_id: u64,
    members: Vec<(MemberId, SharedGroupMember)>,
    listeners: Vec<SharedMembershipListener>,
}

impl GroupState {
    fn view(&self) -> View {
        View {
            id: self.view_id,
            members: self.members.iter().map(|(id, _)| id.clone()).collect(),
        }
    }
}

/// A group whose members all live in the current process
///
/// Every broadcast runs each member's handler on its own tokio task,
/// so a slow member doesn't hold up the others and keeps running after
/// the caller gave up on it.
pub struct InProcessGroup {
    name: String,
    state: RwLock<GroupState>,
}

impl InProcessGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(GroupState::default()),
        }
    }

    pub fn new_shared(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Report `id` as suspected to all listeners
    ///
    /// The member stays in the view until it leaves.
    pub fn suspect(&self, id: &MemberId) -> Result<(), TransportError> {
        let listeners = {
            let state = self.state.read();
            if !state.members.iter().any(|(member, _)| member == id) {
                return Err(TransportError::UnknownMember(id.clone()));
            }
            state.listeners.clone()
        };

        for listener in listeners {
            listener.suspect(id);
        }
        Ok(())
    }

    /// Bump the view id and tell everyone, with the lock released
    fn change_view<F>(&self, f: F) -> Result<(), TransportError>
    where
        F: FnOnce(&mut Vec<(MemberId, SharedGroupMember)>) -> Result<(), TransportError>,
    {
        let (view, listeners) = {
            let mut state = self.state.write();
            f(&mut state.members)?;
            state.view_id += 1;
            (state.view(), state.listeners.clone())
        };

        debug!(group = %self.name, %view, "installing view");
        for listener in &listeners {
            listener.block();
        }
        for listener in &listeners {
            listener.view_accepted(&view);
        }
        for listener in &listeners {
            listener.unblock();
        }
        Ok(())
    }
}

#[async_trait]
impl GroupTransport for InProcessGroup {
    fn group_name(&self) -> &str {
        &self.name
    }

    fn view(&self) -> View {
        self.state.read().view()
    }

    fn join(&self, id: MemberId, member: SharedGroupMember) -> Result<(), TransportError> {
        self.change_view(move |members| {
            if members.iter().any(|(existing, _)| *existing == id) {
                return Err(TransportError::DuplicateMember(id));
            }
            members.push((id, member));
            Ok(())
        })
    }

    fn leave(&self, id: &MemberId) -> Result<(), TransportError> {
        self.change_view(|members| {
            let position = members
                .iter()
                .position(|(existing, _)| existing == id)
                .ok_or_else(|| TransportError::UnknownMember(id.clone()))?;
            members.remove(position);
            Ok(())
        })
    }

    fn subscribe(&self, listener: SharedMembershipListener) {
        self.state.write().listeners.push(listener);
    }

    async fn broadcast(
        &self,
        call: ReplicaCall,
        timeout: Duration,
    ) -> Result<ResponseSet<ReplicaReply>, TransportError> {
        let members = self.state.read().members.clone();
        let deadline = Instant::now() + timeout;

        let pending = members.into_iter().map(|(id, member)| {
            let call = call.clone();
            let task = tokio::spawn(async move { member.handle(call).await });
            async move { (id, timeout_at(deadline, task).await) }
        });

        let mut responses = vec![];
        let mut missing = vec![];
        for (id, result) in join_all(pending).await {
            match result {
                Ok(Ok(reply)) => responses.push((id, reply)),
                Ok(Err(e)) => {
                    warn!(member = %id, error = %e, "member failed while answering");
                    missing.push(id);
                }
                Err(_elapsed) => {
                    debug!(member = %id, call = call.name(), "member did not answer in time");
                    missing.push(id);
                }
            }
        }

        Ok(ResponseSet::new(responses, missing))
    }
}
