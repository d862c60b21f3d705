//! Replica
//!
//! Holds one full copy of the auction state and answers every broadcast
//! call against it. A replica that starts while others are already
//! running copies their state before joining.
use crate::{
    auction::Snapshot,
    group::{GroupMember, MemberId, SharedGroupTransport, TransportError},
    rpc::{ReplicaCall, ReplicaReply},
    store::AuctionStore,
};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

pub struct Replica {
    id: MemberId,
    store: AuctionStore,
}

impl Replica {
    /// A replica with an empty store that is not part of any group yet
    pub fn new(id: MemberId) -> Self {
        Self {
            id,
            store: AuctionStore::new(),
        }
    }

    /// Bootstrap from the current members of `transport`, then join it
    pub async fn start(
        id: MemberId,
        transport: SharedGroupTransport,
        timeout: Duration,
    ) -> Result<Arc<Self>, TransportError> {
        let replica = Arc::new(Self::new(id.clone()));
        replica.bootstrap(&transport, timeout).await;
        transport.join(id, replica.clone())?;
        info!(
            replica = %replica.id,
            group = transport.group_name(),
            items = replica.store.list_all().len(),
            next_id = replica.store.next_id(),
            "replica started"
        );
        Ok(replica)
    }

    pub fn id(&self) -> &MemberId {
        &self.id
    }

    pub fn store(&self) -> &AuctionStore {
        &self.store
    }

    /// Copy the state of whichever peers answer
    ///
    /// Returns whether a snapshot was adopted.
    pub async fn bootstrap(&self, transport: &SharedGroupTransport, timeout: Duration) -> bool {
        let responses = match transport.broadcast(ReplicaCall::Snapshot, timeout).await {
            Ok(responses) => responses,
            Err(e) => {
                warn!(replica = %self.id, error = %e, "snapshot query failed, starting empty");
                return false;
            }
        };

        let snapshots: Vec<Snapshot> = responses
            .values()
            .filter_map(|reply| reply.clone().into_snapshot())
            .collect();

        let Some(snapshot) = pick_snapshot(snapshots) else {
            info!(replica = %self.id, "no peers answered, starting empty");
            return false;
        };

        let adopted = self.store.adopt(snapshot);
        if adopted {
            info!(replica = %self.id, items = self.store.list_all().len(), "synced state from peers");
        } else {
            debug!(replica = %self.id, "store not empty, snapshot ignored");
        }
        adopted
    }

    /// Answer `call` against the local store
    pub fn execute(&self, call: ReplicaCall) -> ReplicaReply {
        debug!(replica = %self.id, call = call.name(), "handling call");
        match call {
            ReplicaCall::CreateItem(listing) => ReplicaReply::ItemId(self.store.create(listing)),
            ReplicaCall::GetSpec(item_id) => ReplicaReply::Item(self.store.get(item_id)),
            ReplicaCall::GetListings => ReplicaReply::Listings(self.store.list_all()),
            ReplicaCall::CheckClientId(client_id) => {
                ReplicaReply::Flag(self.store.client_id_known(&client_id))
            }
            ReplicaCall::Bid { item_id, bid } => {
                self.store.bid(item_id, bid);
                ReplicaReply::Done
            }
            ReplicaCall::CloseItem(item_id) => ReplicaReply::Item(self.store.close(item_id)),
            ReplicaCall::CheckItemNonExistent(item_id) => {
                ReplicaReply::Flag(!self.store.item_exists(item_id))
            }
            ReplicaCall::RequestCount => ReplicaReply::Count(self.store.request_count()),
            ReplicaCall::Snapshot => ReplicaReply::Snapshot(self.store.snapshot()),
        }
    }
}

#[async_trait]
impl GroupMember for Replica {
    async fn handle(&self, call: ReplicaCall) -> ReplicaReply {
        self.execute(call)
    }
}

/// The first snapshot with listings, or else the first one at all
///
/// Falling back to an empty snapshot still carries the id counter
/// over, so ids of closed items are not handed out again.
fn pick_snapshot(snapshots: Vec<Snapshot>) -> Option<Snapshot> {
    let position = snapshots
        .iter()
        .position(|snapshot| !snapshot.listings.is_empty())
        .unwrap_or(0);
    snapshots.into_iter().nth(position)
}
