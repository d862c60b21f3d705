//! Messages exchanged between the coordinator and the replicas
use crate::auction::{AuctionItem, BidDetails, ClientId, ItemId, Listings, NewItem, Snapshot};
use serde::{Deserialize, Serialize};

/// A call broadcast to every member of the group
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaCall {
    CreateItem(NewItem),
    GetSpec(ItemId),
    GetListings,
    CheckClientId(ClientId),
    Bid { item_id: ItemId, bid: BidDetails },
    CloseItem(ItemId),
    CheckItemNonExistent(ItemId),
    /// Processed-request counter, used to rank replicas
    RequestCount,
    /// Full state, used by joining replicas
    Snapshot,
}

impl ReplicaCall {
    pub fn name(&self) -> &'static str {
        match self {
            ReplicaCall::CreateItem(_) => "create_item",
            ReplicaCall::GetSpec(_) => "get_spec",
            ReplicaCall::GetListings => "get_listings",
            ReplicaCall::CheckClientId(_) => "check_client_id",
            ReplicaCall::Bid { .. } => "bid",
            ReplicaCall::CloseItem(_) => "close_item",
            ReplicaCall::CheckItemNonExistent(_) => "check_item_non_existent",
            ReplicaCall::RequestCount => "request_count",
            ReplicaCall::Snapshot => "snapshot",
        }
    }
}

/// One replica's answer to a [`ReplicaCall`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaReply {
    ItemId(ItemId),
    Item(Option<AuctionItem>),
    Listings(Listings),
    Flag(bool),
    Count(u64),
    Snapshot(Snapshot),
    Done,
}

impl ReplicaReply {
    pub fn kind(&self) -> &'static str {
        match self {
            ReplicaReply::ItemId(_) => "item_id",
            ReplicaReply::Item(_) => "item",
            ReplicaReply::Listings(_) => "listings",
            ReplicaReply::Flag(_) => "flag",
            ReplicaReply::Count(_) => "count",
            ReplicaReply::Snapshot(_) => "snapshot",
            ReplicaReply::Done => "done",
        }
    }

    pub fn into_item_id(self) -> Option<ItemId> {
        match self {
            ReplicaReply::ItemId(id) => Some(id),
            _ => None,
        }
    }

    pub fn into_item(self) -> Option<Option<AuctionItem>> {
        match self {
            ReplicaReply::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn into_listings(self) -> Option<Listings> {
        match self {
            ReplicaReply::Listings(listings) => Some(listings),
            _ => None,
        }
    }

    pub fn into_flag(self) -> Option<bool> {
        match self {
            ReplicaReply::Flag(flag) => Some(flag),
            _ => None,
        }
    }

    pub fn count(&self) -> Option<u64> {
        match self {
            ReplicaReply::Count(count) => Some(*count),
            _ => None,
        }
    }

    pub fn into_snapshot(self) -> Option<Snapshot> {
        match self {
            ReplicaReply::Snapshot(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}
