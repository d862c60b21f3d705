use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ItemId = u64;
pub type Amount = u64;
pub type ClientId = String;
pub type ClientIdRef<'s> = &'s str;

/// All open items of one replica, keyed by id
pub type Listings = BTreeMap<ItemId, AuctionItem>;

/// Who placed the current highest bid
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bidder {
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionItem {
    pub id: ItemId,
    pub starting_price: Amount,
    pub minimum_price: Amount,
    pub description: String,
    pub seller_id: ClientId,
    pub current_highest_bid: Amount,
    /// `None` until somebody bids
    pub highest_bidder: Option<Bidder>,
}

impl AuctionItem {
    pub fn new(id: ItemId, listing: NewItem) -> Self {
        Self {
            id,
            starting_price: listing.starting_price,
            minimum_price: listing.minimum_price,
            description: listing.description,
            seller_id: listing.seller_id,
            current_highest_bid: listing.starting_price,
            highest_bidder: None,
        }
    }

    pub fn reserve_met(&self) -> bool {
        self.minimum_price <= self.current_highest_bid
    }

    /// The winning bidder, if the item were closed now
    pub fn winner(&self) -> Option<&Bidder> {
        if self.reserve_met() {
            self.highest_bidder.as_ref()
        } else {
            None
        }
    }
}

/// Everything a seller provides to list an item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub starting_price: Amount,
    pub description: String,
    pub minimum_price: Amount,
    #[serde(rename = "client_id")]
    pub seller_id: ClientId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidDetails {
    pub price: Amount,
    pub bidder_name: String,
    pub bidder_email: String,
    pub buyer_id: ClientId,
}

/// State handed over to a replica joining the group
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub listings: Listings,
    pub next_id: ItemId,
}
