//! Per-replica auction state
//!
//! Every replica owns exactly one [`AuctionStore`]. Mutations (`create`,
//! `bid`, `close`, `adopt`) take the single write lock, so concurrent creates
//! can't race on the id counter and concurrent bids can't interleave.
//! Reads take the shared lock and see some past or current state.
use crate::auction::{
    Amount, AuctionItem, BidDetails, Bidder, ClientId, ClientIdRef, ItemId, Listings, NewItem,
    Snapshot,
};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Default, Debug)]
struct StoreInner {
    items: Listings,
    /// Items each client listed or bid on. A bid on a missing item
    /// is recorded as `None`.
    clients: BTreeMap<ClientId, Vec<Option<ItemId>>>,
    next_id: ItemId,
    request_count: u64,
}

impl StoreInner {
    fn index_client(&mut self, client_id: ClientIdRef, item_id: Option<ItemId>) {
        self.clients
            .entry(client_id.to_owned())
            .or_default()
            .push(item_id);
    }
}

#[derive(Default, Debug)]
pub struct AuctionStore {
    inner: RwLock<StoreInner>,
}

impl AuctionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read()
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write()
    }

    pub fn create(&self, listing: NewItem) -> ItemId {
        let mut inner = self.write();
        inner.request_count += 1;
        inner.next_id += 1;

        let id = inner.next_id;
        let seller_id = listing.seller_id.clone();
        inner.items.insert(id, AuctionItem::new(id, listing));
        inner.index_client(&seller_id, Some(id));

        debug!(item_id = id, %seller_id, "item created");
        id
    }

    pub fn get(&self, item_id: ItemId) -> Option<AuctionItem> {
        self.read().items.get(&item_id).cloned()
    }

    pub fn list_all(&self) -> Listings {
        self.read().items.clone()
    }

    /// Record a bid
    ///
    /// The price is not compared against the current highest bid; the
    /// caller is expected to have validated it.
    pub fn bid(&self, item_id: ItemId, bid: BidDetails) {
        let mut inner = self.write();
        inner.request_count += 1;

        let BidDetails {
            price,
            bidder_name,
            bidder_email,
            buyer_id,
        } = bid;

        let found = match inner.items.get_mut(&item_id) {
            Some(item) => {
                set_highest_bid(item, price, bidder_name, bidder_email);
                Some(item_id)
            }
            None => {
                debug!(item_id, %buyer_id, "bid on unknown item ignored");
                None
            }
        };
        inner.index_client(&buyer_id, found);
    }

    pub fn close(&self, item_id: ItemId) -> Option<AuctionItem> {
        let mut inner = self.write();
        inner.request_count += 1;
        inner.items.remove(&item_id)
    }

    pub fn item_exists(&self, item_id: ItemId) -> bool {
        self.read().items.contains_key(&item_id)
    }

    pub fn client_id_known(&self, client_id: ClientIdRef) -> bool {
        self.read().clients.contains_key(client_id)
    }

    pub fn request_count(&self) -> u64 {
        self.read().request_count
    }

    pub fn next_id(&self) -> ItemId {
        self.read().next_id
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.read();
        Snapshot {
            listings: inner.items.clone(),
            next_id: inner.next_id,
        }
    }

    /// Install a peer's snapshot, unless this store already holds items
    ///
    /// Only listings and the id counter are taken over. Returns whether
    /// the snapshot was installed.
    pub fn adopt(&self, snapshot: Snapshot) -> bool {
        let mut inner = self.write();
        if !inner.items.is_empty() {
            return false;
        }

        let Snapshot {
            listings,
            mut next_id,
        } = snapshot;

        if let Some(&highest) = listings.keys().next_back() {
            if next_id < highest {
                warn!(next_id, highest, "snapshot id counter behind its items");
                next_id = highest;
            }
        }

        inner.items = listings;
        inner.next_id = next_id;
        true
    }
}

fn set_highest_bid(item: &mut AuctionItem, price: Amount, name: String, email: String) {
    item.current_highest_bid = price;
    item.highest_bidder = Some(Bidder { name, email });
}
