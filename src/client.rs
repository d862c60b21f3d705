//! Seller and buyer side of the coordinator API
//!
//! The coordinator and replicas trust their callers: a bid is recorded
//! whatever its price and anyone may close any item. The checks live
//! here instead, on the client side.
use crate::{
    auction::{Amount, AuctionItem, BidDetails, ClientId, ItemId, NewItem},
    service::SharedCoordinator,
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserError {
    #[error("item {0} has already been closed or does not exist")]
    ItemClosed(ItemId),
    #[error("bid of {offered} is not higher than the current highest bid of {current}")]
    TooLow { offered: Amount, current: Amount },
    #[error("{client} is not the seller of item {item}")]
    NotSeller { client: ClientId, item: ItemId },
}

/// What happened to a closed item
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Reserve met by a bidder
    Winner(AuctionItem),
    /// Reserve not reached
    NoWinner(AuctionItem),
}

impl CloseOutcome {
    pub fn item(&self) -> &AuctionItem {
        match self {
            CloseOutcome::Winner(item) | CloseOutcome::NoWinner(item) => item,
        }
    }
}

pub struct AuctionClient {
    coordinator: SharedCoordinator,
    client_id: ClientId,
}

impl AuctionClient {
    /// Pick the first `{prefix}{n}` id no replica knows about yet
    ///
    /// A client id becomes known only once it lists or bids on something,
    /// so two clients registering at the same time can end up sharing one.
    pub async fn register(coordinator: SharedCoordinator, prefix: &str) -> Self {
        let mut n = 1u64;
        let client_id = loop {
            let candidate = format!("{prefix}{n}");
            if !coordinator.check_client_id(&candidate).await {
                break candidate;
            }
            debug!(%candidate, "client id taken");
            n += 1;
        };
        info!(%client_id, "client registered");
        Self {
            coordinator,
            client_id,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub async fn list_item(
        &self,
        starting_price: Amount,
        description: &str,
        minimum_price: Amount,
    ) -> ItemId {
        self.coordinator
            .create_item(NewItem {
                starting_price,
                description: description.to_owned(),
                minimum_price,
                seller_id: self.client_id.clone(),
            })
            .await
    }

    /// Bid on an open item, only if `price` beats the current highest bid
    pub async fn place_bid(
        &self,
        item_id: ItemId,
        price: Amount,
        name: &str,
        email: &str,
    ) -> Result<(), UserError> {
        let item = self.open_item(item_id).await?;
        if price <= item.current_highest_bid {
            return Err(UserError::TooLow {
                offered: price,
                current: item.current_highest_bid,
            });
        }

        self.coordinator
            .bid(
                item_id,
                BidDetails {
                    price,
                    bidder_name: name.to_owned(),
                    bidder_email: email.to_owned(),
                    buyer_id: self.client_id.clone(),
                },
            )
            .await;
        Ok(())
    }

    /// Close one of our own items and report the winner, if any
    pub async fn close(&self, item_id: ItemId) -> Result<CloseOutcome, UserError> {
        let item = self.open_item(item_id).await?;
        if item.seller_id != self.client_id {
            return Err(UserError::NotSeller {
                client: self.client_id.clone(),
                item: item_id,
            });
        }

        let closed = self
            .coordinator
            .close_item(item_id)
            .await
            .ok_or(UserError::ItemClosed(item_id))?;

        Ok(if closed.winner().is_some() {
            CloseOutcome::Winner(closed)
        } else {
            CloseOutcome::NoWinner(closed)
        })
    }

    async fn open_item(&self, item_id: ItemId) -> Result<AuctionItem, UserError> {
        if self.coordinator.check_item_non_existent(item_id).await {
            return Err(UserError::ItemClosed(item_id));
        }
        self.coordinator
            .get_listings()
            .await
            .remove(&item_id)
            .ok_or(UserError::ItemClosed(item_id))
    }
}
