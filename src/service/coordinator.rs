//! Coordinator
//!
//! The single entry point clients talk to. It holds no auction state:
//! every operation is broadcast to the replicas and their answers are
//! reconciled into one.
//!
//! Failures never reach the client as errors. They are logged and the
//! operation returns its sentinel value (`0`, `None`, an empty map or
//! `false`), so a caller can't tell "no such item" from "the replicas
//! could not be reached".
use crate::{
    agreement::{check_agreement, most_reliable, Agreement, ListingsAgreement},
    auction::{AuctionItem, BidDetails, ClientIdRef, ItemId, Listings, NewItem},
    config::Config,
    group::{
        LoggingMembershipListener, ResponseSet, SharedGroupTransport, SharedMembershipListener,
        TransportError,
    },
    rpc::{ReplicaCall, ReplicaReply},
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("no replica answered {call}")]
    NoResponses { call: &'static str },
    #[error("unexpected {kind} reply to {call}")]
    UnexpectedReply {
        call: &'static str,
        kind: &'static str,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub struct Coordinator {
    transport: SharedGroupTransport,
    timeout: Duration,
    listings_agreement: ListingsAgreement,
}

pub type SharedCoordinator = Arc<Coordinator>;

impl Coordinator {
    /// A coordinator that logs membership changes
    pub fn new(transport: SharedGroupTransport, config: &Config) -> Self {
        Self::with_membership_listener(
            transport,
            config,
            Arc::new(LoggingMembershipListener),
        )
    }

    pub fn with_membership_listener(
        transport: SharedGroupTransport,
        config: &Config,
        listener: SharedMembershipListener,
    ) -> Self {
        transport.subscribe(listener);
        Self {
            transport,
            timeout: config.dispatch_timeout,
            listings_agreement: config.listings_agreement,
        }
    }

    pub fn new_shared(transport: SharedGroupTransport, config: &Config) -> SharedCoordinator {
        Arc::new(Self::new(transport, config))
    }

    pub async fn create_item(&self, listing: NewItem) -> ItemId {
        let call = ReplicaCall::CreateItem(listing);
        let name = call.name();
        let reply = self.reconcile(call).await;
        or_sentinel(
            name,
            reply.and_then(|reply| expect_reply(name, reply, ReplicaReply::into_item_id)),
        )
    }

    pub async fn get_spec(&self, item_id: ItemId) -> Option<AuctionItem> {
        let call = ReplicaCall::GetSpec(item_id);
        let name = call.name();
        let reply = self.reconcile(call).await;
        or_sentinel(
            name,
            reply.and_then(|reply| expect_reply(name, reply, ReplicaReply::into_item)),
        )
    }

    pub async fn get_listings(&self) -> Listings {
        let call = ReplicaCall::GetListings;
        let name = call.name();
        let reply = self.reconcile(call).await;
        or_sentinel(
            name,
            reply.and_then(|reply| expect_reply(name, reply, ReplicaReply::into_listings)),
        )
    }

    pub async fn check_client_id(&self, client_id: ClientIdRef<'_>) -> bool {
        let call = ReplicaCall::CheckClientId(client_id.to_owned());
        let name = call.name();
        let reply = self.reconcile(call).await;
        or_sentinel(
            name,
            reply.and_then(|reply| expect_reply(name, reply, ReplicaReply::into_flag)),
        )
    }

    pub async fn check_item_non_existent(&self, item_id: ItemId) -> bool {
        let call = ReplicaCall::CheckItemNonExistent(item_id);
        let name = call.name();
        let reply = self.reconcile(call).await;
        or_sentinel(
            name,
            reply.and_then(|reply| expect_reply(name, reply, ReplicaReply::into_flag)),
        )
    }

    /// Broadcast a bid without comparing the answers
    pub async fn bid(&self, item_id: ItemId, bid: BidDetails) {
        let call = ReplicaCall::Bid { item_id, bid };
        let name = call.name();
        if let Err(e) = self.dispatch(call).await {
            warn!(call = name, error = %e, "bid dispatch failed");
        }
    }

    /// Broadcast a close and return the first answer
    pub async fn close_item(&self, item_id: ItemId) -> Option<AuctionItem> {
        let call = ReplicaCall::CloseItem(item_id);
        let name = call.name();
        let reply = self.dispatch(call).await.and_then(|responses| {
            responses
                .into_first()
                .ok_or(CoordinatorError::NoResponses { call: name })
        });
        or_sentinel(
            name,
            reply.and_then(|reply| expect_reply(name, reply, ReplicaReply::into_item)),
        )
    }

    async fn dispatch(
        &self,
        call: ReplicaCall,
    ) -> Result<ResponseSet<ReplicaReply>, CoordinatorError> {
        let name = call.name();
        let responses = self.transport.broadcast(call, self.timeout).await?;
        if !responses.missing().is_empty() {
            warn!(call = name, missing = ?responses.missing(), "partial response set");
        }
        if responses.is_empty() {
            return Err(CoordinatorError::NoResponses { call: name });
        }
        Ok(responses)
    }

    /// Broadcast `call` and settle on one answer
    async fn reconcile(&self, call: ReplicaCall) -> Result<ReplicaReply, CoordinatorError> {
        let name = call.name();
        let responses = self.dispatch(call).await?;

        match check_agreement(responses.values(), self.listings_agreement) {
            Agreement::Agree => {
                debug!(call = name, replicas = responses.len(), "replicas agree");
                responses
                    .into_first()
                    .ok_or(CoordinatorError::NoResponses { call: name })
            }
            Agreement::Disagree { position } => {
                info!(call = name, position, "replicas disagree, arbitrating");
                self.arbitrate(name, responses).await
            }
        }
    }

    /// Pick the answer of the replica that processed the most requests
    ///
    /// Falls back to the first answer when no replica qualifies.
    async fn arbitrate(
        &self,
        name: &'static str,
        responses: ResponseSet<ReplicaReply>,
    ) -> Result<ReplicaReply, CoordinatorError> {
        let chosen = match self
            .transport
            .broadcast(ReplicaCall::RequestCount, self.timeout)
            .await
        {
            Ok(counts) => most_reliable(
                counts
                    .iter()
                    .filter_map(|(member, reply)| reply.count().map(|count| (member, count))),
            )
            .cloned(),
            Err(e) => {
                warn!(call = name, error = %e, "request count query failed");
                None
            }
        };

        match chosen {
            Some(member) if responses.get(&member).is_some() => {
                info!(call = name, %member, "using answer of most reliable replica");
                responses
                    .into_value(&member)
                    .ok_or(CoordinatorError::NoResponses { call: name })
            }
            chosen => {
                warn!(
                    call = name,
                    chosen = ?chosen,
                    "no usable arbitration candidate, using first answer"
                );
                responses
                    .into_first()
                    .ok_or(CoordinatorError::NoResponses { call: name })
            }
        }
    }
}

fn expect_reply<T>(
    call: &'static str,
    reply: ReplicaReply,
    f: impl FnOnce(ReplicaReply) -> Option<T>,
) -> Result<T, CoordinatorError> {
    let kind = reply.kind();
    f(reply).ok_or(CoordinatorError::UnexpectedReply { call, kind })
}

fn or_sentinel<T: Default>(call: &'static str, res: Result<T, CoordinatorError>) -> T {
    res.unwrap_or_else(|e| {
        warn!(call, error = %e, "returning default");
        T::default()
    })
}
