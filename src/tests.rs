mod group;
mod replica;

use crate::{
    auction::{Amount, BidDetails, NewItem},
    config::Config,
    group::{
        GroupMember, GroupTransport, InProcessGroup, MemberId, MembershipListener,
        SharedGroupTransport, View,
    },
    rpc::{ReplicaCall, ReplicaReply},
    service::{start_replicas, Replica},
};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

pub(crate) fn listing(
    starting_price: Amount,
    description: &str,
    minimum_price: Amount,
    seller_id: &str,
) -> NewItem {
    NewItem {
        starting_price,
        description: description.to_owned(),
        minimum_price,
        seller_id: seller_id.to_owned(),
    }
}

pub(crate) fn bid_by(price: Amount, name: &str, email: &str, buyer_id: &str) -> BidDetails {
    BidDetails {
        price,
        bidder_name: name.to_owned(),
        bidder_email: email.to_owned(),
        buyer_id: buyer_id.to_owned(),
    }
}

pub(crate) fn test_config() -> Config {
    Config {
        group: "test-group".to_owned(),
        dispatch_timeout: Duration::from_millis(200),
        ..Config::default()
    }
}

pub(crate) struct Cluster {
    pub group: Arc<InProcessGroup>,
    pub replicas: Vec<Arc<Replica>>,
    pub config: Config,
}

impl Cluster {
    pub fn transport(&self) -> SharedGroupTransport {
        self.group.clone()
    }
}

pub(crate) async fn cluster(replicas: usize) -> Result<Cluster> {
    let config = test_config();
    let group = InProcessGroup::new_shared(config.group.clone());
    let transport: SharedGroupTransport = group.clone();
    let replicas = start_replicas(&transport, &config, replicas).await?;
    Ok(Cluster {
        group,
        replicas,
        config,
    })
}

/// A member that answers only after `delay`
pub(crate) struct Laggard {
    pub inner: Arc<Replica>,
    pub delay: Duration,
}

#[async_trait]
impl GroupMember for Laggard {
    async fn handle(&self, call: ReplicaCall) -> ReplicaReply {
        tokio::time::sleep(self.delay).await;
        self.inner.execute(call)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Seen {
    View(View),
    Suspect(MemberId),
    Block,
    Unblock,
}

/// Records every membership callback
#[derive(Default)]
pub(crate) struct RecordingListener {
    pub seen: Mutex<Vec<Seen>>,
}

impl MembershipListener for RecordingListener {
    fn view_accepted(&self, view: &View) {
        self.seen.lock().push(Seen::View(view.clone()));
    }

    fn suspect(&self, member: &MemberId) {
        self.seen.lock().push(Seen::Suspect(member.clone()));
    }

    fn block(&self) {
        self.seen.lock().push(Seen::Block);
    }

    fn unblock(&self) {
        self.seen.lock().push(Seen::Unblock);
    }
}

pub(crate) fn member_ids(transport: &dyn GroupTransport) -> Vec<String> {
    transport
        .view()
        .members
        .iter()
        .map(|m| m.as_str().to_owned())
        .collect()
}
