use super::{bid_by, cluster, listing, test_config, Laggard};
use crate::{
    auction::Snapshot,
    group::{GroupTransport, InProcessGroup, MemberId, SharedGroupTransport},
    rpc::{ReplicaCall, ReplicaReply},
    service::Replica,
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};

#[tokio::test]
async fn first_replica_starts_empty() -> Result<()> {
    let cluster = cluster(1).await?;
    let replica = &cluster.replicas[0];

    assert!(replica.store().list_all().is_empty());
    assert_eq!(replica.store().next_id(), 0);
    assert_eq!(
        cluster.group.view().members,
        vec![MemberId::new("test-group-replica-1")]
    );
    Ok(())
}

#[tokio::test]
async fn peer_slower_than_timeout_leaves_newcomer_empty() -> Result<()> {
    let group = InProcessGroup::new_shared("slow-peers");
    let transport: SharedGroupTransport = group.clone();
    let peer = Arc::new(Replica::new(MemberId::new("peer")));
    peer.store().create(listing(10, "itemX", 5, "S1"));
    group.join(
        MemberId::new("peer"),
        Arc::new(Laggard {
            inner: peer.clone(),
            delay: Duration::from_millis(300),
        }),
    )?;

    let newcomer = Replica::start(
        MemberId::new("newcomer"),
        transport,
        Duration::from_millis(50),
    )
    .await?;

    assert!(newcomer.store().list_all().is_empty());
    assert_eq!(newcomer.store().next_id(), 0);
    assert_eq!(group.view().members.len(), 2);
    Ok(())
}

#[tokio::test]
async fn joining_replica_copies_peer_state() -> Result<()> {
    let cluster = cluster(1).await?;
    let first = &cluster.replicas[0];
    first.store().create(listing(10, "itemX", 5, "S1"));
    first.store().create(listing(20, "itemY", 5, "S1"));

    let second = Replica::start(
        MemberId::new("second"),
        cluster.transport(),
        cluster.config.dispatch_timeout,
    )
    .await?;

    assert_eq!(second.store().list_all(), first.store().list_all());
    assert_eq!(
        second.store().list_all().keys().copied().collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(second.store().create(listing(1, "z", 1, "S2")), 3);
    Ok(())
}

#[tokio::test]
async fn empty_peer_state_still_carries_id_counter() -> Result<()> {
    let cluster = cluster(1).await?;
    let first = &cluster.replicas[0];
    let id = first.store().create(listing(10, "gone", 5, "S1"));
    first.store().close(id);

    let second = Replica::start(
        MemberId::new("second"),
        cluster.transport(),
        cluster.config.dispatch_timeout,
    )
    .await?;

    assert!(second.store().list_all().is_empty());
    assert_eq!(second.store().create(listing(1, "new", 1, "S2")), 2);
    Ok(())
}

#[tokio::test]
async fn first_non_empty_snapshot_is_adopted() -> Result<()> {
    let config = test_config();
    let group = InProcessGroup::new_shared("mixed");
    let transport: SharedGroupTransport = group.clone();

    let empty = Replica::start(MemberId::new("empty"), transport.clone(), config.dispatch_timeout)
        .await?;
    // joined while `empty` had nothing, then diverged
    let full = Replica::start(MemberId::new("full"), transport.clone(), config.dispatch_timeout)
        .await?;
    full.store().create(listing(5, "only on full", 1, "S1"));

    let newcomer = Replica::start(MemberId::new("new"), transport, config.dispatch_timeout).await?;

    assert!(empty.store().list_all().is_empty());
    assert_eq!(newcomer.store().list_all(), full.store().list_all());
    Ok(())
}

#[tokio::test]
async fn bootstrap_skips_store_that_already_has_items() -> Result<()> {
    let cluster = cluster(1).await?;
    cluster.replicas[0]
        .store()
        .create(listing(10, "peer item", 5, "S1"));

    let replica = Replica::new(MemberId::new("busy"));
    replica.store().create(listing(1, "mine", 1, "S9"));

    assert!(
        !replica
            .bootstrap(&cluster.transport(), cluster.config.dispatch_timeout)
            .await
    );
    assert_eq!(replica.store().get(1).map(|i| i.description), Some("mine".into()));
    Ok(())
}

#[test]
fn replica_answers_calls_from_its_store() {
    let replica = Replica::new(MemberId::new("r"));

    assert_eq!(
        replica.execute(ReplicaCall::CreateItem(listing(100, "desk", 50, "S1"))),
        ReplicaReply::ItemId(1)
    );
    assert_eq!(
        replica.execute(ReplicaCall::Bid {
            item_id: 1,
            bid: bid_by(150, "Alice", "a@x.com", "B1"),
        }),
        ReplicaReply::Done
    );
    assert_eq!(
        replica.execute(ReplicaCall::CheckClientId("B1".into())),
        ReplicaReply::Flag(true)
    );
    assert_eq!(
        replica.execute(ReplicaCall::CheckItemNonExistent(1)),
        ReplicaReply::Flag(false)
    );
    assert_eq!(
        replica.execute(ReplicaCall::RequestCount),
        ReplicaReply::Count(2)
    );

    let ReplicaReply::Snapshot(Snapshot { listings, next_id }) =
        replica.execute(ReplicaCall::Snapshot)
    else {
        panic!("expected a snapshot");
    };
    assert_eq!(next_id, 1);
    assert_eq!(listings[&1].current_highest_bid, 150);

    assert!(matches!(
        replica.execute(ReplicaCall::CloseItem(1)),
        ReplicaReply::Item(Some(item)) if item.id == 1
    ));
    assert_eq!(
        replica.execute(ReplicaCall::CheckItemNonExistent(1)),
        ReplicaReply::Flag(true)
    );
    assert_eq!(
        replica.execute(ReplicaCall::GetSpec(1)),
        ReplicaReply::Item(None)
    );
}
