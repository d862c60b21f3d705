use super::{member_ids, Laggard, RecordingListener, Seen};
use crate::{
    group::{GroupTransport, InProcessGroup, MemberId, TransportError, View},
    rpc::{ReplicaCall, ReplicaReply},
    service::Replica,
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};

#[tokio::test]
async fn broadcast_to_empty_group_has_no_responses() -> Result<()> {
    let group = InProcessGroup::new("empty");

    let responses = group
        .broadcast(ReplicaCall::RequestCount, Duration::from_millis(50))
        .await?;

    assert!(responses.is_empty());
    assert!(responses.missing().is_empty());
    Ok(())
}

#[tokio::test]
async fn responses_follow_view_order() -> Result<()> {
    let group = InProcessGroup::new("ordered");
    for name in ["a", "b", "c"] {
        group.join(
            MemberId::new(name),
            Arc::new(Replica::new(MemberId::new(name))),
        )?;
    }

    let responses = group
        .broadcast(ReplicaCall::RequestCount, Duration::from_millis(200))
        .await?;

    let members: Vec<_> = responses.iter().map(|(m, _)| m.as_str()).collect();
    assert_eq!(members, vec!["a", "b", "c"]);
    assert!(responses.values().all(|r| *r == ReplicaReply::Count(0)));
    Ok(())
}

#[tokio::test]
async fn late_answers_are_dropped() -> Result<()> {
    let group = InProcessGroup::new("slow");
    let fast = Arc::new(Replica::new(MemberId::new("fast")));
    let slow = Arc::new(Replica::new(MemberId::new("slow")));
    group.join(MemberId::new("fast"), fast.clone())?;
    group.join(
        MemberId::new("slow"),
        Arc::new(Laggard {
            inner: slow.clone(),
            delay: Duration::from_millis(300),
        }),
    )?;

    let responses = group
        .broadcast(
            ReplicaCall::CreateItem(super::listing(1, "x", 1, "S1")),
            Duration::from_millis(50),
        )
        .await?;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses.first(), Some(&ReplicaReply::ItemId(1)));
    assert_eq!(responses.missing(), &[MemberId::new("slow")]);

    // the slow member keeps working and applies the call anyway
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(slow.store().next_id(), 1);
    Ok(())
}

#[tokio::test]
async fn view_changes_are_announced() -> Result<()> {
    let group = InProcessGroup::new("views");
    let listener = Arc::new(RecordingListener::default());
    group.subscribe(listener.clone());

    let a = MemberId::new("a");
    group.join(a.clone(), Arc::new(Replica::new(a.clone())))?;
    group.suspect(&a)?;
    group.leave(&a)?;

    assert_eq!(
        *listener.seen.lock(),
        vec![
            Seen::Block,
            Seen::View(View {
                id: 1,
                members: vec![a.clone()]
            }),
            Seen::Unblock,
            Seen::Suspect(a.clone()),
            Seen::Block,
            Seen::View(View {
                id: 2,
                members: vec![]
            }),
            Seen::Unblock,
        ]
    );
    Ok(())
}

#[test]
fn membership_errors() -> Result<()> {
    let group = InProcessGroup::new("errors");
    let a = MemberId::new("a");
    group.join(a.clone(), Arc::new(Replica::new(a.clone())))?;

    assert_eq!(
        group.join(a.clone(), Arc::new(Replica::new(a.clone()))),
        Err(TransportError::DuplicateMember(a.clone()))
    );
    let ghost = MemberId::new("ghost");
    assert_eq!(
        group.leave(&ghost),
        Err(TransportError::UnknownMember(ghost.clone()))
    );
    assert_eq!(
        group.suspect(&ghost),
        Err(TransportError::UnknownMember(ghost))
    );
    assert_eq!(member_ids(&group), vec!["a"]);
    Ok(())
}

#[test]
fn view_displays_members() {
    let view = View {
        id: 3,
        members: vec![MemberId::new("a"), MemberId::new("b")],
    };
    assert_eq!(view.to_string(), "[3] (a, b)");
}
