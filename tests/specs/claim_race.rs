//! S1: the atomic claim race.
//!
//! Ten concurrent claimers on one item; exactly one wins, the rest see
//! AlreadyClaimed, and the hard link's owner sidecar names the winner.

use crate::prelude::Root;
use gaffer_core::{AgentId, ItemId, ItemStatus, WorkItem};
use gaffer_storage::ClaimOutcome;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn ten_concurrent_claimers_one_winner() {
    let root = Arc::new(Root::new());
    root.queue()
        .push(WorkItem::new("item-001", "task", "the contested item"))
        .unwrap();

    let claimers = 10;
    let barrier = Arc::new(Barrier::new(claimers));
    let handles: Vec<_> = (0..claimers)
        .map(|n| {
            let root = Arc::clone(&root);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let queue = root.queue();
                barrier.wait();
                let agent = AgentId::new(format!("agent-{}", n));
                (agent.clone(), queue.claim(&ItemId::new("item-001"), &agent).unwrap())
            })
        })
        .collect();

    let outcomes: Vec<(AgentId, ClaimOutcome)> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<&AgentId> = outcomes
        .iter()
        .filter(|(_, o)| *o == ClaimOutcome::Claimed)
        .map(|(a, _)| a)
        .collect();
    assert_eq!(winners.len(), 1, "exactly one Claimed");
    assert_eq!(
        outcomes
            .iter()
            .filter(|(_, o)| *o == ClaimOutcome::AlreadyClaimed)
            .count(),
        claimers - 1,
        "nine AlreadyClaimed"
    );

    // The claim file exists and its owner sidecar matches the winner.
    assert!(root.path().join("claims/item-001.claim").exists());
    let owner = std::fs::read_to_string(root.path().join("claims/item-001.claim.owner")).unwrap();
    assert_eq!(&owner, winners[0].as_str());

    let item = root.queue().get(&ItemId::new("item-001")).unwrap();
    assert_eq!(item.status, ItemStatus::Claimed);
    assert_eq!(item.claimant.as_ref(), Some(winners[0]));
}

#[test]
fn repeated_races_never_double_claim() {
    // A narrower, repeated version of the race to shake out timing luck.
    for round in 0..50 {
        let root = Arc::new(Root::new());
        let id = format!("item-{}", round);
        root.queue()
            .push(WorkItem::new(id.as_str(), "task", "contested"))
            .unwrap();

        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let root = Arc::clone(&root);
                let barrier = Arc::clone(&barrier);
                let id = id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    root.queue()
                        .claim(&ItemId::new(&id), &AgentId::new(format!("agent-{}", n)))
                        .unwrap()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| *o == ClaimOutcome::Claimed)
            .count();
        assert_eq!(wins, 1, "round {}: duplicate claim", round);
    }
}

#[test]
fn release_after_claim_restores_available() {
    // R2: release(claim(I)) leaves the item available with no claimant.
    let root = Root::new();
    let queue = root.queue();
    queue.push(WorkItem::new("item-1", "task", "t")).unwrap();

    queue
        .claim(&ItemId::new("item-1"), &AgentId::new("agent-1"))
        .unwrap();
    queue.release(&ItemId::new("item-1")).unwrap();

    let item = queue.get(&ItemId::new("item-1")).unwrap();
    assert_eq!(item.status, ItemStatus::Available);
    assert!(item.claimant.is_none());
}
