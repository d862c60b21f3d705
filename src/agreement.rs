//! Agreement check and reliability ranking
//!
//! Replicas answer every broadcast independently. [`check_agreement`]
//! decides whether their answers are consistent; when they are not,
//! [`most_reliable`] names the member whose answer wins.
use crate::{group::MemberId, rpc::ReplicaReply};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How listings maps are compared
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingsAgreement {
    /// A listings answer agrees with whatever follows it
    #[default]
    Permissive,
    /// Listings must be structurally equal
    Strict,
}

impl FromStr for ListingsAgreement {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "1" | "true" | "strict" | "yes" => ListingsAgreement::Strict,
            _ => ListingsAgreement::Permissive,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Agreement {
    Agree,
    /// `position` is the index of the first value that differs from
    /// its predecessor
    Disagree { position: usize },
}

impl Agreement {
    pub fn is_agree(self) -> bool {
        self == Agreement::Agree
    }
}

fn agrees(previous: &ReplicaReply, next: &ReplicaReply, listings: ListingsAgreement) -> bool {
    match (previous, listings) {
        (ReplicaReply::Listings(_), ListingsAgreement::Permissive) => true,
        _ => previous == next,
    }
}

/// Compare each answer against the one before it, left to right
///
/// Stops at the first mismatch. Empty and single-element sequences agree.
pub fn check_agreement<'a, I>(values: I, listings: ListingsAgreement) -> Agreement
where
    I: IntoIterator<Item = &'a ReplicaReply>,
{
    let mut values = values.into_iter();
    let Some(mut previous) = values.next() else {
        return Agreement::Agree;
    };

    for (i, next) in values.enumerate() {
        if !agrees(previous, next, listings) {
            return Agreement::Disagree { position: i + 1 };
        }
        previous = next;
    }

    Agreement::Agree
}

/// The member that processed the most requests
///
/// Only a strictly higher count replaces the current pick, so the
/// first member wins ties. Members reporting 0 are never picked.
pub fn most_reliable<'a, I>(counts: I) -> Option<&'a MemberId>
where
    I: IntoIterator<Item = (&'a MemberId, u64)>,
{
    let mut best = None;
    let mut highest = 0;
    for (member, count) in counts {
        if count > highest {
            highest = count;
            best = Some(member);
        }
    }
    best
}
