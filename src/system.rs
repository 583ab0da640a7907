//! Signal system topology: which signals belong to which group, and
//! which links and lanes they watch.

use crate::plan::{PlanId, SignalPlan};
use crate::{LaneId, LinkId, SignalGroupId, SignalSystemId};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// A single signal head: the link it controls and, where the link is
/// split into lanes, the lanes it applies to.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Signal {
    /// The approach link the signal stands on.
    pub link: LinkId,
    /// The lanes the signal applies to; empty when the whole link is
    /// controlled as one.
    pub lanes: SmallVec<[LaneId; 2]>,
}

impl Signal {
    /// A signal controlling a whole link.
    pub fn on_link(link: LinkId) -> Self {
        Self {
            link,
            lanes: SmallVec::new(),
        }
    }

    /// A signal controlling specific lanes of a link.
    pub fn on_lanes(link: LinkId, lanes: impl IntoIterator<Item = LaneId>) -> Self {
        Self {
            link,
            lanes: lanes.into_iter().collect(),
        }
    }
}

/// A set of signals sharing one green/red schedule.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalGroup {
    /// The signals switched together by this group.
    pub signals: Vec<Signal>,
}

impl SignalGroup {
    /// Creates a group from its signals.
    pub fn new(signals: impl IntoIterator<Item = Signal>) -> Self {
        Self {
            signals: signals.into_iter().collect(),
        }
    }
}

/// One controlled intersection: its signal groups and the plans its
/// controller may run. Each system is owned by exactly one controller.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalSystem {
    id: SignalSystemId,
    groups: BTreeMap<SignalGroupId, SignalGroup>,
    plans: BTreeMap<PlanId, SignalPlan>,
}

impl SignalSystem {
    /// Creates an empty signal system.
    pub fn new(id: SignalSystemId) -> Self {
        Self {
            id,
            groups: BTreeMap::new(),
            plans: BTreeMap::new(),
        }
    }

    /// The system's ID.
    pub fn id(&self) -> SignalSystemId {
        self.id
    }

    /// Adds a signal group. A group added twice replaces its signals.
    pub fn add_group(&mut self, id: SignalGroupId, group: SignalGroup) -> &mut Self {
        self.groups.insert(id, group);
        self
    }

    /// Adds a plan to the collection the controller picks from.
    pub fn add_plan(&mut self, id: PlanId, plan: SignalPlan) -> &mut Self {
        self.plans.insert(id, plan);
        self
    }

    /// The signal groups, in ascending group order.
    pub fn groups(&self) -> &BTreeMap<SignalGroupId, SignalGroup> {
        &self.groups
    }

    /// One signal group, if present.
    pub fn group(&self, id: SignalGroupId) -> Option<&SignalGroup> {
        self.groups.get(&id)
    }

    /// The plan collection.
    pub fn plans(&self) -> &BTreeMap<PlanId, SignalPlan> {
        &self.plans
    }
}
