//! Timed decision points at which a green phase may be held open.

use crate::plan::SignalPlan;
use crate::SignalGroupId;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A second in the base plan cycle at which one or more signal groups
/// drop, and at which the controller may instead extend their green
/// phase. Carries the per-group cap on continuous green time.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtensionPoint {
    second_in_cycle: u32,
    /// Maximum green seconds per group; `u32::MAX` means unbounded.
    max_green: BTreeMap<SignalGroupId, u32>,
    forced: bool,
}

impl ExtensionPoint {
    fn new(second_in_cycle: u32) -> Self {
        Self {
            second_in_cycle,
            max_green: BTreeMap::new(),
            forced: false,
        }
    }

    /// The second in the base plan cycle this point triggers at.
    pub fn second_in_cycle(&self) -> u32 {
        self.second_in_cycle
    }

    /// The signal groups dropping at this second.
    pub fn groups(&self) -> impl Iterator<Item = SignalGroupId> + '_ {
        self.max_green.keys().copied()
    }

    /// The per-group caps on continuous green time.
    pub fn max_green(&self) -> &BTreeMap<SignalGroupId, u32> {
        &self.max_green
    }

    /// Whether this is the terminal point of the cycle, extended on the
    /// remaining time budget alone, without consulting sensors.
    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub(crate) fn demote(&mut self) {
        self.forced = false;
    }
}

/// Derives the extension points of a base plan.
///
/// Each group's dropping maps to the instant `(dropping + offset) % cycle`;
/// groups dropping at the same instant share one point. The per-group max
/// green time is the group's green time in the original fixed-time plan
/// scaled by `max_green_scale`, or unbounded when no scale is given.
///
/// The point with the largest instant is removed from the regular map and
/// returned separately as the forced point. Exactly one point per plan is
/// forced.
pub fn calculate_extension_points(
    fixed: &SignalPlan,
    base: &SignalPlan,
    max_green_scale: Option<f64>,
) -> (BTreeMap<u32, ExtensionPoint>, ExtensionPoint) {
    let mut points: BTreeMap<u32, ExtensionPoint> = BTreeMap::new();
    for setting in base.settings().values() {
        let instant = (setting.dropping + base.offset()) % base.cycle_time();
        let point = points
            .entry(instant)
            .or_insert_with(|| ExtensionPoint::new(instant));
        let fixed_setting = fixed
            .setting(setting.group)
            .expect("base plan group is missing from the fixed-time plan");
        let fixed_green = fixed_setting.green_time(fixed.cycle_time());
        let max_green = match max_green_scale {
            Some(scale) => (fixed_green as f64 * scale) as u32,
            None => u32::MAX,
        };
        point.max_green.insert(setting.group, max_green);
    }
    let (&last, _) = points
        .iter()
        .next_back()
        .expect("plan has no signal group settings");
    let mut forced = points.remove(&last).expect("last instant is present");
    forced.forced = true;
    (points, forced)
}
