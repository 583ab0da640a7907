//! Signal plan value types.

use crate::SignalGroupId;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The green window of a single signal group within a plan.
///
/// Seconds are relative to the cycle: the onset lies in `[0, cycle_time)`
/// and the dropping in `(0, cycle_time]`. A dropping at or before the onset
/// denotes a green phase that wraps around the cycle boundary.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalGroupSetting {
    /// The signal group this setting schedules.
    pub group: SignalGroupId,
    /// The second in the cycle the group turns green.
    pub onset: u32,
    /// The second in the cycle the group turns red.
    pub dropping: u32,
}

impl SignalGroupSetting {
    /// The green duration in seconds, accounting for wraparound.
    pub fn green_time(&self, cycle_time: u32) -> u32 {
        if self.dropping > self.onset {
            self.dropping - self.onset
        } else {
            self.dropping + cycle_time - self.onset
        }
    }
}

/// A signal plan: a cycle time, a global offset and one green window
/// per signal group. Immutable once constructed.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalPlan {
    cycle_time: u32,
    offset: u32,
    settings: BTreeMap<SignalGroupId, SignalGroupSetting>,
}

impl SignalPlan {
    /// Creates a plan from its group settings.
    /// Later settings for the same group replace earlier ones.
    pub fn new(
        cycle_time: u32,
        offset: u32,
        settings: impl IntoIterator<Item = SignalGroupSetting>,
    ) -> Self {
        debug_assert!(cycle_time > 0, "cycle time must be positive");
        let settings = settings.into_iter().map(|s| (s.group, s)).collect();
        Self {
            cycle_time,
            offset,
            settings,
        }
    }

    /// The total seconds per plan period.
    pub fn cycle_time(&self) -> u32 {
        self.cycle_time
    }

    /// The global time shift applied to the schedule.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The green windows, keyed by signal group, in ascending group order.
    pub fn settings(&self) -> &BTreeMap<SignalGroupId, SignalGroupSetting> {
        &self.settings
    }

    /// The green window of one group, if the plan schedules it.
    pub fn setting(&self, group: SignalGroupId) -> Option<&SignalGroupSetting> {
        self.settings.get(&group)
    }

    pub(crate) fn set_cycle_time(&mut self, cycle_time: u32) {
        self.cycle_time = cycle_time;
    }

    pub(crate) fn set_offset(&mut self, offset: u32) {
        self.offset = offset;
    }

    pub(crate) fn settings_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut SignalGroupSetting> {
        self.settings.values_mut()
    }
}

/// Identifier of a signal plan within a controller's plan collection.
///
/// Actuated controllers expect two plans per signal system, distinguished
/// by prefix: the untouched fixed-time plan and the compressed base plan
/// derived from it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlanId(String);

/// Prefix of plan IDs holding an unmodified fixed-time plan.
pub const FIXED_TIME_PREFIX: &str = "fixed_time_plan_";
/// Prefix of plan IDs holding a compressed base plan.
pub const PSO_PREFIX: &str = "pso_plan_";

impl PlanId {
    /// Creates a plan ID verbatim.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The fixed-time plan ID derived from a raw plan name.
    pub fn fixed_time(name: &str) -> Self {
        Self(format!("{}{}", FIXED_TIME_PREFIX, name))
    }

    /// The base (PSO) plan ID derived from a raw plan name.
    pub fn pso(name: &str) -> Self {
        Self(format!("{}{}", PSO_PREFIX, name))
    }

    /// Whether this ID names a fixed-time plan.
    pub fn is_fixed_time(&self) -> bool {
        self.0.starts_with(FIXED_TIME_PREFIX)
    }

    /// Whether this ID names a base (PSO) plan.
    pub fn is_pso(&self) -> bool {
        self.0.starts_with(PSO_PREFIX)
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use slotmap::KeyData;

    fn group(n: u64) -> SignalGroupId {
        KeyData::from_ffi(n).into()
    }

    #[test]
    fn green_time_without_wrap() {
        let setting = SignalGroupSetting {
            group: group(1),
            onset: 10,
            dropping: 40,
        };
        assert_eq!(setting.green_time(60), 30);
    }

    #[test]
    fn green_time_with_wrap() {
        let setting = SignalGroupSetting {
            group: group(1),
            onset: 50,
            dropping: 20,
        };
        assert_eq!(setting.green_time(60), 30);
    }

    #[test]
    fn full_cycle_green_when_onset_equals_dropping() {
        let setting = SignalGroupSetting {
            group: group(1),
            onset: 15,
            dropping: 15,
        };
        assert_eq!(setting.green_time(60), 60);
    }

    #[test]
    fn one_setting_per_group() {
        let g = group(1);
        let plan = SignalPlan::new(
            60,
            0,
            [
                SignalGroupSetting {
                    group: g,
                    onset: 0,
                    dropping: 30,
                },
                SignalGroupSetting {
                    group: g,
                    onset: 10,
                    dropping: 40,
                },
            ],
        );
        assert_eq!(plan.settings().len(), 1);
        assert_eq!(plan.setting(g).unwrap().onset, 10);
    }

    #[test]
    fn plan_id_prefixes() {
        assert!(PlanId::fixed_time("p1").is_fixed_time());
        assert!(!PlanId::fixed_time("p1").is_pso());
        assert!(PlanId::pso("p1").is_pso());
        assert!(!PlanId::new("p1").is_fixed_time());
    }
}
