//! Compression of fixed-time signal plans into extensible base plans.
//!
//! A fixed-time plan is first shifted so that the group with the longest
//! green phase starts at second zero, then stretches of the cycle in which
//! no signal changes state are spliced out, down to a minimum green time
//! between events. The seconds removed this way become the extension
//! budget the runtime controller may hand back to phases with demand.

use crate::plan::{PlanId, SignalPlan};
use crate::SignalGroupId;
use itertools::Itertools;
use log::debug;

/// Minimum green time between signal state changes, in seconds.
/// RILSA pp. 28 prescribes 5s.
pub const MIN_GREEN_SECONDS: u32 = 5;

/// Converts a fixed-time plan into a compressed base plan.
///
/// Pure and deterministic: identical input plans always yield identical
/// output plans. The caller records the extension budget as the difference
/// between the input and output cycle times.
pub fn compress_plan(fixed: &SignalPlan) -> SignalPlan {
    let mut plan = fixed.clone();
    shift_plan(&mut plan);
    compact_plan(&mut plan);
    plan
}

/// Derives the plan pair an actuated controller expects from a raw
/// fixed-time plan: the fixed-time plan itself under its prefixed ID,
/// and the compressed base plan under the PSO-prefixed ID.
pub fn prepare_plan_pair(name: &str, fixed: &SignalPlan) -> [(PlanId, SignalPlan); 2] {
    [
        (PlanId::fixed_time(name), fixed.clone()),
        (PlanId::pso(name), compress_plan(fixed)),
    ]
}

/// Shifts the plan so the group with the longest green phase has its onset
/// at second zero, adjusting the offset so the schedule is unchanged in
/// absolute time. Ties on green duration go to the lowest group ID.
///
/// Postcondition: at least one onset is 0 and no dropping is 0
/// (a dropping on the boundary is remapped to the cycle time).
fn shift_plan(plan: &mut SignalPlan) {
    let cycle = plan.cycle_time();
    let mut longest_green = 0;
    let mut longest_group = None;
    for setting in plan.settings().values() {
        let green = setting.green_time(cycle);
        if green > longest_green {
            longest_green = green;
            longest_group = Some(setting.group);
        }
    }
    let longest_group = longest_group.expect("plan has no signal group settings");
    let shift_by = plan.settings()[&longest_group].onset;
    debug!(
        "longest green is {}s on group {:?}, shifting plan start to second {}",
        longest_green, longest_group, shift_by
    );
    if shift_by == 0 {
        return;
    }
    plan.set_offset((plan.offset() + cycle - shift_by) % cycle);
    for setting in plan.settings_mut() {
        // onsets land in [0, cycle), droppings in (0, cycle]
        setting.onset = (setting.onset + cycle - shift_by) % cycle;
        let dropping = (setting.dropping + cycle - shift_by) % cycle;
        setting.dropping = if dropping == 0 { cycle } else { dropping };
    }
}

/// Scans the cycle for stretches before droppings in which no signal
/// changes state and shrinks each one to [MIN_GREEN_SECONDS].
///
/// The two orderings are snapshotted once; setting values are reread
/// through them as the plan shrinks, so cursor movement matches the
/// positions the events had when the scan started.
fn compact_plan(plan: &mut SignalPlan) {
    let by_dropping: Vec<SignalGroupId> = plan
        .settings()
        .values()
        .sorted_by(|a, b| b.dropping.cmp(&a.dropping).then(a.group.cmp(&b.group)))
        .map(|s| s.group)
        .collect();
    let by_onset: Vec<SignalGroupId> = plan
        .settings()
        .values()
        .sorted_by(|a, b| b.onset.cmp(&a.onset).then(a.group.cmp(&b.group)))
        .map(|s| s.group)
        .collect();

    if by_dropping.len() < 2 {
        return;
    }
    let mut this = 0;
    let mut next = Some(1);
    let mut onset_cursor = 0;
    while next.is_some() {
        // look for the next dropping pair with more than the minimum green
        // inbetween; closer pairs leave no room to shrink
        while let Some(n) = next {
            if dropping_of(plan, by_dropping[this]) - dropping_of(plan, by_dropping[n])
                > MIN_GREEN_SECONDS
            {
                break;
            }
            this = n;
            next = (n + 1 < by_dropping.len()).then_some(n + 1);
        }
        // the latest onset strictly before this dropping. There always is
        // one: no dropping is at second 0 and at least one onset is.
        let mut onset_group = by_onset[onset_cursor];
        onset_cursor += 1;
        while onset_of(plan, onset_group) >= dropping_of(plan, by_dropping[this]) {
            onset_group = by_onset[onset_cursor];
            onset_cursor += 1;
        }
        if dropping_of(plan, by_dropping[this]) - onset_of(plan, onset_group)
            <= MIN_GREEN_SECONDS
        {
            // nothing to remove before this dropping
            match next {
                Some(n) => this = n,
                None => break,
            }
            continue;
        }
        let shrink_start = u32::max(
            onset_of(plan, onset_group),
            next.map_or(0, |n| dropping_of(plan, by_dropping[n])),
        ) + MIN_GREEN_SECONDS;
        let shrink_end = dropping_of(plan, by_dropping[this]);
        debug!(
            "shrinking plan by {}s at the dropping of group {:?}, shifting settings behind {}",
            shrink_end - shrink_start,
            by_dropping[this],
            shrink_start
        );
        shrink_plan(plan, shrink_start, shrink_end - shrink_start);
        match next {
            Some(n) => this = n,
            None => break,
        }
    }
}

fn dropping_of(plan: &SignalPlan, group: SignalGroupId) -> u32 {
    plan.settings()[&group].dropping
}

fn onset_of(plan: &SignalPlan, group: SignalGroupId) -> u32 {
    plan.settings()[&group].onset
}

/// Removes `removed` seconds from the cycle starting at `shrink_start`:
/// every onset and dropping behind the splice moves left by that amount,
/// and the offset follows the same rule (clamped to the splice start if
/// it falls inside the removed window).
fn shrink_plan(plan: &mut SignalPlan, shrink_start: u32, removed: u32) {
    plan.set_cycle_time(plan.cycle_time() - removed);
    for setting in plan.settings_mut() {
        if setting.onset > shrink_start {
            setting.onset -= removed;
        }
        if setting.dropping > shrink_start {
            setting.dropping -= removed;
        }
    }
    if plan.offset() > shrink_start + removed {
        plan.set_offset(plan.offset() - removed);
    } else if plan.offset() > shrink_start {
        plan.set_offset(shrink_start);
    }
}
