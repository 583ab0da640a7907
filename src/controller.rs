//! Runtime signal controllers.
//!
//! A controller owns one [SignalSystem] and is driven synchronously by the
//! host simulation, once per simulated second. The actuated controller
//! runs a compressed base plan and decides each second whether to hold a
//! green phase open, based on detector occupancy, the remaining per-cycle
//! time budget and per-group maximum green times.

use crate::config::ActuatedConfig;
use crate::extension::{calculate_extension_points, ExtensionPoint};
use crate::plan::SignalPlan;
use crate::sensor::{DownstreamSensor, SignalActuator, VehicleSensor};
use crate::system::SignalSystem;
use crate::{SignalGroupId, SignalSystemId};
use log::debug;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use thiserror::Error;

/// A fatal controller setup error. Once initialization has succeeded,
/// ticking a controller never fails.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum ControlError {
    /// Actuated control does not support switching plans by time of day.
    #[error("signal system {0:?} has {1} signal plans; multiple plans for different times of the day are not supported")]
    TooManyPlans(SignalSystemId, usize),
    /// The plan collection lacks a fixed-time plan.
    #[error("signal system {0:?} has no fixed-time signal plan")]
    MissingFixedTimePlan(SignalSystemId),
    /// The plan collection lacks a compressed base plan.
    #[error("signal system {0:?} has no base (pso) signal plan")]
    MissingBasePlan(SignalSystemId),
    /// The plan collection is empty.
    #[error("signal system {0:?} has no signal plan to run")]
    NoPlan(SignalSystemId),
}

/// A signal controller driven by the host simulation's clock.
pub trait SignalController {
    /// Called once when the host simulation is initialized, before the
    /// first tick. Collects the plans to run, derives extension points
    /// and registers all detectors the controller will ever query.
    fn simulation_initialized(&mut self, start_time: f64) -> Result<(), ControlError>;

    /// Advances the controller by one simulated second and emits onset
    /// and dropping commands to `actuator`.
    ///
    /// Precondition: called exactly once per simulated second with
    /// strictly increasing times. Repeated or skipped seconds leave the
    /// controller out of step with its plan.
    fn update_state(&mut self, current_time: f64, actuator: &mut dyn SignalActuator);
}

/// Selects the controller implementation for a signal system.
pub enum ControllerKind {
    /// Drives a single plan verbatim.
    FixedTime,
    /// Runs a compressed base plan with sensor-driven green extension.
    Actuated {
        config: ActuatedConfig,
        sensors: Box<dyn VehicleSensor>,
        downstream: Box<dyn DownstreamSensor>,
    },
}

/// Creates the controller for one signal system.
pub fn create_signal_controller(
    kind: ControllerKind,
    system: SignalSystem,
) -> Box<dyn SignalController> {
    match kind {
        ControllerKind::FixedTime => Box::new(FixedTimeController::new(system)),
        ControllerKind::Actuated {
            config,
            sensors,
            downstream,
        } => Box::new(ActuatedController::new(system, config, sensors, downstream)),
    }
}

type GroupList = SmallVec<[SignalGroupId; 2]>;

/// A plan expanded into per-second switching events, offset applied.
struct Schedule {
    cycle_time: u32,
    onsets: BTreeMap<u32, GroupList>,
    droppings: BTreeMap<u32, GroupList>,
}

impl Schedule {
    fn new(plan: &SignalPlan) -> Self {
        let mut onsets: BTreeMap<u32, GroupList> = BTreeMap::new();
        let mut droppings: BTreeMap<u32, GroupList> = BTreeMap::new();
        for setting in plan.settings().values() {
            onsets
                .entry((setting.onset + plan.offset()) % plan.cycle_time())
                .or_default()
                .push(setting.group);
            droppings
                .entry((setting.dropping + plan.offset()) % plan.cycle_time())
                .or_default()
                .push(setting.group);
        }
        Self {
            cycle_time: plan.cycle_time(),
            onsets,
            droppings,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Mode {
    Base,
    Extending,
    ForcedExtending,
}

/// The actuated state machine.
///
/// Each second it either follows the base plan, extends a phase at an
/// extension point while traffic keeps arriving, or force-extends the
/// terminal phase of the cycle until the fixed-time cycle length is
/// reached.
pub struct ActuatedController {
    config: ActuatedConfig,
    system: SignalSystem,
    sensors: Box<dyn VehicleSensor>,
    downstream: Box<dyn DownstreamSensor>,
    schedule: Option<Schedule>,
    regular_points: BTreeMap<u32, ExtensionPoint>,
    forced_point: Option<ExtensionPoint>,
    max_extension_time: u32,
    mode: Mode,
    /// Key of the point being extended while in [Mode::Extending].
    active_point: Option<u32>,
    /// Incremented before use; the first processed position is 0.
    second_in_cycle: i64,
    /// Extension seconds consumed in the current cycle.
    extension_time: u32,
    /// When each currently green group was switched on. Entries persist
    /// across cycle boundaries for groups whose green spans them.
    onset_times: BTreeMap<SignalGroupId, f64>,
}

impl ActuatedController {
    /// Creates a controller for one signal system. The system's plan
    /// collection must hold the fixed-time plan and the base plan derived
    /// from it (see [crate::prepare_plan_pair]).
    pub fn new(
        system: SignalSystem,
        config: ActuatedConfig,
        sensors: Box<dyn VehicleSensor>,
        downstream: Box<dyn DownstreamSensor>,
    ) -> Self {
        Self {
            config,
            system,
            sensors,
            downstream,
            schedule: None,
            regular_points: BTreeMap::new(),
            forced_point: None,
            max_extension_time: 0,
            mode: Mode::Base,
            active_point: None,
            second_in_cycle: -1,
            extension_time: 0,
            onset_times: BTreeMap::new(),
        }
    }

    /// Whether the per-cycle extension budget still has time left.
    /// Without the fixed-time cycle bound, extension is always allowed.
    fn extension_time_left(&self) -> bool {
        if self.config.use_fixed_time_cycle_as_maximal_extension {
            return self.extension_time < self.max_extension_time;
        }
        true
    }

    /// Whether `group` is still under its maximum green time.
    ///
    /// Groups with no recorded onset are never extended; this happens
    /// when a group's dropping comes before any of its onsets in the run.
    fn green_time_left(&self, now: f64, group: SignalGroupId, max_green: u32) -> bool {
        match self.onset_times.get(&group) {
            None => false,
            Some(&onset) => ((now - onset) as u32) < max_green,
        }
    }

    /// The extension-continue predicate for a regular point: the budget,
    /// every group's green cap, the optional downstream check and the
    /// traffic-presence check must all hold.
    fn extension_allowed(&self, now: f64, point: &ExtensionPoint) -> bool {
        if !self.extension_time_left() {
            return false;
        }
        for (&group, &max_green) in point.max_green() {
            if !self.green_time_left(now, group, max_green) {
                return false;
            }
        }
        self.traffic_demands_extension(now, point)
    }

    /// Whether sensors justify holding the point's groups open: no
    /// occupied downstream link (when the check is enabled), and at least
    /// one vehicle approaching one of the groups' signals. Signals with
    /// lanes are checked per lane, others per link.
    fn traffic_demands_extension(&self, now: f64, point: &ExtensionPoint) -> bool {
        if self.config.check_downstream {
            for group in point.groups() {
                if !self
                    .downstream
                    .all_downstream_links_empty(self.system.id(), group)
                {
                    return false;
                }
            }
        }
        for group in point.groups() {
            let signals = &self
                .system
                .group(group)
                .expect("extension point group is missing from the signal system")
                .signals;
            for signal in signals {
                if signal.lanes.is_empty() {
                    let cars =
                        self.sensors
                            .cars_in_distance(signal.link, self.config.sensor_distance, now);
                    if cars > 0 {
                        return true;
                    }
                } else {
                    for &lane in &signal.lanes {
                        let cars = self.sensors.cars_in_distance_on_lane(
                            signal.link,
                            lane,
                            self.config.sensor_distance,
                            now,
                        );
                        if cars > 0 {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }

    /// Registers upstream presence detectors for every signal of every
    /// regular extension point, and downstream detectors when enabled.
    /// Forced points never consult traffic and register nothing.
    fn register_detectors(&mut self) {
        for point in self.regular_points.values() {
            for group in point.groups() {
                let signals = &self
                    .system
                    .group(group)
                    .expect("extension point group is missing from the signal system")
                    .signals;
                for signal in signals {
                    if signal.lanes.is_empty() {
                        self.sensors
                            .register_cars_in_distance(signal.link, self.config.sensor_distance);
                    } else {
                        for &lane in &signal.lanes {
                            self.sensors.register_cars_in_distance_on_lane(
                                signal.link,
                                lane,
                                self.config.sensor_distance,
                            );
                        }
                    }
                }
            }
        }
        if self.config.check_downstream {
            self.downstream.register_system(&self.system);
        }
    }

    /// Diagnostic dump of the computed base plan and its extension
    /// points, emitted at every initialization.
    fn dump_plan(&self) {
        debug!(
            "signal system {:?}: {}s available for extension",
            self.system.id(),
            self.max_extension_time
        );
        for point in self.regular_points.values().chain(self.forced_point.iter()) {
            debug!(
                "  extension point at second {}{}",
                point.second_in_cycle(),
                if point.is_forced() { " (forced)" } else { "" }
            );
            for (group, max_green) in point.max_green() {
                debug!("    group {:?}: max green {}s", group, max_green);
            }
        }
    }
}

impl SignalController for ActuatedController {
    fn simulation_initialized(&mut self, _start_time: f64) -> Result<(), ControlError> {
        self.mode = Mode::Base;
        self.active_point = None;
        self.onset_times.clear();
        self.second_in_cycle = -1;
        self.extension_time = 0;

        let (fixed, base) = find_plan_pair(&self.system)?;
        debug_assert!(
            base.cycle_time() <= fixed.cycle_time(),
            "base plan is longer than its fixed-time plan"
        );
        let max_extension_time = fixed.cycle_time() - base.cycle_time();
        let schedule = Schedule::new(base);
        let (mut regular_points, mut forced) =
            calculate_extension_points(fixed, base, self.config.max_green_scale);
        let forced_point = if self.config.use_fixed_time_cycle_as_maximal_extension {
            Some(forced)
        } else {
            // without a budget a forced point would extend forever;
            // let sensors gate it like any other point
            forced.demote();
            regular_points.insert(forced.second_in_cycle(), forced);
            None
        };

        self.schedule = Some(schedule);
        self.regular_points = regular_points;
        self.forced_point = forced_point;
        self.max_extension_time = max_extension_time;
        self.dump_plan();
        self.register_detectors();
        Ok(())
    }

    fn update_state(&mut self, current_time: f64, actuator: &mut dyn SignalActuator) {
        let schedule = self
            .schedule
            .as_ref()
            .expect("update_state called before simulation_initialized");

        match self.mode {
            Mode::ForcedExtending => {
                // the terminal phase holds until the cycle budget is spent
                self.extension_time += 1;
                if self.extension_time_left() {
                    return;
                }
                self.mode = Mode::Base;
                // the droppings of this second still have to fire, below
            }
            Mode::Extending => {
                self.extension_time += 1;
                let point = self
                    .active_point
                    .and_then(|second| self.regular_points.get(&second))
                    .expect("extending without an active extension point");
                if self.extension_allowed(current_time, point) {
                    return;
                }
                self.mode = Mode::Base;
                self.active_point = None;
                // the droppings of this second still have to fire, below
            }
            Mode::Base => {
                self.second_in_cycle += 1;
                let second = self.second_in_cycle as u32;

                if let Some(groups) = schedule.onsets.get(&second) {
                    for &group in groups {
                        actuator.schedule_onset(current_time, group);
                        self.onset_times.insert(group, current_time);
                    }
                }

                let at_forced_point = self
                    .forced_point
                    .as_ref()
                    .is_some_and(|point| point.second_in_cycle() == second);
                if at_forced_point {
                    if self.extension_time_left() {
                        // droppings at this second are deferred until the
                        // budget runs out
                        self.mode = Mode::ForcedExtending;
                        return;
                    }
                } else if let Some(point) = self.regular_points.get(&second) {
                    if self.extension_allowed(current_time, point) {
                        self.mode = Mode::Extending;
                        self.active_point = Some(second);
                        return;
                    }
                }
            }
        }

        // no extension, or one that ended this very second: process the
        // droppings scheduled at the current position in the same tick
        let second = self.second_in_cycle as u32;
        if let Some(groups) = schedule.droppings.get(&second) {
            for &group in groups {
                actuator.schedule_dropping(current_time, group);
                self.onset_times.remove(&group);
            }
        }

        if second == schedule.cycle_time - 1 {
            // cycle complete, extensions included; start the next one
            self.second_in_cycle = -1;
            self.extension_time = 0;
        }
    }
}

/// Collects the fixed-time and base plans from a system's plan collection.
fn find_plan_pair(system: &SignalSystem) -> Result<(&SignalPlan, &SignalPlan), ControlError> {
    let plans = system.plans();
    if plans.len() > 2 {
        return Err(ControlError::TooManyPlans(system.id(), plans.len()));
    }
    let mut fixed = None;
    let mut base = None;
    for (id, plan) in plans {
        if id.is_fixed_time() {
            fixed = Some(plan);
        }
        if id.is_pso() {
            base = Some(plan);
        }
    }
    let fixed = fixed.ok_or(ControlError::MissingFixedTimePlan(system.id()))?;
    let base = base.ok_or(ControlError::MissingBasePlan(system.id()))?;
    Ok((fixed, base))
}

/// Drives a single signal plan verbatim, with no sensors and no
/// extension. The second controller variant next to [ActuatedController].
pub struct FixedTimeController {
    system: SignalSystem,
    schedule: Option<Schedule>,
    second_in_cycle: i64,
}

impl FixedTimeController {
    /// Creates a fixed-time controller for one signal system. The
    /// system's plan collection must hold exactly one plan.
    pub fn new(system: SignalSystem) -> Self {
        Self {
            system,
            schedule: None,
            second_in_cycle: -1,
        }
    }
}

impl SignalController for FixedTimeController {
    fn simulation_initialized(&mut self, _start_time: f64) -> Result<(), ControlError> {
        self.second_in_cycle = -1;
        let plans = self.system.plans();
        if plans.len() > 1 {
            return Err(ControlError::TooManyPlans(self.system.id(), plans.len()));
        }
        let plan = plans
            .values()
            .next()
            .ok_or(ControlError::NoPlan(self.system.id()))?;
        self.schedule = Some(Schedule::new(plan));
        Ok(())
    }

    fn update_state(&mut self, current_time: f64, actuator: &mut dyn SignalActuator) {
        let schedule = self
            .schedule
            .as_ref()
            .expect("update_state called before simulation_initialized");
        self.second_in_cycle += 1;
        let second = self.second_in_cycle as u32;
        if let Some(groups) = schedule.onsets.get(&second) {
            for &group in groups {
                actuator.schedule_onset(current_time, group);
            }
        }
        if let Some(groups) = schedule.droppings.get(&second) {
            for &group in groups {
                actuator.schedule_dropping(current_time, group);
            }
        }
        if second == schedule.cycle_time - 1 {
            self.second_in_cycle = -1;
        }
    }
}
