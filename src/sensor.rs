//! Gateways between a controller and the surrounding simulation.
//!
//! All queries are synchronous, non-blocking reads against state the host
//! mutates elsewhere (typically from its event stream). Registration must
//! complete before the run starts; controllers register everything they
//! will ever query during initialization.

use crate::system::SignalSystem;
use crate::{LaneId, LinkId, SignalGroupId, SignalSystemId};

/// Counts vehicles approaching a signal.
pub trait VehicleSensor {
    /// Declares that vehicles within `distance` metres of the downstream
    /// end of `link` must be monitored.
    fn register_cars_in_distance(&mut self, link: LinkId, distance: f64);

    /// Declares that vehicles on one lane of `link` must be monitored.
    fn register_cars_in_distance_on_lane(&mut self, link: LinkId, lane: LaneId, distance: f64);

    /// The number of vehicles within `distance` metres on `link`.
    fn cars_in_distance(&self, link: LinkId, distance: f64, time: f64) -> usize;

    /// The number of vehicles within `distance` metres on one lane of `link`.
    fn cars_in_distance_on_lane(
        &self,
        link: LinkId,
        lane: LaneId,
        distance: f64,
        time: f64,
    ) -> usize;
}

/// Observes occupancy of the links downstream of a signal system.
pub trait DownstreamSensor {
    /// Declares that the links downstream of this system must be monitored.
    fn register_system(&mut self, system: &SignalSystem);

    /// Whether every link reachable downstream of `group` is empty.
    fn all_downstream_links_empty(&self, system: SignalSystemId, group: SignalGroupId) -> bool;
}

/// Downstream sensor for hosts that leave the downstream check disabled.
/// Registers nothing and reports every link as empty.
#[derive(Clone, Copy, Default, Debug)]
pub struct EmptyDownstream;

impl DownstreamSensor for EmptyDownstream {
    fn register_system(&mut self, _system: &SignalSystem) {}

    fn all_downstream_links_empty(
        &self,
        _system: SignalSystemId,
        _group: SignalGroupId,
    ) -> bool {
        true
    }
}

/// Receives the switching commands a controller emits, at most one per
/// group per cycle event.
pub trait SignalActuator {
    /// Turns a signal group green at `time`.
    fn schedule_onset(&mut self, time: f64, group: SignalGroupId);

    /// Turns a signal group red at `time`.
    fn schedule_dropping(&mut self, time: f64, group: SignalGroupId);
}
