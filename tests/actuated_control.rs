//! Scenario tests driving an actuated controller tick by tick.

use signal_control::{
    compress_plan, ActuatedConfig, ControllerKind, EmptyDownstream, KeyData, LaneId, LinkId,
    PlanId, Signal, SignalActuator, SignalController, SignalGroup, SignalGroupId,
    SignalGroupSetting, SignalPlan, SignalSystem, VehicleSensor,
};
use std::cell::Cell;
use std::rc::Rc;

fn group(n: u64) -> SignalGroupId {
    KeyData::from_ffi(n).into()
}

fn link(n: u64) -> LinkId {
    KeyData::from_ffi(n).into()
}

fn setting(n: u64, onset: u32, dropping: u32) -> SignalGroupSetting {
    SignalGroupSetting {
        group: group(n),
        onset,
        dropping,
    }
}

/// Sensor reporting the same car count everywhere.
#[derive(Clone, Default)]
struct FixedCount {
    cars: Rc<Cell<usize>>,
}

impl VehicleSensor for FixedCount {
    fn register_cars_in_distance(&mut self, _link: LinkId, _distance: f64) {}
    fn register_cars_in_distance_on_lane(&mut self, _link: LinkId, _lane: LaneId, _distance: f64) {
    }
    fn cars_in_distance(&self, _link: LinkId, _distance: f64, _time: f64) -> usize {
        self.cars.get()
    }
    fn cars_in_distance_on_lane(
        &self,
        _link: LinkId,
        _lane: LaneId,
        _distance: f64,
        _time: f64,
    ) -> usize {
        self.cars.get()
    }
}

#[derive(Default)]
struct Recorder {
    onsets: Vec<(f64, SignalGroupId)>,
    droppings: Vec<(f64, SignalGroupId)>,
}

impl SignalActuator for Recorder {
    fn schedule_onset(&mut self, time: f64, group: SignalGroupId) {
        self.onsets.push((time, group));
    }
    fn schedule_dropping(&mut self, time: f64, group: SignalGroupId) {
        self.droppings.push((time, group));
    }
}

fn two_phase_system(fixed: SignalPlan, base: SignalPlan) -> SignalSystem {
    let mut system = SignalSystem::new(KeyData::from_ffi(1).into());
    system
        .add_group(group(1), SignalGroup::new([Signal::on_link(link(1))]))
        .add_group(group(2), SignalGroup::new([Signal::on_link(link(2))]))
        .add_plan(PlanId::fixed_time("p"), fixed)
        .add_plan(PlanId::pso("p"), base);
    system
}

fn actuated(config: ActuatedConfig, cars: Rc<Cell<usize>>) -> ControllerKind {
    ControllerKind::Actuated {
        config,
        sensors: Box::new(FixedCount { cars }),
        downstream: Box::new(EmptyDownstream),
    }
}

/// With no spare cycle time and no vehicles detected, the controller
/// degenerates to a fixed-time one: commands fire at the plan's seconds,
/// every cycle, indefinitely.
#[test]
fn no_detection_keeps_the_base_cadence() {
    let plan = SignalPlan::new(60, 0, [setting(1, 0, 30), setting(2, 30, 60)]);
    // base equals fixed: the extension budget is zero
    let system = two_phase_system(plan.clone(), plan);
    let mut ctrl = signal_control::create_signal_controller(
        actuated(ActuatedConfig::default(), Rc::default()),
        system,
    );
    ctrl.simulation_initialized(0.0).unwrap();

    let mut rec = Recorder::default();
    for t in 0..180 {
        ctrl.update_state(t as f64, &mut rec);
    }
    assert_eq!(
        rec.onsets,
        vec![
            (0.0, group(1)),
            (30.0, group(2)),
            (60.0, group(1)),
            (90.0, group(2)),
            (120.0, group(1)),
            (150.0, group(2)),
        ]
    );
    assert_eq!(
        rec.droppings,
        vec![
            (0.0, group(2)),
            (30.0, group(1)),
            (60.0, group(2)),
            (90.0, group(1)),
            (120.0, group(2)),
            (150.0, group(1)),
        ]
    );
}

/// A zero budget blocks extension even with traffic present.
#[test]
fn zero_budget_blocks_extension_despite_traffic() {
    let plan = SignalPlan::new(60, 0, [setting(1, 0, 30), setting(2, 30, 60)]);
    let system = two_phase_system(plan.clone(), plan);
    let cars = Rc::new(Cell::new(10));
    let mut ctrl = signal_control::create_signal_controller(
        actuated(ActuatedConfig::default(), cars),
        system,
    );
    ctrl.simulation_initialized(0.0).unwrap();

    let mut rec = Recorder::default();
    for t in 0..120 {
        ctrl.update_state(t as f64, &mut rec);
    }
    assert_eq!(rec.droppings[1], (30.0, group(1)));
    assert_eq!(rec.droppings[3], (90.0, group(1)));
}

/// With a compressed base plan and no traffic, the forced extension pads
/// every cycle back to exactly the fixed-time period.
#[test]
fn forced_extension_restores_the_fixed_time_period() {
    let fixed = SignalPlan::new(60, 0, [setting(1, 0, 30), setting(2, 30, 60)]);
    let base = compress_plan(&fixed);
    assert_eq!(base.cycle_time(), 10);
    let system = two_phase_system(fixed, base);
    let mut ctrl = signal_control::create_signal_controller(
        actuated(ActuatedConfig::default(), Rc::default()),
        system,
    );
    ctrl.simulation_initialized(0.0).unwrap();

    let mut rec = Recorder::default();
    for t in 0..120 {
        ctrl.update_state(t as f64, &mut rec);
    }
    // group 1 onsets once per 60s of wall time, as in the fixed-time plan
    assert_eq!(
        rec.onsets,
        vec![
            (0.0, group(1)),
            (5.0, group(2)),
            (60.0, group(1)),
            (65.0, group(2)),
        ]
    );
    // group 1's dropping at base second 5 is deferred by the 50s budget
    assert_eq!(
        rec.droppings,
        vec![
            (0.0, group(2)),
            (55.0, group(1)),
            (60.0, group(2)),
            (115.0, group(1)),
        ]
    );
}

/// Sensor-gated extension: a phase holds open while vehicles keep
/// arriving and releases in the tick demand disappears.
#[test]
fn demand_extends_a_phase_and_release_is_immediate() {
    let fixed = SignalPlan::new(60, 0, [setting(1, 0, 30), setting(2, 30, 60)]);
    let base = compress_plan(&fixed);
    let system = two_phase_system(fixed, base);
    let cars = Rc::new(Cell::new(1));
    let config = ActuatedConfig {
        // gate every point by sensors instead of forcing the last one
        use_fixed_time_cycle_as_maximal_extension: false,
        ..Default::default()
    };
    let mut ctrl =
        signal_control::create_signal_controller(actuated(config, cars.clone()), system);
    ctrl.simulation_initialized(0.0).unwrap();

    let mut rec = Recorder::default();
    for t in 0..13 {
        if t == 8 {
            cars.set(0);
        }
        ctrl.update_state(t as f64, &mut rec);
    }
    // base seconds: group 1 green [0, 5), group 2 green [5, 10).
    // traffic extends group 1's phase from second 5 until t=8
    assert_eq!(rec.onsets, vec![(0.0, group(1)), (5.0, group(2))]);
    assert_eq!(rec.droppings, vec![(0.0, group(2)), (8.0, group(1))]);
    // the cycle picks up where it paused: seconds 6..9 run at t=9..12,
    // so the next cycle's onset of group 1 lands on t=13
    let mut rec2 = Recorder::default();
    ctrl.update_state(13.0, &mut rec2);
    assert_eq!(rec2.onsets, vec![(13.0, group(1))]);
    assert_eq!(rec2.droppings, vec![(13.0, group(2))]);
}

/// An occupied downstream link vetoes extension when the check is on.
#[test]
fn occupied_downstream_blocks_extension() {
    struct Occupied;
    impl signal_control::DownstreamSensor for Occupied {
        fn register_system(&mut self, _system: &SignalSystem) {}
        fn all_downstream_links_empty(
            &self,
            _system: signal_control::SignalSystemId,
            _group: SignalGroupId,
        ) -> bool {
            false
        }
    }

    let fixed = SignalPlan::new(60, 0, [setting(1, 0, 30), setting(2, 30, 60)]);
    let base = compress_plan(&fixed);
    let system = two_phase_system(fixed, base);
    let cars = Rc::new(Cell::new(1));
    let config = ActuatedConfig {
        use_fixed_time_cycle_as_maximal_extension: false,
        check_downstream: true,
        ..Default::default()
    };
    let mut ctrl = signal_control::create_signal_controller(
        ControllerKind::Actuated {
            config,
            sensors: Box::new(FixedCount { cars }),
            downstream: Box::new(Occupied),
        },
        system,
    );
    ctrl.simulation_initialized(0.0).unwrap();

    let mut rec = Recorder::default();
    for t in 0..10 {
        ctrl.update_state(t as f64, &mut rec);
    }
    // traffic is waiting upstream, but the occupied downstream link keeps
    // the plan on its base cadence
    assert_eq!(rec.droppings, vec![(0.0, group(2)), (5.0, group(1))]);
}

/// Lane-aware presence: a signal with lanes is queried per lane.
#[test]
fn lane_signals_are_checked_per_lane() {
    struct LaneOnly {
        lane_queries: Rc<Cell<usize>>,
        link_queries: Rc<Cell<usize>>,
    }
    impl VehicleSensor for LaneOnly {
        fn register_cars_in_distance(&mut self, _link: LinkId, _distance: f64) {}
        fn register_cars_in_distance_on_lane(
            &mut self,
            _link: LinkId,
            _lane: LaneId,
            _distance: f64,
        ) {
        }
        fn cars_in_distance(&self, _link: LinkId, _distance: f64, _time: f64) -> usize {
            self.link_queries.set(self.link_queries.get() + 1);
            1
        }
        fn cars_in_distance_on_lane(
            &self,
            _link: LinkId,
            _lane: LaneId,
            _distance: f64,
            _time: f64,
        ) -> usize {
            self.lane_queries.set(self.lane_queries.get() + 1);
            1
        }
    }

    let fixed = SignalPlan::new(60, 0, [setting(1, 0, 30), setting(2, 30, 60)]);
    let base = compress_plan(&fixed);
    let lane_queries = Rc::new(Cell::new(0));
    let link_queries = Rc::new(Cell::new(0));
    let mut system = SignalSystem::new(KeyData::from_ffi(1).into());
    system
        .add_group(
            group(1),
            SignalGroup::new([Signal::on_lanes(link(1), [KeyData::from_ffi(1).into()])]),
        )
        .add_group(group(2), SignalGroup::new([Signal::on_link(link(2))]))
        .add_plan(PlanId::fixed_time("p"), fixed)
        .add_plan(PlanId::pso("p"), base);
    let config = ActuatedConfig {
        use_fixed_time_cycle_as_maximal_extension: false,
        ..Default::default()
    };
    let mut ctrl = signal_control::create_signal_controller(
        ControllerKind::Actuated {
            config,
            sensors: Box::new(LaneOnly {
                lane_queries: lane_queries.clone(),
                link_queries: link_queries.clone(),
            }),
            downstream: Box::new(EmptyDownstream),
        },
        system,
    );
    ctrl.simulation_initialized(0.0).unwrap();

    let mut rec = Recorder::default();
    for t in 0..6 {
        ctrl.update_state(t as f64, &mut rec);
    }
    // the point at second 5 holds group 1, whose signal has a lane
    assert!(lane_queries.get() > 0);
    assert_eq!(link_queries.get(), 0);
}
