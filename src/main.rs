use signal_control::{
    compress_plan, create_signal_controller, ActuatedConfig, ControllerKind, EmptyDownstream,
    KeyData, LaneId, LinkId, PlanId, Signal, SignalActuator, SignalController, SignalGroup,
    SignalGroupId, SignalGroupSetting, SignalPlan, SignalSystem, VehicleSensor,
};
use std::cell::Cell;
use std::rc::Rc;

/// Cars pile up on the main road for the first half of each minute.
#[derive(Clone)]
struct Rush {
    cars: Rc<Cell<usize>>,
}

impl VehicleSensor for Rush {
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

struct Printer;

impl SignalActuator for Printer {
    fn schedule_onset(&mut self, time: f64, group: SignalGroupId) {
        println!("{:>5}s  green  {:?}", time, group);
    }
    fn schedule_dropping(&mut self, time: f64, group: SignalGroupId) {
        println!("{:>5}s  red    {:?}", time, group);
    }
}

fn main() {
    let main_road: SignalGroupId = KeyData::from_ffi(1).into();
    let side_road: SignalGroupId = KeyData::from_ffi(2).into();

    let fixed = SignalPlan::new(
        60,
        0,
        [
            SignalGroupSetting {
                group: main_road,
                onset: 0,
                dropping: 40,
            },
            SignalGroupSetting {
                group: side_road,
                onset: 40,
                dropping: 60,
            },
        ],
    );
    let base = compress_plan(&fixed);
    println!(
        "compressed {}s fixed-time cycle to {}s, {}s left for extension",
        fixed.cycle_time(),
        base.cycle_time(),
        fixed.cycle_time() - base.cycle_time()
    );

    let mut system = SignalSystem::new(KeyData::from_ffi(1).into());
    system
        .add_group(
            main_road,
            SignalGroup::new([Signal::on_link(KeyData::from_ffi(1).into())]),
        )
        .add_group(
            side_road,
            SignalGroup::new([Signal::on_link(KeyData::from_ffi(2).into())]),
        )
        .add_plan(PlanId::fixed_time("demo"), fixed)
        .add_plan(PlanId::pso("demo"), base);

    let cars = Rc::new(Cell::new(0));
    let mut controller = create_signal_controller(
        ControllerKind::Actuated {
            config: ActuatedConfig::default(),
            sensors: Box::new(Rush { cars: cars.clone() }),
            downstream: Box::new(EmptyDownstream),
        },
        system,
    );
    controller.simulation_initialized(0.0).unwrap();

    for t in 0..240u32 {
        cars.set(if t % 60 < 30 { 3 } else { 0 });
        controller.update_state(t as f64, &mut Printer);
    }
}
