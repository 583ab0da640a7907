pub use compress::{compress_plan, prepare_plan_pair, MIN_GREEN_SECONDS};
pub use config::ActuatedConfig;
pub use controller::{
    create_signal_controller, ActuatedController, ControlError, ControllerKind,
    FixedTimeController, SignalController,
};
pub use extension::{calculate_extension_points, ExtensionPoint};
pub use plan::{PlanId, SignalGroupSetting, SignalPlan, FIXED_TIME_PREFIX, PSO_PREFIX};
pub use sensor::{DownstreamSensor, EmptyDownstream, SignalActuator, VehicleSensor};
use slotmap::new_key_type;
pub use slotmap::{Key, KeyData};
pub use system::{Signal, SignalGroup, SignalSystem};

mod compress;
mod config;
mod controller;
mod extension;
mod plan;
mod sensor;
mod system;

new_key_type! {
    /// Unique ID of a link approaching a signal.
    pub struct LinkId;
    /// Unique ID of a lane within a link.
    pub struct LaneId;
    /// Unique ID of a [SignalGroup].
    pub struct SignalGroupId;
    /// Unique ID of a [SignalSystem].
    pub struct SignalSystemId;
}
