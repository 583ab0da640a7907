//! Configuration of actuated signal control.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Options governing when an actuated controller extends a green phase.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActuatedConfig {
    /// Limits the total extension per cycle to the difference between the
    /// fixed-time cycle and the compressed base cycle. When disabled, the
    /// terminal extension point of the cycle loses its forced status and
    /// is gated by sensors like any other point.
    pub use_fixed_time_cycle_as_maximal_extension: bool,
    /// Caps each group's green time under extension at its fixed-time
    /// green multiplied by this factor. `None` leaves greens unbounded.
    pub max_green_scale: Option<f64>,
    /// Upstream distance in metres within which vehicle presence counts
    /// as demand for an extension.
    pub sensor_distance: f64,
    /// Only extend while all downstream links of the extending groups are
    /// empty. Meaningful together with a disabled forced extension, which
    /// would otherwise spill vehicles downstream regardless.
    pub check_downstream: bool,
}

impl Default for ActuatedConfig {
    fn default() -> Self {
        Self {
            use_fixed_time_cycle_as_maximal_extension: true,
            max_green_scale: None,
            sensor_distance: 10.0,
            check_downstream: false,
        }
    }
}
