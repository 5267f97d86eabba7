pub mod controller;
pub mod geo;
pub mod session;
pub mod state;

pub use controller::{ActionOutcome, AttendanceController, TimeControlView};
pub use geo::{GeoError, Geolocator, ReportedPosition};
pub use session::{SessionContext, SessionRegistry};
pub use state::{ActionAvailability, ClockState, IllegalTransition};
