pub mod clock;
pub mod drift;
pub mod viewer;

pub use clock::{ClockHandle, ClockProbe, ClockReconciler, InProcessClockProbe, ViewerClockEstimate};
pub use drift::{CorrectionAction, DriftCorrector};
pub use viewer::{PlaybackSurface, ViewerSync};
