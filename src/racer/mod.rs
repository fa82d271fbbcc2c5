//! Multi-plan racer: several candidate plans advance in lockstep until one
//! earns exclusive control of the iteration.

mod cursor;
mod state;

pub use cursor::RacerCursor;
pub use state::RacerState;
