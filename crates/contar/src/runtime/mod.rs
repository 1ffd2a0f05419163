//! Runtime side of instrumentation
//!
//! Counter storage that instrumented code writes to, a reference interpreter
//! for instrumented classes, and the hook that persists counters at exit.

mod hits;
mod hook;
mod local;
mod simulate;

pub use hits::HitsArray;
pub use hook::SaveHook;
pub use local::LocalHits;
pub use simulate::{Simulator, DEFAULT_STEP_LIMIT};
