//! Coverage data model
//!
//! ```text
//! ProjectData ──► ClassData ──► LineData ──► JumpData / SwitchData
//!                    │
//!                    └──► HitsArray (one slot per HitId)
//! ```
//!
//! Identifiers are dense per class and stable for the lifetime of a run.

mod class_data;
mod hit_id;
mod line;
mod project;

pub use class_data::ClassData;
pub use hit_id::HitId;
pub use line::{JumpData, LineData, SwitchData};
pub use project::{lock_class, ClassHandle, ProjectData};
