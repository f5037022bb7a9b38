//! Pure watch logic
//!
//! Everything in this module is synchronous and side-effect free:
//!
//! - [`keywords`]: text + keyword list → [`KeywordPresence`]
//! - [`decision`]: two presence maps → [`Verdict`]
//! - [`machine`]: verdict + previous record → new record and optional [`Transition`]
//! - [`state`]: the persisted record types

pub mod decision;
pub mod keywords;
pub mod machine;
pub mod state;

pub use decision::{Verdict, decide};
pub use keywords::{KeywordPresence, evaluate};
pub use machine::{AcquisitionOutcome, Transition, TransitionKind, Update, update};
pub use state::{StateMap, Status, TargetId, TargetState};
