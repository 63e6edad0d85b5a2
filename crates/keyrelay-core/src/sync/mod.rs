//! Text synchronisation primitives.
//!
//! The device never sends "the whole text"; it sends the keystrokes that turn
//! what the desktop already has into what the user now sees.  [`plan_edit`]
//! computes those keystrokes.

pub mod diff;

pub use diff::{common_prefix_len, plan_edit, EditPlan};
