//! Check-in conversations: reply normalization and session state.

pub mod normalize;
pub mod session;

pub use normalize::{normalize_checkin_status, ReplyStatus};
pub use session::{AwaitingCheckin, CheckinSession};
