//! Repositories over the shared SQLite database
//!
//! Each repository is a thin struct around a `SqlitePool`. Rows store UUIDs
//! as TEXT, timestamps as INTEGER milliseconds and enums as their labels.

pub mod interactions;
pub mod matches;
pub mod tags;
pub mod user_tags;

pub use interactions::InteractionRepository;
pub use matches::{MatchRepository, MatchStats};
pub use tags::TagRepository;
pub use user_tags::{AttachOutcome, UserTagRepository};
