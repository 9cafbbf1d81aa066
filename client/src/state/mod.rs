//! Client state: the persisted auth session and per-view board lists.

pub mod boards;
pub mod session;
pub mod storage;
