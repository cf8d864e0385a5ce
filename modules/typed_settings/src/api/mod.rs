//! API layer - in-process access to settings groups

pub mod native;
