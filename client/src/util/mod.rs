//! Helpers shared by front ends that are not tied to the network or session.

pub mod validation;
