//! Pose-graph snapshot model and its boundary validation.

pub(crate) mod model;
pub(crate) mod validate;
