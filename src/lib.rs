//! Live pose-graph visualization core.
//!
//! An external estimator pushes whole snapshots of a multi-body pose graph: nodes (rigid
//! bodies), edges with a rigidity/knowledge class and noise, per-frame local transforms
//! between neighbors, and per-frame world transforms. This crate models those snapshots,
//! validates every push, keeps the latest valid one, and turns stored transforms into
//! matrices a scene graph can assign.
//!
//! # Pipeline overview
//!
//! 1. **Receive**: a [`SnapshotChannel`] yields [`Envelope`]s (TCP via [`TcpChannel`]).
//! 2. **Validate**: [`validate`] turns a JSON payload into a [`WorldState`] or reports every
//!    violation as [`SchemaErrors`].
//! 3. **Store**: [`WorldStore::replace`] swaps the snapshot atomically; the
//!    [`UpdateAdapter`] drives steps 1 to 3 and leaves the store untouched on failure.
//! 4. **Compose**: [`compose`] / [`SceneComposer`] convert row-major wire matrices into the
//!    flat column-major [`RenderMatrix`] for one active frame. Unsolved or missing poses are
//!    reported as [`UnresolvedTransformError`] and the element is omitted, never drawn at
//!    the origin.
//!
//! [`SyntheticGraph`] and [`TcpPublisher`] stand in for the estimator during development.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod channel;
mod compose;
mod config;
mod foundation;
mod graph;
mod store;
mod synthetic;
mod transform;

pub use channel::adapter::{CancelHandle, PumpOutcome, UpdateAdapter, UpdateStats};
pub use channel::tcp::{TcpChannel, TcpPublisher};
pub use channel::{
    ChannelError, DEFAULT_EVENT, Envelope, InMemoryChannel, Received, SnapshotChannel,
};
pub use compose::scene::{PlacedEdge, PlacedNode, RenderTarget, SceneComposer, SceneFrame};
pub use compose::{
    RenderMatrix, UnresolvedReason, UnresolvedTarget, UnresolvedTransformError, compose,
    compose_local, compose_world,
};
pub use config::{DEFAULT_ENDPOINT, ViewerConfig};
pub use foundation::core::{FrameIndex, LocalKey, NodeId, WorldKey};
pub use foundation::error::{PoseGraphError, PoseGraphResult};
pub use graph::model::{Edge, EdgeKind, WorldState};
pub use graph::validate::{SchemaError, SchemaErrors, SchemaPathElem, SchemaRule, validate};
pub use store::WorldStore;
pub use synthetic::{EdgeSpec, SyntheticGraph, rig};
pub use transform::{Matrix4, Transform};
