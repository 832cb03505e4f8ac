//! Gyre Simulation Driver
//!
//! Discrete-time simulation of content-addressed routing on the unit
//! sphere: a preallocated world of nodes and data, a tick loop on a
//! dedicated thread, pluggable churn experiments, and the observability
//! that makes the emergent clustering measurable.
//!
//! # Architecture
//!
//! - [`World`]: the mesh arena plus the seeded RNG and parameter
//!   factories, behind a reader/writer lock
//! - [`Simulation`]: the tick body (histograms, state application, event
//!   hooks, statistics, CSV sinks) and the supervisor thread with
//!   pause/play/quit control
//! - [`Tocker`]: per-tick experiment hooks injecting node churn and data
//!   growth after the network has relaxed
//! - [`hop_histograms`]: reachability measurement, hop counts from every
//!   node to every datum, plus disjointedness
//! - [`snapshot`]: consistent serializable copies for visual frontends
//!
//! # Shared-state contract
//!
//! The tick body executes under the writer lock. Visualizers take the
//! reader lock for the duration of a frame via
//! [`SimulationHandle::read`]; the redraw callback fires after the writer
//! lock is released, so callbacks may re-enter simulation APIs freely.

mod factory;
mod hist;
mod simulation;
mod sinks;
mod snapshot;
mod tocker;
mod world;

pub use factory::{Factories, Hyper, NormalSampler};
pub use hist::{hop_histograms, is_hop_hist_iter, HopHistograms};
pub use simulation::{
    RedrawFn, SimConfig, Simulation, SimulationHandle, TickReport, TICK_PERIOD,
};
pub use sinks::LogSinks;
pub use snapshot::{snapshot, NodeSnapshot, WorldSnapshot};
pub use tocker::{GrowthAfterRelaxed, JoinAtRelaxed, LeaveAtRelaxed, Prod, Tocker, RELAXED_ITER};
pub use world::{PeerPolicy, World};
