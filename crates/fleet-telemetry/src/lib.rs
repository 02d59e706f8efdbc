//! Vehicle telemetry polling: vehicle API client, payload normalization, snapshot
//! persistence, significant-change logging and trip detection.

pub mod change_detection;
pub mod event_sink;
pub mod geo;
pub mod geocode;
pub mod normalizer;
pub mod snapshot_store;
pub mod telemetry_runtime;
pub mod trip_state;
pub mod vehicle_api_client;
pub mod vehicle_snapshot;

pub use change_detection::*;
pub use event_sink::*;
pub use geo::*;
pub use geocode::*;
pub use normalizer::*;
pub use snapshot_store::*;
pub use telemetry_runtime::*;
pub use trip_state::*;
pub use vehicle_api_client::*;
pub use vehicle_snapshot::*;
