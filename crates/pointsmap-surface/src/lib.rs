//! Client side of the points map: the drag/select state machine over the
//! tiles and the batched synchronisation with the server.

pub mod error;
pub mod surface;
pub mod sync;

pub use error::SyncError;
pub use surface::{Mode, Surface, SurfaceCommand, SurfaceState, SurfaceTile};
pub use sync::{SyncClient, SyncQueue, spawn_sync_loop};
