use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pointsmap_geometry::{Axis, CountKind, IslandShape};

use crate::models::Visibility;

/// Map actions sent FROM the surface TO the server.
///
/// Geometry actions rearrange the active map; layout actions load, set up,
/// save or delete named layouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MapCommand {
    /// Reconcile with the roster only
    None,

    /// Stack everyone at the origin, then spread them over a grid
    Reset,

    /// Remove empty rows and columns
    Cleanup,

    /// Move overlapping tiles to the nearest free slot
    Separate,

    /// Randomly swap users between the current positions
    Shuffle,

    /// Re-fit the map to its tiles
    Resize,

    /// Quarter turn
    Rotate,

    /// Copy positions from a saved layout onto the active map
    Load { layout_id: Uuid },

    /// Arrange everyone in a pattern
    Setup(SetupPattern),

    /// Save the active map under a new name
    Save {
        name: String,
        #[serde(default)]
        visibility: Visibility,
    },

    /// Delete a saved layout owned by the caller
    Delete { layout_id: Uuid },
}

/// Pattern parameters for [`MapCommand::Setup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum SetupPattern {
    Square {
        percent: u32,
    },
    Circle {
        percent: u32,
    },
    Lines {
        axis: Axis,
        count_kind: CountKind,
        count_value: usize,
    },
    Islands {
        shape: IslandShape,
        count_kind: CountKind,
        count_value: usize,
    },
}

/// A tile was dropped at a new position on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMoved {
    pub user_id: Uuid,
    pub x: i32,
    pub y: i32,
}
