//! The five photograph roles a reconstruction job requires.
//!
//! Each face carries a fixed ordinal (the camera yaw in degrees, or `-1`
//! for the overhead shot). The ordinal is part of the worker contract:
//! staged images are named `<ordinal>.<ext>` so the worker can tell the
//! faces apart without any other channel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the five required photograph roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    Front,
    Back,
    Left,
    Right,
    Top,
}

impl Face {
    /// All faces in the order the front-end presents them.
    pub const ALL: [Face; 5] = [Face::Front, Face::Back, Face::Left, Face::Right, Face::Top];

    /// Worker-facing ordinal: `Front=0, Right=90, Back=180, Left=270, Top=-1`.
    pub fn ordinal(self) -> i32 {
        match self {
            Face::Front => 0,
            Face::Right => 90,
            Face::Back => 180,
            Face::Left => 270,
            Face::Top => -1,
        }
    }

    /// Inverse of [`ordinal`](Self::ordinal).
    pub fn from_ordinal(ordinal: i32) -> Option<Face> {
        Face::ALL.into_iter().find(|f| f.ordinal() == ordinal)
    }

    /// Position of this face inside [`Face::ALL`].
    pub(crate) fn index(self) -> usize {
        match self {
            Face::Front => 0,
            Face::Back => 1,
            Face::Left => 2,
            Face::Right => 3,
            Face::Top => 4,
        }
    }

    /// Lowercase label used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Face::Front => "front",
            Face::Back => "back",
            Face::Left => "left",
            Face::Right => "right",
            Face::Top => "top",
        }
    }

    /// Staging file name for this face, e.g. `90.jpg` for [`Face::Right`].
    ///
    /// `extension` is given without the leading dot.
    pub fn staged_file_name(self, extension: &str) -> String {
        format!("{}.{}", self.ordinal(), extension)
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
