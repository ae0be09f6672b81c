use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one feedback tick shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedbackKind {
    Hit,
    Miss,
}

impl FeedbackKind {
    /// Label rendered for this outcome.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            FeedbackKind::Hit => "Hit!",
            FeedbackKind::Miss => "Miss!",
        }
    }

    #[must_use]
    pub fn is_hit(self) -> bool {
        matches!(self, FeedbackKind::Hit)
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
