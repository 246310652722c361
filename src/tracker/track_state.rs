use serde::{Deserialize, Serialize};

/// Track status enumeration for the object tracking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackStatus {
    /// Newly created, not yet confirmed by enough consecutive matches
    #[default]
    Tentative,
    /// Matched often enough to count as a real object
    Confirmed,
    /// Missed recently; kept alive within the miss budget
    Lost,
    /// Miss budget exhausted; removed from the active set after its
    /// final snapshot is emitted
    Terminated,
}

impl TrackStatus {
    /// Whether the track still participates in association.
    pub fn is_active(self) -> bool {
        !matches!(self, TrackStatus::Terminated)
    }
}
