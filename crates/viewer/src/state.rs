use catalog::{FilterDelta, LoadError};
use foundation::RecordId;
use layers::{ClusterId, FlatViewport, PrimitiveClick};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Flat,
    Globe,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Flat => "flat",
            ViewMode::Globe => "globe",
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    None,
    Selected(RecordId),
}

impl SelectionState {
    pub fn record(self) -> Option<RecordId> {
        match self {
            SelectionState::None => None,
            SelectionState::Selected(id) => Some(id),
        }
    }

    pub fn is_selected(self, id: RecordId) -> bool {
        self == SelectionState::Selected(id)
    }
}

/// Session lifecycle around the one dataset load.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Loading,
    Ready,
    /// The load failed. Nothing is drawn and only a retry is accepted.
    Degraded(LoadError),
}

/// Every way the outside world can change coordinator state.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    SwitchView(ViewMode),
    ApplyFilter(FilterDelta),
    PrimitiveClick(PrimitiveClick),
    DismissSelection,
    SetViewport(FlatViewport),
    RetryLoad,
}

/// Notifications for the host UI (detail panel, controls, status line).
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    Ready { records: usize, rejected: usize },
    LoadFailed(LoadError),
    ViewSwitched(ViewMode),
    FilterApplied { visible: usize },
    DetailShown(RecordId),
    DetailHidden,
    ClusterZoomed { cluster: ClusterId, zoom: f64 },
    ClusterExpanded { cluster: ClusterId, members: usize },
}

#[cfg(test)]
mod tests {
    use super::{SelectionState, ViewMode};
    use foundation::RecordId;

    #[test]
    fn view_mode_labels() {
        assert_eq!(ViewMode::default(), ViewMode::Flat);
        for mode in [ViewMode::Flat, ViewMode::Globe] {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
            assert_eq!(serde_json::from_str::<ViewMode>(&json).unwrap(), mode);
        }
        assert!(serde_json::from_str::<ViewMode>("\"3d\"").is_err());
    }

    #[test]
    fn selection_queries() {
        let s = SelectionState::Selected(RecordId(4));
        assert_eq!(s.record(), Some(RecordId(4)));
        assert!(s.is_selected(RecordId(4)));
        assert!(!SelectionState::None.is_selected(RecordId(4)));
    }
}
