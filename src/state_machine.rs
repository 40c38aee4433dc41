//! Per-album view state: browsing the grid, selecting photos, or viewing one
//! in the lightbox. Each live snapshot is applied as the current truth.

use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Browsing,
    Selecting {
        ids: BTreeSet<String>,
    },
    Viewing {
        index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// Tap on the grid cell at `index` holding photo `id`
    Tap { index: usize, id: String },
    EnterSelection,
    ExitSelection,
    Toggle(String),
    SelectAll,
    CloseViewer,
    /// The selected photos were deleted
    SelectionDeleted,
    /// A new live snapshot of photo ids, in display order
    SnapshotReplaced(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEffect {
    None,
    OpenViewer { index: usize },
    CloseViewer,
    /// Number of selected photos after the event
    SelectionChanged(usize),
}

#[derive(Debug, Clone, Default)]
pub struct ViewMachine {
    state: ViewState,
    photo_ids: Vec<String>,
}

impl ViewMachine {
    pub fn new(photo_ids: Vec<String>) -> Self {
        Self {
            state: ViewState::Browsing,
            photo_ids,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn photo_ids(&self) -> &[String] {
        &self.photo_ids
    }

    /// Selected ids in display order; empty outside selection mode.
    pub fn selected(&self) -> Vec<String> {
        match self.state {
            ViewState::Selecting { ref ids } => self
                .photo_ids
                .iter()
                .filter(|id| ids.contains(*id))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn handle(&mut self, event: ViewEvent) -> ViewEffect {
        let state = std::mem::take(&mut self.state);
        let (next, effect) = self.transition(state, event);
        self.state = next;
        effect
    }

    fn transition(&mut self, state: ViewState, event: ViewEvent) -> (ViewState, ViewEffect) {
        use ViewEffect as E;
        use ViewState as S;

        match (state, event) {
            (S::Browsing, ViewEvent::Tap { index, .. }) if index < self.photo_ids.len() => {
                (S::Viewing { index }, E::OpenViewer { index })
            }
            (S::Browsing, ViewEvent::EnterSelection) => {
                (S::Selecting { ids: BTreeSet::new() }, E::SelectionChanged(0))
            }

            (S::Selecting { mut ids }, ViewEvent::Tap { id, .. })
            | (S::Selecting { mut ids }, ViewEvent::Toggle(id)) => {
                if self.photo_ids.contains(&id) && !ids.remove(&id) {
                    ids.insert(id);
                }
                let count = ids.len();
                (S::Selecting { ids }, E::SelectionChanged(count))
            }
            (S::Selecting { .. }, ViewEvent::SelectAll) => {
                let ids: BTreeSet<String> = self.photo_ids.iter().cloned().collect();
                let count = ids.len();
                (S::Selecting { ids }, E::SelectionChanged(count))
            }
            (S::Selecting { .. }, ViewEvent::ExitSelection)
            | (S::Selecting { .. }, ViewEvent::SelectionDeleted) => (S::Browsing, E::SelectionChanged(0)),

            (S::Viewing { .. }, ViewEvent::CloseViewer) => (S::Browsing, E::CloseViewer),
            (S::Viewing { .. }, ViewEvent::Tap { index, .. }) if index < self.photo_ids.len() => {
                (S::Viewing { index }, E::None)
            }

            (state, ViewEvent::SnapshotReplaced(ids)) => {
                self.photo_ids = ids;
                self.reconcile(state)
            }

            (state, _) => (state, E::None),
        }
    }

    fn reconcile(&self, state: ViewState) -> (ViewState, ViewEffect) {
        match state {
            ViewState::Browsing => (ViewState::Browsing, ViewEffect::None),
            ViewState::Selecting { ids } => {
                let before = ids.len();
                let ids: BTreeSet<String> = ids
                    .into_iter()
                    .filter(|id| self.photo_ids.contains(id))
                    .collect();
                let effect = if ids.len() == before {
                    ViewEffect::None
                } else {
                    ViewEffect::SelectionChanged(ids.len())
                };
                (ViewState::Selecting { ids }, effect)
            }
            ViewState::Viewing { index } => {
                if self.photo_ids.is_empty() {
                    (ViewState::Browsing, ViewEffect::CloseViewer)
                } else {
                    let clamped = index.min(self.photo_ids.len() - 1);
                    (ViewState::Viewing { index: clamped }, ViewEffect::None)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn tap(index: usize, id: &str) -> ViewEvent {
        ViewEvent::Tap {
            index,
            id: id.to_string(),
        }
    }

    #[test]
    fn test_tap_opens_viewer_when_browsing() {
        let mut machine = ViewMachine::new(ids(&["a", "b"]));
        assert_eq!(machine.handle(tap(1, "b")), ViewEffect::OpenViewer { index: 1 });
        assert_eq!(machine.state(), &ViewState::Viewing { index: 1 });

        assert_eq!(machine.handle(ViewEvent::CloseViewer), ViewEffect::CloseViewer);
        assert_eq!(machine.state(), &ViewState::Browsing);
    }

    #[test]
    fn test_tap_toggles_when_selecting() {
        let mut machine = ViewMachine::new(ids(&["a", "b", "c"]));
        machine.handle(ViewEvent::EnterSelection);

        assert_eq!(machine.handle(tap(0, "a")), ViewEffect::SelectionChanged(1));
        assert_eq!(machine.handle(tap(2, "c")), ViewEffect::SelectionChanged(2));
        assert_eq!(machine.handle(tap(0, "a")), ViewEffect::SelectionChanged(1));
        assert_eq!(machine.selected(), ids(&["c"]));
    }

    #[test]
    fn test_select_all_then_deleted() {
        let mut machine = ViewMachine::new(ids(&["a", "b"]));
        machine.handle(ViewEvent::EnterSelection);
        assert_eq!(machine.handle(ViewEvent::SelectAll), ViewEffect::SelectionChanged(2));

        machine.handle(ViewEvent::SelectionDeleted);
        assert_eq!(machine.state(), &ViewState::Browsing);
    }

    #[test]
    fn test_snapshot_prunes_selection() {
        let mut machine = ViewMachine::new(ids(&["a", "b", "c"]));
        machine.handle(ViewEvent::EnterSelection);
        machine.handle(ViewEvent::Toggle("a".into()));
        machine.handle(ViewEvent::Toggle("b".into()));

        let effect = machine.handle(ViewEvent::SnapshotReplaced(ids(&["b", "c"])));
        assert_eq!(effect, ViewEffect::SelectionChanged(1));
        assert_eq!(machine.selected(), ids(&["b"]));
    }

    #[test]
    fn test_snapshot_clamps_or_closes_viewer() {
        let mut machine = ViewMachine::new(ids(&["a", "b", "c"]));
        machine.handle(tap(2, "c"));

        machine.handle(ViewEvent::SnapshotReplaced(ids(&["a"])));
        assert_eq!(machine.state(), &ViewState::Viewing { index: 0 });

        let effect = machine.handle(ViewEvent::SnapshotReplaced(Vec::new()));
        assert_eq!(effect, ViewEffect::CloseViewer);
        assert_eq!(machine.state(), &ViewState::Browsing);
    }

    #[test]
    fn test_unknown_ids_are_not_selected() {
        let mut machine = ViewMachine::new(ids(&["a"]));
        machine.handle(ViewEvent::EnterSelection);
        assert_eq!(
            machine.handle(ViewEvent::Toggle("ghost".into())),
            ViewEffect::SelectionChanged(0)
        );
    }

    #[test]
    fn test_irrelevant_events_are_ignored() {
        let mut machine = ViewMachine::new(ids(&["a"]));
        assert_eq!(machine.handle(ViewEvent::SelectAll), ViewEffect::None);
        assert_eq!(machine.handle(tap(5, "x")), ViewEffect::None);
        assert_eq!(machine.state(), &ViewState::Browsing);
    }
}
