use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::initiative::Initiative;
use crate::stack::{StateChange, UndoStack};
use crate::state::{Action, AppState, AppStateChange, PropEquality, TextSearch};

pub type ChangeHandler = Box<dyn FnMut(&AppStateChange) + Send>;

/// Drives an [`AppState`] through its transitions, keeping an undo history.
///
/// Transitions that change nothing are neither recorded nor announced. Every
/// accepted transition, and every step back or forward, calls the change
/// handler exactly once.
pub struct StateManager {
    stack: UndoStack<AppState, Action>,
    on_change: Option<ChangeHandler>,
}

impl StateManager {
    pub fn new(initiatives: Vec<Arc<Initiative>>) -> Self {
        Self {
            stack: UndoStack::new(StateChange::new(Action::Initialise, AppState::new(initiatives))),
            on_change: None,
        }
    }
    pub fn with_handler(mut self, handler: impl FnMut(&AppStateChange) + Send + 'static) -> Self {
        self.on_change = Some(Box::new(handler));
        self
    }
    pub fn set_handler(&mut self, handler: impl FnMut(&AppStateChange) + Send + 'static) {
        self.on_change = Some(Box::new(handler));
    }

    pub fn current(&self) -> &AppStateChange {
        self.stack.current()
    }
    pub fn current_state(&self) -> &AppState {
        &self.stack.current().result
    }
    pub fn can_go_back(&self) -> bool {
        !self.stack.is_at_start()
    }
    pub fn can_go_forward(&self) -> bool {
        !self.stack.is_at_end()
    }
    pub fn history_len(&self) -> usize {
        self.stack.len()
    }
    pub fn alt_values(&self, prop_name: &str) -> BTreeSet<String> {
        self.current_state().alt_values(prop_name)
    }

    pub fn text_search(&mut self, text: &str) -> bool {
        let change = self.current_state().add_text_search(TextSearch::new(text));
        self.accept(change)
    }
    pub fn prop_filter(&mut self, filter: PropEquality) -> bool {
        let change = self.current_state().add_prop_equality(filter);
        self.accept(change)
    }
    pub fn clear_prop_filter(&mut self, prop_name: &str) -> bool {
        let change = self.current_state().remove_prop_equality(prop_name);
        self.accept(change)
    }
    pub fn clear_prop_filters(&mut self) -> bool {
        let change = self.current_state().remove_prop_equalities();
        self.accept(change)
    }
    pub fn clear_filters_and_search(&mut self) -> bool {
        let change = self.current_state().remove_prop_equalities_and_clear_text_search();
        self.accept(change)
    }

    /// Steps back in history and announces the resulting state, even at the
    /// start of history.
    pub fn back(&mut self) {
        if !self.stack.back() {
            debug!("already at the start of history");
        }
        self.notify();
    }
    /// Steps forward in history and announces the resulting state, even at the
    /// end of history.
    pub fn forward(&mut self) {
        if !self.stack.forward() {
            debug!("already at the end of history");
        }
        self.notify();
    }

    /// With new initiatives, discards history and starts again from the
    /// current search and filters over the new set. Without, discards
    /// history back to the first state. Always announced.
    pub fn reset(&mut self, initiatives: Option<Vec<Arc<Initiative>>>) {
        match initiatives {
            Some(initiatives) => {
                let change = self.current_state().restart_state(initiatives);
                self.stack.reset(change);
            }
            None => self.stack.clear(),
        }
        self.notify();
    }

    fn accept(&mut self, change: Option<AppStateChange>) -> bool {
        match change {
            Some(change) => {
                debug!(action = ?change.action, visible = change.result.visible_count(), "state change");
                self.stack.push(change);
                self.notify();
                true
            }
            None => false,
        }
    }
    fn notify(&mut self) {
        if let Some(handler) = self.on_change.as_mut() {
            handler(self.stack.current());
        }
    }
}
