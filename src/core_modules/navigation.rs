// THEORY:
// The `navigation` module is the breadcrumb state machine that decides which
// stimulus is "current" and which navigation affordances are visible at each
// depth. It is driven purely by key events matched against the precomputed
// affordance table; it never touches the taxonomy tree itself.
//
// Key architectural principles:
// 1.  **Explicit State, Pure Transition**: All breadcrumb state lives in this
//     one struct and changes only inside `handle`, which maps
//     (state, event) -> (state', view). Nothing here is ambient or global.
// 2.  **Downward Visibility Cascade**: Clicking a node reveals its direct
//     children; everything else keeps its previous visibility only while its
//     level is within the clicked depth. Visibility never leaks sideways into
//     sibling groups shallower than the click.
// 3.  **Ancestor Chain to Depth Three**: After a deep click the path fragment
//     holds (parent, clicked); the grandparent is recovered from whichever
//     shallow key was clicked previously. This chain is only correct to three
//     levels, which is exactly as deep as the taxonomy goes.
// 4.  **Padded Hand-Off**: The returned path always carries exactly three
//     keys, padded with the implicit "Video" leaf, so resolution downstream
//     is total. The returned depth is `level + 1`, the hand-off the playback
//     layer uses to gate its controls.

use crate::core_modules::taxonomy::{Affordance, SelectionPath, DEFAULT_VARIANT_KEY};
use std::collections::HashMap;
use tracing::debug;

/// Depth the controller starts at; deep enough that every already-visible
/// affordance survives the first cascade before any click lands.
const INITIAL_LEVEL: u8 = 4;

/// What one navigation step hands to the rest of the iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationView {
    /// Exactly three keys, padded with "Video" where the selection is shallow.
    pub path: SelectionPath,
    /// `level_clicked + 1`; playback enables its controls only once the
    /// selection has reached full depth.
    pub depth: u8,
}

/// Breadcrumb/visibility state machine over the affordance table.
pub struct NavigationController {
    clicked_path: Vec<String>,
    level_clicked: u8,
    visible: HashMap<String, bool>,
}

impl NavigationController {
    /// Starts with only top-level affordances visible.
    pub fn new(table: &[Affordance]) -> Self {
        let visible = table
            .iter()
            .map(|a| (a.key.clone(), a.level == 1))
            .collect();
        Self {
            clicked_path: Vec::new(),
            level_clicked: INITIAL_LEVEL,
            visible,
        }
    }

    /// Whether the affordance with `key` is currently shown.
    pub fn is_visible(&self, key: &str) -> bool {
        self.visible.get(key).copied().unwrap_or(false)
    }

    /// Runs one transition. `event` is the raw key of whatever fired this
    /// iteration; non-affordance keys leave the click state untouched but
    /// still re-derive visibility and the padded path.
    pub fn handle(&mut self, event: &str, table: &[Affordance]) -> NavigationView {
        let last_key_clicked = self.clicked_path.first().cloned();

        // A matching affordance key becomes the new click fragment.
        for affordance in table {
            if event == affordance.key {
                self.level_clicked = affordance.level;
                self.clicked_path = vec![
                    affordance.parent.clone().unwrap_or_default(),
                    affordance.key.clone(),
                ];
                debug!(key = %affordance.key, level = affordance.level, "affordance clicked");
            }
        }

        // Re-derive visibility for every affordance and recover the ancestor
        // chain element the two-slot click fragment cannot hold.
        for affordance in table {
            let was_visible = self.is_visible(&affordance.key);
            let is_child_of_click = affordance.parent.as_deref() == Some(event);
            if is_child_of_click || (affordance.level <= self.level_clicked && was_visible) {
                self.visible.insert(affordance.key.clone(), true);
                if affordance.level + 1 < self.level_clicked
                    && last_key_clicked.as_deref() == Some(affordance.key.as_str())
                    && self.clicked_path.first() != Some(&affordance.key)
                {
                    self.clicked_path.insert(0, affordance.key.clone());
                }
            } else {
                self.visible.insert(affordance.key.clone(), false);
            }
        }

        while self.clicked_path.len() < 3 {
            self.clicked_path.push(DEFAULT_VARIANT_KEY.to_string());
        }

        let view = NavigationView {
            path: SelectionPath::from_keys(self.clicked_path.iter().cloned()),
            depth: self.level_clicked.saturating_add(1),
        };
        // The depth hand-off keeps counting between clicks; only a new click
        // pulls it back down to its level.
        self.level_clicked = view.depth;
        view
    }
}
