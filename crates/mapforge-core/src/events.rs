//! Engine-to-host notifications.
//!
//! The engine never calls back into the host; observable state changes
//! are queued as events and drained explicitly each frame.

use crate::grid::GridCell;
use crate::tokens::TokenSummary;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Notification emitted by the engine for the host to consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// The token set changed; carries the fresh summary list.
    TokensChanged(Vec<TokenSummary>),
    /// A single asset was successfully placed on the board.
    AssetPlaced { cell: GridCell, asset_id: String },
    /// A token was right-clicked; the host draws the context menu at the
    /// given screen position.
    TokenRightClicked { token_id: String, screen_pos: Point },
    /// The host should close any open context menu.
    CloseContextMenu,
}

/// FIFO queue of pending engine events.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<EngineEvent>,
}

impl EventQueue {
    /// Queue an event for the host.
    pub fn push(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    /// Drain all pending events in emission order.
    pub fn take(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether anything is pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_drains_in_order() {
        let mut queue = EventQueue::default();
        queue.push(EngineEvent::CloseContextMenu);
        queue.push(EngineEvent::AssetPlaced {
            cell: GridCell::new(1, 2),
            asset_id: "tree".to_string(),
        });

        let events = queue.take();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], EngineEvent::CloseContextMenu);
        assert!(queue.is_empty());
    }
}
