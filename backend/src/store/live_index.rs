//! Live index
//!
//! Messages still awaiting a reply or a timeout, keyed by direction and
//! logical kind. A message occupies at most one slot per key, and removing
//! an absent message is a no-op.

use crate::models::message::{Direction, LogicalKind, TradeMessage};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct LiveIndex {
    slots: BTreeMap<(Direction, LogicalKind), Vec<TradeMessage>>,
}

impl LiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message under its folded kind
    ///
    /// Returns `false` if it was already live in that direction.
    pub fn insert(&mut self, direction: Direction, message: TradeMessage) -> bool {
        let slot = self
            .slots
            .entry((direction, message.logical_kind()))
            .or_default();
        if slot.iter().any(|m| m.id() == message.id()) {
            return false;
        }
        slot.push(message);
        true
    }

    /// Remove a message, returning it if it was live
    pub fn remove(
        &mut self,
        direction: Direction,
        kind: LogicalKind,
        message_id: &str,
    ) -> Option<TradeMessage> {
        let slot = self.slots.get_mut(&(direction, kind))?;
        let pos = slot.iter().position(|m| m.id() == message_id)?;
        let removed = slot.remove(pos);
        if slot.is_empty() {
            self.slots.remove(&(direction, kind));
        }
        Some(removed)
    }

    /// Remove a message from both directions
    ///
    /// Returns the directions it was removed from.
    pub fn remove_everywhere(&mut self, kind: LogicalKind, message_id: &str) -> Vec<Direction> {
        [Direction::Sent, Direction::Received]
            .into_iter()
            .filter(|d| self.remove(*d, kind, message_id).is_some())
            .collect()
    }

    pub fn contains(&self, direction: Direction, kind: LogicalKind, message_id: &str) -> bool {
        self.get(direction, kind).iter().any(|m| m.id() == message_id)
    }

    /// Live messages for one (direction, kind) slot, oldest first
    pub fn get(&self, direction: Direction, kind: LogicalKind) -> &[TradeMessage] {
        self.slots
            .get(&(direction, kind))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Live messages belonging to one transaction
    pub fn for_demand<'a>(
        &'a self,
        demand_id: &'a str,
    ) -> impl Iterator<Item = (Direction, &'a TradeMessage)> + 'a {
        self.iter()
            .filter(move |(_, m)| m.internal_demand_id() == demand_id)
    }

    /// Every live message with its direction
    pub fn iter(&self) -> impl Iterator<Item = (Direction, &TradeMessage)> {
        self.slots
            .iter()
            .flat_map(|((direction, _), msgs)| msgs.iter().map(move |m| (*direction, m)))
    }

    /// Total number of live slots
    pub fn len(&self) -> usize {
        self.slots.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::DemandTerms;

    fn demand() -> TradeMessage {
        TradeMessage::internal_demand(
            "BUYER".to_string(),
            DemandTerms {
                product_id: "P".to_string(),
                amount: 1,
                latest_delivery_tick: 10,
            },
            0,
        )
    }

    #[test]
    fn test_insert_once_per_direction() {
        let mut live = LiveIndex::new();
        let msg = demand();

        assert!(live.insert(Direction::Sent, msg.clone()));
        assert!(!live.insert(Direction::Sent, msg.clone()));
        assert!(live.insert(Direction::Received, msg.clone()));
        assert_eq!(live.len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut live = LiveIndex::new();
        let msg = demand();
        live.insert(Direction::Received, msg.clone());

        assert!(live
            .remove(Direction::Received, LogicalKind::InternalDemand, msg.id())
            .is_some());
        assert!(live
            .remove(Direction::Received, LogicalKind::InternalDemand, msg.id())
            .is_none());
        assert!(live.is_empty());
    }

    #[test]
    fn test_remove_everywhere_reports_directions() {
        let mut live = LiveIndex::new();
        let msg = demand();
        live.insert(Direction::Received, msg.clone());

        let removed = live.remove_everywhere(LogicalKind::InternalDemand, msg.id());
        assert_eq!(removed, vec![Direction::Received]);
        assert!(live
            .remove_everywhere(LogicalKind::InternalDemand, msg.id())
            .is_empty());
    }
}
