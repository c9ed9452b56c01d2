//! Per-simulation message bus for enemy coordination.
//!
//! Listeners register per message kind. Telegrams posted during a tick are
//! queued in order and delivered by the owning simulation before the next
//! enemy updates. Handlers get no access to the bus, so delivery never
//! re-enters it.

use std::collections::{BTreeMap, VecDeque};

use bevy::prelude::*;

use super::world::BodyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    /// A pinned enemy asks nearby allies to come to its position.
    BackupRequest,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    None,
    Position(Vec2),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telegram {
    pub kind: MessageKind,
    pub sender: BodyId,
    /// `None` broadcasts to every listener of `kind`.
    pub receiver: Option<BodyId>,
    pub payload: Payload,
}

impl Telegram {
    pub fn broadcast(kind: MessageKind, sender: BodyId, payload: Payload) -> Self {
        Self {
            kind,
            sender,
            receiver: None,
            payload,
        }
    }

    pub fn direct(kind: MessageKind, sender: BodyId, receiver: BodyId, payload: Payload) -> Self {
        Self {
            kind,
            sender,
            receiver: Some(receiver),
            payload,
        }
    }

    pub fn position(&self) -> Option<Vec2> {
        match self.payload {
            Payload::Position(p) => Some(p),
            Payload::None => None,
        }
    }

    /// Whether `listener` should receive this telegram.
    pub fn is_for(&self, listener: BodyId) -> bool {
        listener != self.sender && self.receiver.is_none_or(|r| r == listener)
    }
}

#[derive(Debug, Default)]
pub struct MessageBus {
    listeners: BTreeMap<MessageKind, Vec<BodyId>>,
    pending: VecDeque<Telegram>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: MessageKind, listener: BodyId) {
        let list = self.listeners.entry(kind).or_default();
        if !list.contains(&listener) {
            list.push(listener);
        }
    }

    /// Drop `listener` from every kind.
    pub fn unregister(&mut self, listener: BodyId) {
        for list in self.listeners.values_mut() {
            list.retain(|l| *l != listener);
        }
    }

    pub fn is_registered(&self, kind: MessageKind, listener: BodyId) -> bool {
        self.listeners
            .get(&kind)
            .is_some_and(|list| list.contains(&listener))
    }

    /// Listeners of `kind` in registration order.
    pub fn listeners(&self, kind: MessageKind) -> &[BodyId] {
        self.listeners.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn post(&mut self, telegram: Telegram) {
        self.pending.push_back(telegram);
    }

    pub fn pop(&mut self) -> Option<Telegram> {
        self.pending.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Recipients of `telegram`: registered listeners it is addressed to.
    pub fn recipients(&self, telegram: &Telegram) -> Vec<BodyId> {
        self.listeners(telegram.kind)
            .iter()
            .copied()
            .filter(|l| telegram.is_for(*l))
            .collect()
    }
}
