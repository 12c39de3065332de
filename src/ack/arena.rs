//! Storage for message data retained until final acknowledgement.

use std::collections::HashMap;

use super::DeliveryTag;
use crate::message::Message;

/// Message data keyed by [`DeliveryTag`].
///
/// Tags are allocated here and increase monotonically, so sorting by tag
/// recovers delivery order.
#[derive(Debug, Default)]
pub(crate) struct DeliveryArena {
    slots: HashMap<DeliveryTag, Message>,
    next: u64,
}

impl DeliveryArena {
    /// Store `message` and return the tag identifying this hand-off.
    pub(crate) fn insert(&mut self, message: Message) -> DeliveryTag {
        self.next += 1;
        let tag = DeliveryTag(self.next);
        self.slots.insert(tag, message);
        tag
    }

    pub(crate) fn get(&self, tag: DeliveryTag) -> Option<&Message> { self.slots.get(&tag) }

    /// Remove and return the data for `tag`.
    pub(crate) fn take(&mut self, tag: DeliveryTag) -> Option<Message> { self.slots.remove(&tag) }

    pub(crate) fn clear(&mut self) { self.slots.clear(); }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize { self.slots.len() }
}
