//! Ordered record of delivered, unacknowledged messages.

use std::collections::VecDeque;

use super::{Delivery, DeliveryTag};

/// Deliveries in hand-off order.
#[derive(Debug, Default)]
pub(crate) struct DeliveryLedger {
    entries: VecDeque<Delivery>,
}

impl DeliveryLedger {
    pub(crate) fn record(&mut self, delivery: Delivery) {
        debug_assert!(
            self.entries.back().is_none_or(|last| last.tag < delivery.tag),
            "deliveries must be recorded in tag order"
        );
        self.entries.push_back(delivery);
    }

    /// Remove and return every delivery up to and including `tag`.
    ///
    /// Returns an empty list when `tag` is not pending, for example because
    /// an earlier cumulative acknowledgement already covered it.
    pub(crate) fn take_through(&mut self, tag: DeliveryTag) -> Vec<Delivery> {
        match self.entries.iter().position(|d| d.tag == tag) {
            Some(index) => self.entries.drain(..=index).collect(),
            None => Vec::new(),
        }
    }

    /// Remove and return exactly the delivery for `tag`.
    pub(crate) fn take_one(&mut self, tag: DeliveryTag) -> Option<Delivery> {
        let index = self.entries.iter().position(|d| d.tag == tag)?;
        self.entries.remove(index)
    }

    /// Put deliveries back in tag order, e.g. after a failed send.
    pub(crate) fn restore(&mut self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            let index = self.entries.partition_point(|d| d.tag < delivery.tag);
            self.entries.insert(index, delivery);
        }
    }

    /// Remove and return everything, oldest first.
    pub(crate) fn take_all(&mut self) -> Vec<Delivery> { self.entries.drain(..).collect() }

    pub(crate) fn len(&self) -> usize { self.entries.len() }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool { self.entries.is_empty() }
}
