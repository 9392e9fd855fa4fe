//! Last-request-wins bookkeeping for widget refreshes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Ticket issued when a widget refresh starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    widget: String,
    sequence: u64,
}

impl RefreshTicket {
    pub fn widget(&self) -> &str {
        &self.widget
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Issues monotonically increasing tickets per widget id. A result whose
/// ticket is no longer the latest is stale.
///
/// Only widgets with a refresh in flight have an entry; the latest refresh
/// removes it when it finishes. Sequences come from one counter shared by all
/// widgets, so a ticket is never reissued after its entry is dropped.
#[derive(Debug, Default)]
pub struct RefreshTracker {
    inner: Mutex<Tickets>,
}

#[derive(Debug, Default)]
struct Tickets {
    next: u64,
    latest: HashMap<String, u64>,
}

impl Tickets {
    fn is_current(&self, ticket: &RefreshTicket) -> bool {
        self.latest.get(&ticket.widget).copied() == Some(ticket.sequence)
    }
}

impl RefreshTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn tickets(&self) -> MutexGuard<'_, Tickets> {
        // Counters stay valid even if a holder panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn begin(&self, widget: &str) -> RefreshTicket {
        let mut tickets = self.tickets();
        tickets.next += 1;
        let sequence = tickets.next;
        tickets.latest.insert(widget.to_string(), sequence);
        RefreshTicket {
            widget: widget.to_string(),
            sequence,
        }
    }

    #[cfg(test)]
    fn is_current(&self, ticket: &RefreshTicket) -> bool {
        self.tickets().is_current(ticket)
    }

    /// Returns true when the ticket was superseded while it was in flight.
    pub fn finish(&self, ticket: &RefreshTicket) -> bool {
        let mut tickets = self.tickets();
        let current = tickets.is_current(ticket);
        if current {
            tickets.latest.remove(&ticket.widget);
        } else {
            tracing::debug!(
                widget = %ticket.widget,
                sequence = ticket.sequence,
                "discarding superseded refresh"
            );
        }
        !current
    }

    /// Widgets with a refresh in flight.
    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.tickets().latest.len()
    }
}
