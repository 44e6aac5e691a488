//! The recently-seen window.
//!
//! An unreliable transport will hand us the same Confirmable more than
//! once — the peer re-sends until we ack. The application should see
//! one delivery, so receptions are checked against a short-TTL record
//! of `(peer, message id)` pairs. Message type and token are
//! deliberately not part of the key.

use embedded_time::Instant;
use moss_msg::Id;
use std_alloc::vec::Vec;

use crate::net::Addrd;
use crate::time::{elapsed, Clock, Millis};

/// Whether a reception has been seen before.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Disposition {
  /// First sighting inside the window; a record now exists
  Fresh,
  /// Same `(peer, id)` seen within the window; suppress it
  Duplicate,
}

struct Record<C: Clock> {
  key: Addrd<Id>,
  first_seen: Instant<C>,
}

impl<C: Clock> ::core::fmt::Debug for Record<C> {
  fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
    f.debug_struct("Record").field("key", &self.key).finish()
  }
}

/// Recently seen `(peer, message id)` pairs, oldest first.
#[derive(Debug)]
pub struct DedupStore<C: Clock> {
  records: Vec<Record<C>>,
  window: Millis,
  capacity: usize,
}

impl<C: Clock> DedupStore<C> {
  /// A store remembering receptions for `window`, holding at most
  /// `capacity` records.
  pub fn new(window: Millis, capacity: usize) -> Self {
    DedupStore { records: Vec::with_capacity(capacity),
                 window,
                 capacity }
  }

  /// Record a reception, reporting whether it is a repeat.
  ///
  /// A matching record older than the window does not count; the
  /// reception is fresh and re-stamps the record. When a fresh
  /// insertion finds the store full, the oldest record is evicted,
  /// first in, first out.
  pub fn check_and_record(&mut self, key: Addrd<Id>, now: Instant<C>) -> Disposition {
    if let Some(i) = self.records.iter().position(|r| r.key == key) {
      if elapsed(self.records[i].first_seen, now) < self.window {
        return Disposition::Duplicate;
      }
      self.records.remove(i);
    }

    if self.records.len() >= self.capacity {
      let evicted = self.records.remove(0);
      log::debug!("dedup store full, evicting {:?} from {}",
                  evicted.key.data(),
                  evicted.key.addr());
    }

    self.records.push(Record { key, first_seen: now });
    Disposition::Fresh
  }

  /// Drop every record older than the window.
  pub fn reap(&mut self, now: Instant<C>) {
    let window = self.window;
    self.records.retain(|r| elapsed(r.first_seen, now) < window);
  }

  /// Number of live records.
  pub fn len(&self) -> usize {
    self.records.len()
  }

  /// Whether no reception is on record.
  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}
