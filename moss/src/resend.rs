//! The store of in-flight Confirmable messages.
//!
//! Every Confirmable the engine sends is parked here until the peer
//! acknowledges (or resets) it. [`ResendQueue::tick`] walks the due
//! entries: each one still holding attempts is re-emitted and its delay
//! doubles; one that has run dry is removed and reported so the
//! application learns the peer is unresponsive.

use ::core::cmp::Ordering;

use embedded_time::Instant;
use moss_msg::Id;
use rand::Rng;
use std_alloc::vec::Vec;

use crate::net::Addrd;
use crate::retry::{Attempts, Strategy};
use crate::time::{Clock, Millis};

/// The queue has no free slot for another in-flight Confirmable.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Full;

/// Whether an inbound Ack/Reset paired up with an in-flight entry.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AckMatch {
  /// An entry was cancelled
  Matched,
  /// Nothing in flight had that `(peer, id)`
  NotFound,
}

struct Entry<C: Clock> {
  dest: Addrd<Id>,
  packet: Vec<u8>,
  next_send_at: Instant<C>,
  attempts_remaining: u16,
  cur_delay: Millis,
}

impl<C: Clock> ::core::fmt::Debug for Entry<C> {
  fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
    f.debug_struct("Entry")
     .field("dest", &self.dest)
     .field("packet_len", &self.packet.len())
     .field("attempts_remaining", &self.attempts_remaining)
     .field("cur_delay", &self.cur_delay)
     .finish()
  }
}

/// What one [`ResendQueue::tick`] found to do.
#[derive(Debug)]
pub struct TickOutcome<'a> {
  /// Packets to put back on the wire, oldest due time first
  /// (registration order breaks ties)
  pub resend: Vec<Addrd<&'a [u8]>>,
  /// Entries whose attempts ran out, now removed
  pub expired: Vec<Addrd<Id>>,
}

/// In-flight Confirmables in registration order, bounded capacity.
#[derive(Debug)]
pub struct ResendQueue<C: Clock> {
  entries: Vec<Entry<C>>,
  capacity: usize,
}

impl<C: Clock> ResendQueue<C> {
  /// A queue that will track at most `capacity` messages at once.
  pub fn new(capacity: usize) -> Self {
    ResendQueue { entries: Vec::with_capacity(capacity),
                  capacity }
  }

  /// Park an already-transmitted Confirmable until its Ack arrives.
  ///
  /// The first re-send is scheduled `strategy.initial_delay` from
  /// `now`; `max_attempts` re-sends happen before the entry expires.
  pub fn register(&mut self,
                  dest: Addrd<Id>,
                  packet: Vec<u8>,
                  now: Instant<C>,
                  strategy: &Strategy,
                  max_attempts: Attempts,
                  rng: &mut impl Rng)
                  -> Result<(), Full> {
    if self.entries.len() >= self.capacity {
      return Err(Full);
    }

    let delay = strategy.initial_delay(rng);
    self.entries.push(Entry { dest,
                              packet,
                              next_send_at: now + delay,
                              attempts_remaining: max_attempts.0,
                              cur_delay: delay });
    Ok(())
  }

  /// Cancel the entry matching an inbound Ack or Reset.
  pub fn ack_or_reset(&mut self, from: Addrd<Id>) -> AckMatch {
    match self.entries.iter().position(|e| e.dest == from) {
      | Some(i) => {
        self.entries.remove(i);
        log::trace!("{:?} acked by {}", from.data(), from.addr());
        AckMatch::Matched
      },
      | None => AckMatch::NotFound,
    }
  }

  /// Number of messages currently in flight.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Whether nothing is in flight.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Process everything due at `now`.
  ///
  /// Entries re-emitted here keep their exact binary-backoff schedule
  /// (`next_send_at` advances by the delay just waited, then the delay
  /// doubles), so a late `tick` does not stretch the series.
  pub fn tick(&mut self, now: Instant<C>, strategy: &Strategy) -> TickOutcome<'_> {
    let mut expired = Vec::new();
    let mut i = 0;
    while i < self.entries.len() {
      let e = &self.entries[i];
      if e.next_send_at <= now && e.attempts_remaining == 0 {
        expired.push(self.entries.remove(i).dest);
      } else {
        i += 1;
      }
    }

    let mut due = self.entries
                      .iter()
                      .enumerate()
                      .filter(|(_, e)| e.next_send_at <= now)
                      .map(|(i, _)| i)
                      .collect::<Vec<_>>();
    due.sort_by(|&a, &b| {
         self.entries[a].next_send_at
                        .partial_cmp(&self.entries[b].next_send_at)
                        .unwrap_or(Ordering::Equal)
       });

    for &i in &due {
      let e = &mut self.entries[i];
      e.next_send_at = e.next_send_at + e.cur_delay;
      e.cur_delay = strategy.next_delay(e.cur_delay);
      e.attempts_remaining -= 1;
      log::debug!("re-sending {:?} to {}, {} attempts left",
                  e.dest.data(),
                  e.dest.addr(),
                  e.attempts_remaining);
    }

    let resend = due.iter()
                    .map(|&i| {
                      let e = &self.entries[i];
                      Addrd(e.packet.as_slice(), e.dest.addr())
                    })
                    .collect();

    TickOutcome { resend, expired }
  }
}
