use crate::retry::{Attempts, Strategy};
use crate::time::Millis;

/// Configuration options related to outbound Confirmable messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Con {
  /// Retry strategy for Confirmable messages that have not been acked.
  ///
  /// The initial delay range is the classic
  /// `[ACK_TIMEOUT, ACK_TIMEOUT * ACK_RANDOM_FACTOR]`:
  ///
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use moss::config::Con;
  /// use moss::retry::Strategy;
  ///
  /// assert_eq!(Con::default().retry_strategy,
  ///            Strategy::Exponential { init_min: Milliseconds(2_000),
  ///                                    init_max: Milliseconds(3_000) });
  /// ```
  pub retry_strategy: Strategy,

  /// Number of times an unacked Confirmable is re-sent before the
  /// engine gives up and surfaces a timeout.
  ///
  /// ```
  /// use moss::config::Con;
  /// use moss::retry::Attempts;
  ///
  /// assert_eq!(Con::default().max_attempts, Attempts(4));
  /// ```
  pub max_attempts: Attempts,

  /// Maximum number of Confirmables in flight at once; registering one
  /// more fails with `ResendFull`.
  pub capacity: usize,
}

impl Default for Con {
  fn default() -> Self {
    Con { retry_strategy: Strategy::Exponential { init_min: Millis::new(2_000),
                                                  init_max: Millis::new(3_000) },
          max_attempts: Attempts(4),
          capacity: 16 }
  }
}

/// Configuration options for the duplicate-suppression window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dedup {
  /// How long a `(peer, message id)` pair counts as "recently seen".
  ///
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use moss::config::Dedup;
  ///
  /// assert_eq!(Dedup::default().window, Milliseconds(60_000u64));
  /// ```
  pub window: Millis,

  /// Bound on stored records; a fresh insertion at capacity evicts the
  /// oldest record, first in, first out.
  pub capacity: usize,
}

impl Default for Dedup {
  fn default() -> Self {
    Dedup { window: Millis::new(60_000),
            capacity: 32 }
  }
}

/// Configuration options for blockwise transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
  /// Payloads above this many bytes are sent in blocks of this size.
  /// Must be one of the block sizes the wire can express
  /// (16, 32, 64, ..., 1024); other values are rounded down.
  pub block_size: u16,

  /// Ceiling on the reassembled size of an inbound blockwise transfer;
  /// an overrun fails the transfer with `BlockwiseTooLarge`.
  pub max_incoming_size: usize,

  /// Inbound assemblies untouched for this long are discarded.
  pub idle_timeout: Millis,
}

impl Default for Block {
  fn default() -> Self {
    Block { block_size: 512,
            max_incoming_size: 8_192,
            idle_timeout: Millis::new(60_000) }
  }
}

/// Per-engine runtime configuration.
///
/// Everything the C-heritage of this protocol kept in file-scoped
/// statics lives here instead, passed to [`Engine::new`](crate::Engine::new).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
  /// See [`Con`]
  pub con: Con,
  /// See [`Dedup`]
  pub dedup: Dedup,
  /// See [`Block`]
  pub block: Block,
  /// Seed for the engine's deterministic RNG (retransmission jitter,
  /// first message id). Give each device its own.
  pub seed: u64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.con.max_attempts, Attempts(4));
    assert_eq!(cfg.con.retry_strategy.range(), 2_000..=3_000);
    assert_eq!(cfg.dedup.window, Millis::new(60_000));
    assert_eq!(cfg.block.block_size, 512);
  }
}
