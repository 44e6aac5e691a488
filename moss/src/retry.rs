use ::core::ops::RangeInclusive;

use rand::Rng;

use crate::time::Millis;

/// A number of attempts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempts(pub u16);

/// Strategy to employ when retrying.
///
/// Both variants draw the delay before the *first* retry uniformly from
/// an inclusive range; a degenerate range (`min == max`) skips the
/// random number generator entirely, which is what the tests and hosts
/// without entropy want.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// After each attempt, double the delay before trying again.
  ///
  /// This is the CoAP Confirmable schedule: with an initial delay `d`,
  /// the nth retry happens `d * 2^(n-1)` after the first attempt.
  Exponential {
    /// Minimum (inclusive) delay before the first retry
    init_min: Millis,
    /// Maximum (inclusive) delay before the first retry
    init_max: Millis,
  },
  /// Wait the same delay between all attempts.
  Delay {
    /// Minimum (inclusive) delay between attempts
    min: Millis,
    /// Maximum (inclusive) delay between attempts
    max: Millis,
  },
}

impl Strategy {
  /// The min & max initial delays as an inclusive range of milliseconds
  pub fn range(&self) -> RangeInclusive<u64> {
    match self {
      | &Self::Exponential { init_min,
                             init_max, } => init_min.0..=init_max.0,
      | &Self::Delay { min,
                       max, } => min.0..=max.0,
    }
  }

  /// Are min & max delays distinct? if not, we should skip the random
  /// number generation.
  pub fn has_jitter(&self) -> bool {
    let rng = self.range();
    rng.start() != rng.end()
  }

  /// Draw the delay before the first retry
  pub fn initial_delay(&self, rng: &mut impl Rng) -> Millis {
    if self.has_jitter() {
      Millis::new(rng.gen_range(self.range()))
    } else {
      Millis::new(*self.range().start())
    }
  }

  /// Given the delay that was just waited, the delay to wait before
  /// the attempt after that
  pub fn next_delay(&self, cur: Millis) -> Millis {
    match self {
      | Self::Exponential { .. } => Millis::new(cur.0.saturating_mul(2)),
      | Self::Delay { .. } => cur,
    }
  }
}

#[cfg(test)]
mod tests {
  use rand::SeedableRng;
  use rand_chacha::ChaCha8Rng;

  use super::*;

  #[test]
  fn degenerate_range_skips_rng() {
    let strat = Strategy::Exponential { init_min: Millis::new(2_000),
                                        init_max: Millis::new(2_000) };
    assert!(!strat.has_jitter());

    let mut rng = ChaCha8Rng::seed_from_u64(0);
    assert_eq!(strat.initial_delay(&mut rng), Millis::new(2_000));
    // the rng was never touched
    assert_eq!(rng, ChaCha8Rng::seed_from_u64(0));
  }

  #[test]
  fn jittered_delay_stays_in_range() {
    let strat = Strategy::Exponential { init_min: Millis::new(2_000),
                                        init_max: Millis::new(3_000) };
    assert!(strat.has_jitter());

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for _ in 0..100 {
      let d = strat.initial_delay(&mut rng).0;
      assert!((2_000..=3_000).contains(&d));
    }
  }

  #[test]
  fn exponential_doubles_delays() {
    let strat = Strategy::Exponential { init_min: Millis::new(100),
                                        init_max: Millis::new(100) };
    assert_eq!(strat.next_delay(Millis::new(100)), Millis::new(200));
    assert_eq!(strat.next_delay(Millis::new(200)), Millis::new(400));
  }

  #[test]
  fn fixed_delay_stays_fixed() {
    let strat = Strategy::Delay { min: Millis::new(250),
                                  max: Millis::new(250) };
    assert_eq!(strat.next_delay(Millis::new(250)), Millis::new(250));
  }
}
