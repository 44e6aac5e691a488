use embedded_time::Instant;

/// A duration, in milliseconds
pub type Millis = embedded_time::duration::Milliseconds<u64>;

/// Supertrait of [`embedded_time::Clock`] pinning the
/// type of "ticks" to u64
pub trait Clock: embedded_time::Clock<T = u64> {}
impl<C: embedded_time::Clock<T = u64>> Clock for C {}

/// Milliseconds between `since` and `now`, zero when the clock appears
/// to have gone backwards.
pub(crate) fn elapsed<C: Clock>(since: Instant<C>, now: Instant<C>) -> Millis {
  now.checked_duration_since(&since)
     .and_then(|d| Millis::try_from(d).ok())
     .unwrap_or(Millis::new(0))
}

#[cfg(test)]
mod tests {
  use embedded_time::rate::Fraction;
  use embedded_time::Instant;

  use super::*;

  struct MsClock;

  impl embedded_time::Clock for MsClock {
    type T = u64;

    const SCALING_FACTOR: Fraction = Fraction::new(1, 1000);

    fn try_now(&self) -> Result<Instant<Self>, embedded_time::clock::Error> {
      Ok(Instant::new(0))
    }
  }

  #[test]
  fn elapsed_millis() {
    let a = Instant::<MsClock>::new(1_000);
    let b = Instant::<MsClock>::new(3_500);
    assert_eq!(elapsed(a, b), Millis::new(2_500));
    assert_eq!(elapsed(b, a), Millis::new(0));
  }
}
