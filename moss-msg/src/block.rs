//! The Block1/Block2 option value.

use tinyvec::ArrayVec;

/// Three items of information are packed into a Block (Block1 or
/// Block2) option value:
/// * the block size ([`Block::size`], stored as the exponent szx where
///   size = `2^(szx + 4)`)
/// * whether more blocks follow ([`Block::more`])
/// * the number of the block ([`Block::num`]) within the sequence of
///   blocks of that size.
///
/// On the wire the value is an unsigned integer
/// `num << 4 | more << 3 | szx` carried in 1 to 3 bytes, network byte
/// order, shortest form.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Block(u32);

impl Block {
  /// Largest block number representable in the 3 bytes the draft
  /// allots to this option.
  pub const MAX_NUM: u32 = (1 << 20) - 1;

  /// Pack a block value. `size` is clamped to 16–1024 and rounded down
  /// to a power of two.
  pub fn new(size: u16, num: u32, more: bool) -> Self {
    let size = size.clamp(16, 1024);
    let szx = (15 - size.leading_zeros()) - 4;
    Block((num << 4) | (u32::from(more) << 3) | szx)
  }

  /// The size exponent; block size = `2^(szx + 4)`.
  pub fn szx(&self) -> u8 {
    (self.0 & 0b111).min(6) as u8
  }

  /// Block size in bytes, 16–1024.
  pub fn size(&self) -> u16 {
    1 << (self.szx() + 4)
  }

  /// Whether more blocks follow this one.
  pub fn more(&self) -> bool {
    self.0 & 0b1000 != 0
  }

  /// Block number within the transfer.
  pub fn num(&self) -> u32 {
    self.0 >> 4
  }

  /// Shortest-form network-byte-order value bytes (1 to 3 of them).
  pub fn value_bytes(&self) -> ArrayVec<[u8; 3]> {
    let mut out = ArrayVec::new();
    if self.0 > 0xff_ff {
      out.push((self.0 >> 16) as u8);
    }
    if self.0 > 0xff {
      out.push((self.0 >> 8) as u8);
    }
    out.push(self.0 as u8);
    out
  }

  /// Parse the option value. `None` for values longer than 3 bytes.
  pub fn from_value_bytes(bytes: &[u8]) -> Option<Self> {
    if bytes.len() > 3 {
      return None;
    }

    Some(Block(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))))
  }
}

impl From<Block> for u32 {
  fn from(b: Block) -> Self {
    b.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pack_unpack() {
    let b = Block::new(32, 2, false);
    assert_eq!(b.size(), 32);
    assert_eq!(b.num(), 2);
    assert!(!b.more());
    assert_eq!(u32::from(b), 33);

    let b = Block::new(128, 3, true);
    assert_eq!(b.size(), 128);
    assert_eq!(b.num(), 3);
    assert!(b.more());
    assert_eq!(u32::from(b), 59);
  }

  #[test]
  fn size_rounds_down_to_nearest_power_of_two() {
    assert_eq!(Block::new(0, 1, false).size(), 16);
    assert_eq!(Block::new(17, 1, false).size(), 16);
    assert_eq!(Block::new(31, 1, false).size(), 16);
    assert_eq!(Block::new(33, 1, false).size(), 32);
    assert_eq!(Block::new(1024, 1, false).size(), 1024);
    assert_eq!(Block::new(2048, 1, false).size(), 1024);
  }

  #[test]
  fn value_bytes_shortest_form() {
    assert_eq!(Block::new(16, 0, true).value_bytes().as_slice(), &[0x08]);
    assert_eq!(Block::new(16, 15, false).value_bytes().as_slice(), &[0xf0]);
    assert_eq!(Block::new(16, 16, false).value_bytes().as_slice(),
               &[0x01, 0x00]);
    assert_eq!(Block::new(16, 5000, true).value_bytes().as_slice(),
               &[0x01, 0x38, 0x88]);
  }

  #[test]
  fn round_trips_through_value_bytes() {
    for (size, num, more) in [(16, 0, true), (64, 3, false), (1024, 70_000, true)] {
      let b = Block::new(size, num, more);
      assert_eq!(Block::from_value_bytes(&b.value_bytes()), Some(b));
    }
  }

  #[test]
  fn rejects_overlong_values() {
    assert_eq!(Block::from_value_bytes(&[1, 2, 3, 4]), None);
    assert_eq!(Block::from_value_bytes(&[]), Some(Block(0)));
  }
}
