//! The option set a draft-09 message may carry.
//!
//! Options are not an open-ended list here: the draft defines a closed
//! set, so [`Opts`] is a plain record with one field per known option.
//! Single-valued options are `Option<_>`, repeatable options
//! (Uri-Path, Uri-Query, Location-Path) are ordered segment sequences.

use std_alloc::vec::Vec;

use crate::block::Block;

/// Option numbers assigned by draft-ietf-core-coap-09.
///
/// Numbers must appear in ascending order on the wire with consecutive
/// deltas of at most 14; [`OptNumber::FENCEPOST`] multiples bridge
/// larger gaps and carry no value.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[allow(missing_docs)]
pub enum OptNumber {
  ContentType = 1,
  MaxAge = 2,
  ProxyUri = 3,
  ETag = 4,
  UriHost = 5,
  LocationPath = 6,
  UriPort = 7,
  LocationQuery = 8,
  UriPath = 9,
  Observe = 10,
  Token = 11,
  Fencepost1 = 14,
  UriQuery = 15,
  Block2 = 17,
  Block1 = 19,
}

impl OptNumber {
  /// The base Fencepost number; every multiple of it is a Fencepost.
  pub const FENCEPOST: u16 = 14;

  /// Whether `number` is one of the Fencepost placeholders.
  pub fn is_fencepost(number: u16) -> bool {
    number != 0 && number % Self::FENCEPOST == 0
  }

  /// Whether an option of `number` may directly repeat (encoded with a
  /// zero delta from its predecessor).
  pub fn allows_repeat(number: u16) -> bool {
    matches!(number, 4 | 6 | 9 | 15)
  }
}

/// The value bytes of a single option instance.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptValue(pub Vec<u8>);

impl OptValue {
  /// Value from a string, e.g. one Uri-Path segment.
  pub fn from_str(s: &str) -> Self {
    OptValue(s.as_bytes().to_vec())
  }

  /// Value holding a `u16` in network byte order, e.g. Uri-Port.
  pub fn from_u16(n: u16) -> Self {
    OptValue(n.to_be_bytes().to_vec())
  }
}

/// The options of one message, at most one value per single-valued
/// option and ordered segments for the repeatable ones.
///
/// Uri-Path, Uri-Query and Location-Path can be filled either segment
/// by segment or from a delimited string:
///
/// ```
/// use moss_msg::{OptValue, Opts};
///
/// let mut a = Opts::default();
/// a.set_uri_path_str("/sensors/temp");
///
/// let mut b = Opts::default();
/// b.uri_path.push(OptValue::from_str("sensors"));
/// b.uri_path.push(OptValue::from_str("temp"));
///
/// assert_eq!(a, b);
/// ```
#[derive(Clone, PartialEq, Debug, Default)]
#[allow(missing_docs)]
pub struct Opts {
  pub content_type: Option<OptValue>,
  pub max_age: Option<OptValue>,
  pub proxy_uri: Option<OptValue>,
  pub etag: Option<OptValue>,
  pub uri_host: Option<OptValue>,
  pub location_path: Vec<OptValue>,
  pub uri_port: Option<OptValue>,
  pub location_query: Option<OptValue>,
  pub uri_path: Vec<OptValue>,
  pub observe: Option<OptValue>,
  pub uri_query: Vec<OptValue>,
  pub block2: Option<Block>,
  pub block1: Option<Block>,
}

fn split_into(dst: &mut Vec<OptValue>, s: &str, sep: char) {
  dst.clear();
  dst.extend(s.split(sep)
              .filter(|seg| !seg.is_empty())
              .map(OptValue::from_str));
}

impl Opts {
  /// Replace Uri-Path with the segments of a `/`-delimited path.
  ///
  /// Empty segments are skipped; a leading `/` is permitted.
  pub fn set_uri_path_str(&mut self, path: &str) {
    split_into(&mut self.uri_path, path, '/');
  }

  /// Replace Uri-Query with the segments of an `&`-delimited query.
  pub fn set_uri_query_str(&mut self, query: &str) {
    split_into(&mut self.uri_query, query, '&');
  }

  /// Replace Location-Path with the segments of a `/`-delimited path.
  pub fn set_location_path_str(&mut self, path: &str) {
    split_into(&mut self.location_path, path, '/');
  }

  /// Whether no option is present at all.
  pub fn is_empty(&self) -> bool {
    *self == Opts::default()
  }

  /// Whether any option other than Block1/Block2 is present.
  pub fn any_beyond_block(&self) -> bool {
    let mut bare = self.clone();
    bare.block1 = None;
    bare.block2 = None;
    !bare.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn path_splitting_skips_empty_segments() {
    let mut opts = Opts::default();
    opts.set_uri_path_str("/a//b/");
    assert_eq!(opts.uri_path,
               vec![OptValue::from_str("a"), OptValue::from_str("b")]);
  }

  #[test]
  fn query_splitting() {
    let mut opts = Opts::default();
    opts.set_uri_query_str("first=1&second=2");
    assert_eq!(opts.uri_query,
               vec![OptValue::from_str("first=1"), OptValue::from_str("second=2")]);
  }

  #[test]
  fn empty_string_yields_no_segments() {
    let mut opts = Opts::default();
    opts.set_uri_path_str("");
    assert!(opts.uri_path.is_empty());
    assert!(opts.is_empty());
  }

  #[test]
  fn fencepost_multiples() {
    assert!(OptNumber::is_fencepost(14));
    assert!(OptNumber::is_fencepost(28));
    assert!(!OptNumber::is_fencepost(0));
    assert!(!OptNumber::is_fencepost(15));
  }

  #[test]
  fn beyond_block() {
    let mut opts = Opts::default();
    opts.block1 = Some(Block::new(16, 0, true));
    assert!(!opts.any_beyond_block());

    opts.observe = Some(OptValue(vec![0]));
    assert!(opts.any_beyond_block());
  }
}
