//! Serializing a [`Message`] into packet bytes.

use std_alloc::vec::Vec;

use crate::opt::OptNumber;
use crate::validate::{validity_check, ValidityError};
use crate::Message;

/// Trait for converting a data structure into wire bytes.
pub trait TryIntoBytes {
  /// Error type yielded if conversion fails
  type Error;

  /// Try to serialize into a byte buffer
  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error>;
}

/// Errors encounterable while building packet bytes from a message.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EncodeError {
  /// The message failed [`validity_check`]
  Invalid(ValidityError),
  /// More than 15 options (Fenceposts included) would be needed
  TooManyOptions,
  /// An option value was longer than the 270 bytes the wire can carry
  BadOptionLength,
}

/// Largest option value the delta/length encoding can express.
pub(crate) const MAX_OPT_LEN: usize = 270;

/// Largest delta between consecutive option numbers; anything bigger
/// needs a Fencepost in between.
pub(crate) const MAX_OPT_DELTA: u16 = 14;

/// Visit every option instance of `msg` in canonical wire order
/// (ascending option number, repeatables in sequence, token as
/// option 11).
///
/// This is the single source of truth for emission order; both the
/// size precomputation and the encoder itself walk it.
pub(crate) fn for_each_wire_opt<E>(msg: &Message,
                                   f: &mut impl FnMut(u16, &[u8]) -> Result<(), E>)
                                   -> Result<(), E> {
  let o = &msg.opts;

  if let Some(v) = &o.content_type {
    f(OptNumber::ContentType as u16, &v.0)?;
  }
  if let Some(v) = &o.max_age {
    f(OptNumber::MaxAge as u16, &v.0)?;
  }
  if let Some(v) = &o.proxy_uri {
    f(OptNumber::ProxyUri as u16, &v.0)?;
  }
  if let Some(v) = &o.etag {
    f(OptNumber::ETag as u16, &v.0)?;
  }
  if let Some(v) = &o.uri_host {
    f(OptNumber::UriHost as u16, &v.0)?;
  }
  for seg in &o.location_path {
    f(OptNumber::LocationPath as u16, &seg.0)?;
  }
  if let Some(v) = &o.uri_port {
    f(OptNumber::UriPort as u16, &v.0)?;
  }
  if let Some(v) = &o.location_query {
    f(OptNumber::LocationQuery as u16, &v.0)?;
  }
  for seg in &o.uri_path {
    f(OptNumber::UriPath as u16, &seg.0)?;
  }
  if let Some(v) = &o.observe {
    f(OptNumber::Observe as u16, &v.0)?;
  }
  if !msg.token.is_empty() {
    f(OptNumber::Token as u16, &msg.token.0)?;
  }
  for seg in &o.uri_query {
    f(OptNumber::UriQuery as u16, &seg.0)?;
  }
  if let Some(b) = &o.block2 {
    f(OptNumber::Block2 as u16, &b.value_bytes())?;
  }
  if let Some(b) = &o.block1 {
    f(OptNumber::Block1 as u16, &b.value_bytes())?;
  }

  Ok(())
}

/// The Fencepost number that follows `prev`: the next multiple of 14
/// strictly above it.
fn next_fencepost(prev: u16) -> u16 {
  (prev / OptNumber::FENCEPOST + 1) * OptNumber::FENCEPOST
}

impl Message {
  /// Exact byte count [`TryIntoBytes`] will produce for this message,
  /// Fencepost and extended-length bytes included.
  pub fn encoded_size(&self) -> usize {
    let mut size = 4;
    let mut prev = 0u16;

    let _ = for_each_wire_opt::<core::convert::Infallible>(self, &mut |number, value| {
              while number - prev > MAX_OPT_DELTA {
                prev = next_fencepost(prev);
                size += 1;
              }
              size += 1 + usize::from(value.len() > 14) + value.len();
              prev = number;
              Ok(())
            });

    size + self.payload.0.len()
  }
}

/// Encoder state: output buffer, running previous *absolute* option
/// number, and the count destined for the header nibble.
struct Encoder {
  buf: Vec<u8>,
  prev: u16,
  count: u8,
}

impl Encoder {
  fn new(msg: &Message) -> Self {
    let mut buf = Vec::with_capacity(msg.encoded_size());
    buf.push((msg.ver.0 << 6) | (msg.ty.bits() << 4));
    buf.push(msg.code.0);
    buf.extend_from_slice(&msg.id.0.to_be_bytes());

    Encoder { buf, prev: 0, count: 0 }
  }

  /// Emit one option, preceded by however many Fenceposts the delta
  /// cap demands.
  fn option(&mut self, number: u16, value: &[u8]) -> Result<(), EncodeError> {
    while number - self.prev > MAX_OPT_DELTA {
      let fence = next_fencepost(self.prev);
      self.raw(fence, &[])?;
    }
    self.raw(number, value)
  }

  fn raw(&mut self, number: u16, value: &[u8]) -> Result<(), EncodeError> {
    if self.count == 15 {
      return Err(EncodeError::TooManyOptions);
    }
    if value.len() > MAX_OPT_LEN {
      return Err(EncodeError::BadOptionLength);
    }

    let delta = (number - self.prev) as u8;
    if value.len() < 15 {
      self.buf.push((delta << 4) | value.len() as u8);
    } else {
      self.buf.push((delta << 4) | 0x0f);
      self.buf.push((value.len() - 15) as u8);
    }
    self.buf.extend_from_slice(value);

    self.prev = number;
    self.count += 1;
    Ok(())
  }

  fn finish(mut self, payload: &[u8]) -> Vec<u8> {
    self.buf[0] |= self.count;
    self.buf.extend_from_slice(payload);
    self.buf
  }
}

impl TryIntoBytes for &Message {
  type Error = EncodeError;

  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error> {
    validity_check(self).map_err(EncodeError::Invalid)?;

    let mut enc = Encoder::new(self);
    for_each_wire_opt(self, &mut |number, value| enc.option(number, value))?;

    Ok(enc.finish(&self.payload.0))
  }
}

impl TryIntoBytes for Message {
  type Error = EncodeError;

  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error> {
    (&self).try_into_bytes()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{test_msg, Block, Code, Id, Message, OptValue, Type};

  fn con_get(f: impl FnOnce(&mut Message)) -> Message {
    let mut msg = Message::empty(Type::Con, Code::GET, Id(0x1234));
    f(&mut msg);
    msg
  }

  #[test]
  fn bare_confirmable_get() {
    let msg = con_get(|m| m.opts.set_uri_path_str("temp"));
    assert_eq!(msg.try_into_bytes().unwrap(),
               vec![0x41, 0x01, 0x12, 0x34, 0x94, b't', b'e', b'm', b'p']);
  }

  #[test]
  fn matches_handwritten_packet() {
    let (msg, bytes) = test_msg();
    assert_eq!(msg.encoded_size(), bytes.len());
    assert_eq!(msg.try_into_bytes().unwrap(), bytes);
  }

  #[test]
  fn fencepost_bridges_content_type_to_block1() {
    let msg = con_get(|m| {
                m.code = Code::PUT;
                m.opts.content_type = Some(OptValue(vec![40]));
                m.opts.block1 = Some(Block::new(16, 0, true));
              });

    let bytes = (&msg).try_into_bytes().unwrap();
    // three options in the header nibble: Content-Type, Fencepost, Block1
    assert_eq!(bytes[0] & 0x0f, 3);
    assert_eq!(&bytes[4..],
               //delta 1   delta 13  delta 5
               &[0x11, 40, 0xd0, 0x51, 0x08]);
    assert_eq!(msg.encoded_size(), bytes.len());
  }

  #[test]
  fn fencepost_precedes_a_leading_block2() {
    let msg = con_get(|m| {
                m.code = Code::CONTENT;
                m.ty = Type::Non;
                m.opts.block2 = Some(Block::new(16, 1, false));
              });

    let bytes = msg.try_into_bytes().unwrap();
    // nothing before Block2 (17): Fencepost 14 then delta 3
    assert_eq!(bytes[0] & 0x0f, 2);
    assert_eq!(&bytes[4..], &[0xe0, 0x31, 0x10]);
  }

  #[test]
  fn length_nibble_boundaries() {
    for (len, header_len) in [(14usize, 1usize), (15, 2), (270, 2)] {
      let msg = con_get(|m| m.opts.proxy_uri = Some(OptValue(vec![b'x'; len])));
      let bytes = (&msg).try_into_bytes().unwrap();
      assert_eq!(bytes.len(), 4 + header_len + len);
      assert_eq!(msg.encoded_size(), bytes.len());

      if len < 15 {
        assert_eq!(bytes[4], 0x30 | len as u8);
      } else {
        assert_eq!(bytes[4], 0x3f);
        assert_eq!(bytes[5], (len - 15) as u8);
      }
    }
  }

  #[test]
  fn rejects_value_over_270() {
    // ETag has no tighter per-option ceiling, so the wire limit itself trips
    let msg = con_get(|m| m.opts.etag = Some(OptValue(vec![0; 271])));
    assert_eq!(msg.try_into_bytes().unwrap_err(), EncodeError::BadOptionLength);
  }

  #[test]
  fn fifteen_options_fit_sixteen_do_not() {
    let fill = |m: &mut Message, query_segs: usize| {
      m.opts.content_type = Some(OptValue(vec![40]));
      m.opts.proxy_uri = Some(OptValue::from_str("coap://proxy"));
      m.opts.etag = Some(OptValue(vec![1]));
      m.opts.uri_host = Some(OptValue::from_str("host"));
      m.opts.uri_port = Some(OptValue::from_u16(5683));
      m.opts.observe = Some(OptValue(vec![0]));
      m.token = crate::Token(tinyvec::array_vec!([u8; 8] => 1));
      m.opts.set_uri_path_str("a/b/c/d/e/f");
      for i in 0..query_segs {
        m.opts.uri_query.push(OptValue(vec![b'q', b'0' + i as u8]));
      }
    };

    let ok = con_get(|m| fill(m, 2));
    assert_eq!(ok.try_into_bytes().unwrap()[0] & 0x0f, 15);

    let too_many = con_get(|m| fill(m, 3));
    assert_eq!(too_many.try_into_bytes().unwrap_err(),
               EncodeError::TooManyOptions);
  }

  #[test]
  fn reset_must_be_empty() {
    let msg = con_get(|m| {
                m.ty = Type::Reset;
                m.code = Code::EMPTY;
                m.opts.set_uri_path_str("x");
              });
    assert_eq!(msg.try_into_bytes().unwrap_err(),
               EncodeError::Invalid(ValidityError::InvalidHeader));
  }

  #[test]
  fn zero_option_message_is_header_plus_payload() {
    let mut msg = Message::empty(Type::Non, Code::POST, Id(1));
    msg.payload.0 = b"data".to_vec();
    let bytes = msg.try_into_bytes().unwrap();
    assert_eq!(bytes[0] & 0x0f, 0);
    assert_eq!(&bytes[4..], b"data");
  }
}
