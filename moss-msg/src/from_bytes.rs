//! Parsing a [`Message`] out of packet bytes.

use std_alloc::vec::Vec;

use crate::block::Block;
use crate::opt::{OptNumber, OptValue};
use crate::{Code, Id, Message, Opts, Payload, Token, Type, Version};

/// Trait for parsing a data structure out of wire bytes.
pub trait TryFromBytes: Sized {
  /// Error type yielded if conversion fails
  type Error;

  /// Try to parse an instance out of a packet
  fn try_from_bytes(bytes: &[u8]) -> Result<Self, Self::Error>;
}

/// Errors encounterable while parsing a message from bytes.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MessageParseError {
  /// The packet ended before the advertised header, options or option
  /// values did
  ShortPacket,
  /// An option value exceeded the length that option may carry
  /// (e.g. a token longer than 8 bytes)
  BadOptionLength,
  /// A zero delta repeated an option that is not repeatable
  OptionOutOfOrder,
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
  fn u8(&mut self) -> Result<u8, MessageParseError> {
    let (&b, rest) = self.0
                         .split_first()
                         .ok_or(MessageParseError::ShortPacket)?;
    self.0 = rest;
    Ok(b)
  }

  fn take(&mut self, n: usize) -> Result<&'a [u8], MessageParseError> {
    if self.0.len() < n {
      return Err(MessageParseError::ShortPacket);
    }
    let (head, rest) = self.0.split_at(n);
    self.0 = rest;
    Ok(head)
  }
}

fn bounded(value: &[u8], max: usize) -> Result<&[u8], MessageParseError> {
  if value.len() > max {
    Err(MessageParseError::BadOptionLength)
  } else {
    Ok(value)
  }
}

fn owned(value: &[u8]) -> Option<OptValue> {
  Some(OptValue(value.to_vec()))
}

impl TryFromBytes for Message {
  type Error = MessageParseError;

  fn try_from_bytes(bytes: &[u8]) -> Result<Self, Self::Error> {
    let mut r = Reader(bytes);

    let b0 = r.u8()?;
    let ver = Version(b0 >> 6);
    let ty = Type::from_bits(b0 >> 4);
    let opt_count = b0 & 0x0f;
    let code = Code(r.u8()?);
    let id = Id(u16::from_be_bytes([r.u8()?, r.u8()?]));

    let mut token = Token::default();
    let mut opts = Opts::default();
    let mut prev = 0u16;

    for i in 0..opt_count {
      let head = r.u8()?;
      let delta = u16::from(head >> 4);
      let mut len = usize::from(head & 0x0f);
      if len == 15 {
        len = 15 + usize::from(r.u8()?);
      }

      if delta == 0 && i > 0 && !OptNumber::allows_repeat(prev) {
        return Err(MessageParseError::OptionOutOfOrder);
      }

      let number = prev + delta;
      prev = number;
      let value = r.take(len)?;

      match number {
        | n if OptNumber::is_fencepost(n) => (),
        | 1 => opts.content_type = owned(bounded(value, 2)?),
        | 2 => opts.max_age = owned(bounded(value, 4)?),
        | 3 => opts.proxy_uri = owned(value),
        | 4 => opts.etag = owned(value),
        | 5 => opts.uri_host = owned(value),
        | 6 => opts.location_path.push(OptValue(value.to_vec())),
        | 7 => opts.uri_port = owned(bounded(value, 2)?),
        | 8 => opts.location_query = owned(value),
        | 9 => opts.uri_path.push(OptValue(value.to_vec())),
        | 10 => opts.observe = owned(bounded(value, 2)?),
        | 11 => token = Token(bounded(value, 8)?.iter().copied().collect()),
        | 15 => opts.uri_query.push(OptValue(value.to_vec())),
        | 17 => {
          opts.block2 = Some(Block::from_value_bytes(value).ok_or(MessageParseError::BadOptionLength)?)
        },
        | 19 => {
          opts.block1 = Some(Block::from_value_bytes(value).ok_or(MessageParseError::BadOptionLength)?)
        },
        // numbers this engine does not recognize are elective to it
        | _ => (),
      }
    }

    Ok(Message { ver,
                 ty,
                 code,
                 id,
                 token,
                 opts,
                 payload: Payload(Vec::from(r.0)) })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_msg;

  #[test]
  fn parses_handwritten_packet() {
    let (expected, bytes) = test_msg();
    assert_eq!(Message::try_from_bytes(&bytes).unwrap(), expected);
  }

  #[test]
  fn bare_confirmable_get() {
    let bytes = [0x41, 0x01, 0x12, 0x34, 0x94, b't', b'e', b'm', b'p'];
    let msg = Message::try_from_bytes(&bytes).unwrap();

    assert_eq!(msg.ty, Type::Con);
    assert_eq!(msg.code, Code::GET);
    assert_eq!(msg.id, Id(0x1234));
    assert_eq!(msg.opts.uri_path, vec![OptValue::from_str("temp")]);
    assert!(msg.payload.0.is_empty());
  }

  #[test]
  fn fencepost_is_not_observable() {
    //                                 ct        fence  block1
    let bytes = [0x53, 0x01, 0x00, 0x07, 0x11, 40, 0xd0, 0x51, 0x08];
    let msg = Message::try_from_bytes(&bytes).unwrap();

    assert_eq!(msg.opts.content_type, Some(OptValue(vec![40])));
    assert_eq!(msg.opts.block1, Some(Block::new(16, 0, true)));
  }

  #[test]
  fn extended_length_boundaries() {
    // Proxy-Uri with length exactly 15: nibble 15, extension byte 0
    let mut bytes = vec![0x41, 0x01, 0x00, 0x01, 0x3f, 0x00];
    bytes.extend_from_slice(&[b'u'; 15]);
    let msg = Message::try_from_bytes(&bytes).unwrap();
    assert_eq!(msg.opts.proxy_uri.unwrap().0.len(), 15);

    // and length exactly 270: extension byte 255
    let mut bytes = vec![0x41, 0x01, 0x00, 0x01, 0x3f, 0xff];
    bytes.extend_from_slice(&[b'u'; 270]);
    let msg = Message::try_from_bytes(&bytes).unwrap();
    assert_eq!(msg.opts.proxy_uri.unwrap().0.len(), 270);
  }

  #[test]
  fn zero_delta_repeat_of_single_valued_option_is_rejected() {
    // two Content-Type options back to back
    let bytes = [0x42, 0x01, 0x00, 0x01, 0x11, 40, 0x01, 41];
    assert_eq!(Message::try_from_bytes(&bytes).unwrap_err(),
               MessageParseError::OptionOutOfOrder);
  }

  #[test]
  fn zero_delta_repeat_of_uri_path_accumulates() {
    let bytes = [0x42, 0x01, 0x00, 0x01, 0x91, b'a', 0x01, b'b'];
    let msg = Message::try_from_bytes(&bytes).unwrap();
    assert_eq!(msg.opts.uri_path,
               vec![OptValue::from_str("a"), OptValue::from_str("b")]);
  }

  #[test]
  fn short_packets() {
    assert_eq!(Message::try_from_bytes(&[]).unwrap_err(),
               MessageParseError::ShortPacket);
    assert_eq!(Message::try_from_bytes(&[0x40, 0x01, 0x00]).unwrap_err(),
               MessageParseError::ShortPacket);
    // header advertises one option, none follows
    assert_eq!(Message::try_from_bytes(&[0x41, 0x01, 0x00, 0x01]).unwrap_err(),
               MessageParseError::ShortPacket);
    // option advertises 4 value bytes, only 2 follow
    assert_eq!(Message::try_from_bytes(&[0x41, 0x01, 0x00, 0x01, 0x94, b'a',
                                         b'b']).unwrap_err(),
               MessageParseError::ShortPacket);
  }

  #[test]
  fn overlong_token_is_rejected() {
    let mut bytes = vec![0x41, 0x01, 0x00, 0x01, 0xb9];
    bytes.extend_from_slice(&[1; 9]);
    assert_eq!(Message::try_from_bytes(&bytes).unwrap_err(),
               MessageParseError::BadOptionLength);
  }

  #[test]
  fn unknown_options_are_skipped() {
    // number 13 is assigned to nothing in draft-09
    let bytes = [0x42, 0x01, 0x00, 0x01, 0xd1, 0xaa, 0x21, 0x10];
    let msg = Message::try_from_bytes(&bytes).unwrap();
    // the unknown option still advances the running number: 13 + 2 = 15
    assert_eq!(msg.opts.uri_query, vec![OptValue(vec![0x10])]);
  }

  #[test]
  fn no_options_means_rest_is_payload() {
    let bytes = [0x50, 0x02, 0x00, 0x09, 0xde, 0xad];
    let msg = Message::try_from_bytes(&bytes).unwrap();
    assert_eq!(msg.ty, Type::Non);
    assert_eq!(msg.payload.0, vec![0xde, 0xad]);
  }
}
