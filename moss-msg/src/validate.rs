//! Structural validity rules that go beyond what the codec can express.
//!
//! The codec will happily move a message with, say, a 3-byte Uri-Port
//! through the wire; whether such a message is *meaningful* is this
//! module's concern. [`validity_check`] is pure and is also run by the
//! encoder before any byte is written.

use crate::block::Block;
use crate::opt::OptNumber;
use crate::{CodeKind, Message, Type};

/// Why a message was rejected.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ValidityError {
  /// version was not 1
  BadVersion(u8),
  /// code outside the defined draft-09 set
  BadCode(u8),
  /// a recognized option's value exceeded its length ceiling
  BadOptionLength(OptNumber),
  /// Reset carried options/token/payload, or Ack carried payload or
  /// options other than Block1/Block2
  InvalidHeader,
  /// a request carried a response-only option
  ResponseOptionInRequest(OptNumber),
}

fn ceiling(value: &Option<crate::OptValue>,
           max: usize,
           number: OptNumber)
           -> Result<(), ValidityError> {
  match value {
    | Some(v) if v.0.len() > max => Err(ValidityError::BadOptionLength(number)),
    | _ => Ok(()),
  }
}

fn block_in_range(block: &Option<Block>, number: OptNumber) -> Result<(), ValidityError> {
  match block {
    | Some(b) if b.num() > Block::MAX_NUM => Err(ValidityError::BadOptionLength(number)),
    | _ => Ok(()),
  }
}

/// Check a message against the per-field and per-type structural rules.
pub fn validity_check(msg: &Message) -> Result<(), ValidityError> {
  if msg.ver.0 != 1 {
    return Err(ValidityError::BadVersion(msg.ver.0));
  }
  if !msg.code.is_defined() {
    return Err(ValidityError::BadCode(msg.code.0));
  }

  let o = &msg.opts;

  match msg.ty {
    // a Reset is nothing but a header
    | Type::Reset
      if !o.is_empty() || !msg.token.is_empty() || !msg.payload.0.is_empty() =>
    {
      return Err(ValidityError::InvalidHeader)
    },
    // an Ack may carry the blockwise continuation and nothing else
    | Type::Ack if o.any_beyond_block() || !msg.payload.0.is_empty() => {
      return Err(ValidityError::InvalidHeader)
    },
    | _ => (),
  }

  ceiling(&o.content_type, 2, OptNumber::ContentType)?;
  ceiling(&o.max_age, 4, OptNumber::MaxAge)?;
  ceiling(&o.proxy_uri, 270, OptNumber::ProxyUri)?;
  ceiling(&o.uri_host, 270, OptNumber::UriHost)?;
  ceiling(&o.uri_port, 2, OptNumber::UriPort)?;
  ceiling(&o.location_query, 270, OptNumber::LocationQuery)?;
  ceiling(&o.observe, 2, OptNumber::Observe)?;
  block_in_range(&o.block1, OptNumber::Block1)?;
  block_in_range(&o.block2, OptNumber::Block2)?;

  if o.location_path.iter().any(|seg| seg.0.len() > 270) {
    return Err(ValidityError::BadOptionLength(OptNumber::LocationPath));
  }

  if msg.code.kind() == CodeKind::Request {
    if !o.location_path.is_empty() {
      return Err(ValidityError::ResponseOptionInRequest(OptNumber::LocationPath));
    }
    if o.location_query.is_some() {
      return Err(ValidityError::ResponseOptionInRequest(OptNumber::LocationQuery));
    }
    if o.max_age.is_some() {
      return Err(ValidityError::ResponseOptionInRequest(OptNumber::MaxAge));
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{Code, Id, Message, OptValue, Payload, Token, Version};

  fn msg(ty: Type, code: Code) -> Message {
    Message::empty(ty, code, Id(1))
  }

  #[test]
  fn version_must_be_1() {
    let mut m = msg(Type::Con, Code::GET);
    m.ver = Version(2);
    assert_eq!(validity_check(&m), Err(ValidityError::BadVersion(2)));
  }

  #[test]
  fn code_must_be_defined() {
    let m = msg(Type::Con, Code(33));
    assert_eq!(validity_check(&m), Err(ValidityError::BadCode(33)));
  }

  #[test]
  fn reset_tolerates_nothing() {
    let empty = msg(Type::Reset, Code::EMPTY);
    assert_eq!(validity_check(&empty), Ok(()));

    let mut with_token = msg(Type::Reset, Code::EMPTY);
    with_token.token = Token(tinyvec::array_vec!([u8; 8] => 1));
    assert_eq!(validity_check(&with_token), Err(ValidityError::InvalidHeader));

    let mut with_payload = msg(Type::Reset, Code::EMPTY);
    with_payload.payload = Payload(vec![1]);
    assert_eq!(validity_check(&with_payload), Err(ValidityError::InvalidHeader));
  }

  #[test]
  fn ack_may_carry_block_but_nothing_else() {
    let mut continuation = msg(Type::Ack, Code::EMPTY);
    continuation.opts.block1 = Some(Block::new(16, 1, true));
    assert_eq!(validity_check(&continuation), Ok(()));

    let mut with_path = msg(Type::Ack, Code::EMPTY);
    with_path.opts.set_uri_path_str("x");
    assert_eq!(validity_check(&with_path), Err(ValidityError::InvalidHeader));

    let mut with_payload = msg(Type::Ack, Code::EMPTY);
    with_payload.payload = Payload(vec![1]);
    assert_eq!(validity_check(&with_payload), Err(ValidityError::InvalidHeader));
  }

  #[test]
  fn option_length_ceilings() {
    let mut m = msg(Type::Con, Code::GET);
    m.opts.content_type = Some(OptValue(vec![0; 3]));
    assert_eq!(validity_check(&m),
               Err(ValidityError::BadOptionLength(OptNumber::ContentType)));

    let mut m = msg(Type::Con, Code::GET);
    m.opts.uri_port = Some(OptValue(vec![0; 3]));
    assert_eq!(validity_check(&m),
               Err(ValidityError::BadOptionLength(OptNumber::UriPort)));

    let mut m = msg(Type::Non, Code::CONTENT);
    m.opts.max_age = Some(OptValue(vec![0; 5]));
    assert_eq!(validity_check(&m),
               Err(ValidityError::BadOptionLength(OptNumber::MaxAge)));
  }

  #[test]
  fn response_options_rejected_in_requests() {
    let mut m = msg(Type::Con, Code::GET);
    m.opts.max_age = Some(OptValue(vec![60]));
    assert_eq!(validity_check(&m),
               Err(ValidityError::ResponseOptionInRequest(OptNumber::MaxAge)));

    let mut m = msg(Type::Con, Code::PUT);
    m.opts.set_location_path_str("created/here");
    assert_eq!(validity_check(&m),
               Err(ValidityError::ResponseOptionInRequest(OptNumber::LocationPath)));

    // the same options are fine on a response
    let mut m = msg(Type::Non, Code::CREATED);
    m.opts.set_location_path_str("created/here");
    m.opts.max_age = Some(OptValue(vec![60]));
    assert_eq!(validity_check(&m), Ok(()));
  }
}
