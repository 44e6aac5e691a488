//! Low-level representation of CoAP messages as laid out by the
//! draft-ietf-core-coap-09 wire format.
//!
//! The most notable item in `moss_msg` is [`Message`]: a logical CoAP
//! message very close to the actual byte layout, together with the
//! [`TryIntoBytes`] / [`TryFromBytes`] codec and a pure
//! [`validity_check`](validate::validity_check).
//!
//! The draft-09 format differs from RFC 7252 in ways that matter here:
//! the header carries an options *count* (not a token length), the token
//! travels as option 11, option deltas are capped at 14 with Fencepost
//! placeholder options bridging larger gaps, and there is no payload
//! marker byte — everything after the counted options is payload.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
#![cfg_attr(not(test), deny(unsafe_code))]
#![cfg_attr(not(test), warn(unreachable_pub))]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]

extern crate alloc as std_alloc;

pub mod block;
pub mod from_bytes;
pub mod opt;
pub mod to_bytes;
pub mod validate;

#[doc(inline)]
pub use block::Block;
#[doc(inline)]
pub use from_bytes::{MessageParseError, TryFromBytes};
#[doc(inline)]
pub use opt::{OptNumber, OptValue, Opts};
use std_alloc::vec::Vec;
#[doc(inline)]
pub use to_bytes::{EncodeError, TryIntoBytes};
#[doc(inline)]
pub use validate::{validity_check, ValidityError};

/// # Message ID
///
/// 16-bit unsigned integer in network byte order, scoped to a peer.
/// Used to detect message duplication and to match messages of type
/// Acknowledgement/Reset to messages of type Confirmable.
///
/// Not to be confused with [`Token`], which correlates a *request* with
/// its *response* across message exchanges.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Id(pub u16);

/// Indicates whether this message is Confirmable, Non-confirmable,
/// an Acknowledgement or a Reset.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Type {
  /// Requires an acknowledgement; will be retransmitted until one
  /// (or a Reset) arrives.
  Con,
  /// Fire-and-forget.
  Non,
  /// Acknowledges a specific Confirmable message by its [`Id`].
  Ack,
  /// Rejects a message the peer lacked context to process.
  Reset,
}

impl Type {
  /// The 2-bit wire representation.
  pub fn bits(&self) -> u8 {
    match self {
      | Type::Con => 0,
      | Type::Non => 1,
      | Type::Ack => 2,
      | Type::Reset => 3,
    }
  }

  pub(crate) fn from_bits(b: u8) -> Self {
    match b & 0b11 {
      | 0 => Type::Con,
      | 1 => Type::Non,
      | 2 => Type::Ack,
      | _ => Type::Reset,
    }
  }
}

/// Version of the CoAP protocol the message adheres to. Always 1.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Version(pub u8);

impl Default for Version {
  fn default() -> Self {
    Version(1)
  }
}

/// Message token for matching requests to responses.
///
/// A client may send a Confirmable request with id 1 and token `0x20`
/// several times; the server acknowledges id 1, then responds in a new
/// message with a new id but the same token `0x20`, which is how the
/// client pairs the response with its request.
///
/// 0 to 8 bytes; an empty token is "no token".
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Token(pub tinyvec::ArrayVec<[u8; 8]>);

impl Token {
  /// Whether a token is present at all.
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// What a [`Code`] means at the request/response level.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum CodeKind {
  /// 0.00; used by pings, empty acks and resets
  Empty,
  /// Codes 1..32
  Request,
  /// Codes 64..
  Response,
}

/// The flat 8-bit draft-09 message code.
///
/// Values below 32 are request methods, values of 64 and above are
/// response statuses. The RFC-style `class.detail` reading still
/// applies (`69 == 2.05 Content`).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Code(pub u8);

impl Code {
  /// 0.00
  pub const EMPTY: Code = Code(0);
  /// 0.01
  pub const GET: Code = Code(1);
  /// 0.02
  pub const POST: Code = Code(2);
  /// 0.03
  pub const PUT: Code = Code(3);
  /// 0.04
  pub const DELETE: Code = Code(4);
  /// 2.01
  pub const CREATED: Code = Code(65);
  /// 2.02
  pub const DELETED: Code = Code(66);
  /// 2.03
  pub const VALID: Code = Code(67);
  /// 2.04
  pub const CHANGED: Code = Code(68);
  /// 2.05
  pub const CONTENT: Code = Code(69);
  /// 4.00
  pub const BAD_REQUEST: Code = Code(128);
  /// 4.04
  pub const NOT_FOUND: Code = Code(132);
  /// 4.08; a blockwise upload arrived with pieces missing
  pub const REQUEST_ENTITY_INCOMPLETE: Code = Code(136);
  /// 4.13
  pub const REQUEST_ENTITY_TOO_LARGE: Code = Code(141);
  /// 5.00
  pub const INTERNAL_SERVER_ERROR: Code = Code(160);

  /// Build a code from its RFC-style `class.detail` reading.
  pub fn new(class: u8, detail: u8) -> Self {
    Code((class << 5) | (detail & 0b11111))
  }

  /// The class digit (`2` in `2.05`).
  pub fn class(&self) -> u8 {
    self.0 >> 5
  }

  /// The detail digits (`5` in `2.05`).
  pub fn detail(&self) -> u8 {
    self.0 & 0b11111
  }

  /// Classify as empty, request or response.
  pub fn kind(&self) -> CodeKind {
    match self.0 {
      | 0 => CodeKind::Empty,
      | n if n < 32 => CodeKind::Request,
      | _ => CodeKind::Response,
    }
  }

  /// Whether this code is part of the set draft-09 defines.
  pub fn is_defined(&self) -> bool {
    matches!(self.0,
             0 | 1..=4 | 65..=69 | 128..=134 | 136 | 140 | 141 | 143 | 160..=165)
  }
}

/// Opaque message body. May be empty.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Payload(pub Vec<u8>);

/// A logical draft-09 CoAP message.
///
/// ```
/// use moss_msg::{Code, Id, Message, Opts, Payload, Token, TryIntoBytes, Type, Version};
///
/// let mut opts = Opts::default();
/// opts.set_uri_path_str("temp");
///
/// let msg = Message { ver: Version::default(),
///                     ty: Type::Con,
///                     code: Code::GET,
///                     id: Id(0x1234),
///                     token: Token::default(),
///                     opts,
///                     payload: Payload(Vec::new()) };
///
/// assert_eq!(msg.try_into_bytes().unwrap(),
///            vec![0x41, 0x01, 0x12, 0x34, 0x94, b't', b'e', b'm', b'p']);
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct Message {
  /// see [`Version`]
  pub ver: Version,
  /// see [`Type`]
  pub ty: Type,
  /// see [`Code`]
  pub code: Code,
  /// see [`Id`]
  pub id: Id,
  /// see [`Token`]
  pub token: Token,
  /// see [`Opts`]
  pub opts: Opts,
  /// see [`Payload`]
  pub payload: Payload,
}

impl Message {
  /// A message with nothing in it but type, code and id.
  pub fn empty(ty: Type, code: Code, id: Id) -> Self {
    Message { ver: Version::default(),
              ty,
              code,
              id,
              token: Token::default(),
              opts: Opts::default(),
              payload: Payload(Vec::new()) }
  }

  /// The Acknowledgement for this message, if it is Confirmable.
  pub fn ack(&self) -> Option<Message> {
    match self.ty {
      | Type::Con => Some(Message::empty(Type::Ack, Code::EMPTY, self.id)),
      | _ => None,
    }
  }
}

#[cfg(test)]
pub(crate) fn test_msg() -> (Message, Vec<u8>) {
  let mut opts = Opts::default();
  opts.content_type = Some(OptValue(std_alloc::vec![0x28]));
  opts.set_uri_path_str("sensors/temp");

  let msg = Message { ver: Version::default(),
                      ty: Type::Con,
                      code: Code::GET,
                      id: Id(0x00_01),
                      token: Token(tinyvec::array_vec!([u8; 8] => 0xfe)),
                      opts,
                      payload: Payload(b"hello, world!".to_vec()) };

  //                  ver ty  oc
  //                  |   |   |
  let header: u8 = 0b_01__00__0100;
  let bytes = [&[header, 0x01, 0x00, 0x01][..],
               // Content-Type: delta 1, len 1
               &[0x11, 0x28],
               // Uri-Path "sensors": delta 8, len 7
               &[0x87],
               b"sensors",
               // Uri-Path "temp": delta 0, len 4
               &[0x04],
               b"temp",
               // Token: delta 2, len 1
               &[0x21, 0xfe],
               b"hello, world!"].concat();

  (msg, bytes)
}
