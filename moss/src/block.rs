//! Chunked transfer of payloads too large for one datagram.
//!
//! Outbound: the first block leaves immediately, the rest of the
//! payload is retained keyed by `(peer, token)`; every acknowledgement
//! carrying a Block1/Block2 option asks for the block it wants next.
//!
//! Inbound: fragments append strictly in order to an assembly keyed by
//! `(peer, token)`; anything out of order is dropped on the floor and
//! the peer's retransmission brings it back around. A completed
//! assembly yields one logical message.
//!
//! Both tables forget transfers that sit idle too long.

use embedded_time::Instant;
use moss_msg::{Block, CodeKind, Id, Message, Payload, Token};
use std_alloc::vec::Vec;

use crate::net::Addrd;
use crate::time::{elapsed, Clock, Millis};

fn block_count(payload_len: usize, block_size: u16) -> usize {
  let bs = usize::from(block_size);
  (payload_len + bs - 1) / bs
}

/// Put the right Block option on a message: Block1 describes request
/// payloads, Block2 response payloads.
fn set_block_opt(msg: &mut Message, block: Block) {
  match msg.code.kind() {
    | CodeKind::Response => msg.opts.block2 = Some(block),
    | _ => msg.opts.block1 = Some(block),
  }
}

struct Outbound<C: Clock> {
  key: Addrd<Token>,
  template: Message,
  payload: Vec<u8>,
  block_size: u16,
  touched: Instant<C>,
}

impl<C: Clock> ::core::fmt::Debug for Outbound<C> {
  fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
    f.debug_struct("Outbound")
     .field("key", &self.key)
     .field("payload_len", &self.payload.len())
     .field("block_size", &self.block_size)
     .finish()
  }
}

/// Outbound transfers awaiting continuation requests.
#[derive(Debug)]
pub struct OutboundTransfers<C: Clock> {
  list: Vec<Outbound<C>>,
  idle_timeout: Millis,
}

impl<C: Clock> OutboundTransfers<C> {
  /// A transfer table that forgets transfers no peer has asked about
  /// for `idle_timeout`.
  pub fn new(idle_timeout: Millis) -> Self {
    OutboundTransfers { list: Vec::new(),
                        idle_timeout }
  }

  /// Begin a transfer: retain `msg`'s payload, give back the message
  /// to send right now — block 0, `more` set.
  pub fn start(&mut self,
               msg: Message,
               peer: no_std_net::SocketAddr,
               block_size: u16,
               now: Instant<C>)
               -> Message {
    let key = Addrd(msg.token, peer);
    // a reused (peer, token) supersedes the old transfer
    self.list.retain(|o| o.key != key);

    let mut template = msg;
    let payload = ::core::mem::take(&mut template.payload.0);

    let mut first = template.clone();
    first.payload = Payload(payload[..usize::from(block_size)].to_vec());
    set_block_opt(&mut first, Block::new(block_size, 0, true));

    self.list.push(Outbound { key,
                              template,
                              payload,
                              block_size,
                              touched: now });
    first
  }

  /// Cut the block a continuation acknowledgement asked for.
  ///
  /// Yields `None` when no transfer matches or the requested number is
  /// past the end (which also closes the transfer). Cutting the final
  /// block closes the transfer; its retransmission, if needed, is the
  /// resend queue's business.
  pub fn next_block(&mut self,
                    key: Addrd<Token>,
                    requested: Block,
                    id: Id,
                    now: Instant<C>)
                    -> Option<Message> {
    let pos = self.list.iter().position(|o| o.key == key)?;

    let n = requested.num() as usize;
    let (msg, close) = {
      let o = &mut self.list[pos];
      o.touched = now;

      let blocks = block_count(o.payload.len(), o.block_size);
      if n >= blocks {
        log::debug!("block {} of {:?} requested, transfer only has {}",
                    n,
                    key.data(),
                    blocks);
        (None, true)
      } else {
        let bs = usize::from(o.block_size);
        let end = ::core::cmp::min((n + 1) * bs, o.payload.len());
        let more = end < o.payload.len();

        let mut m = o.template.clone();
        m.id = id;
        m.payload = Payload(o.payload[n * bs..end].to_vec());
        set_block_opt(&mut m, Block::new(o.block_size, n as u32, more));
        (Some(m), !more)
      }
    };

    if close {
      self.list.remove(pos);
    }
    msg
  }

  /// Forget transfers nothing has touched for the idle timeout.
  pub fn reap(&mut self, now: Instant<C>) {
    let timeout = self.idle_timeout;
    self.list.retain(|o| elapsed(o.touched, now) < timeout);
  }

  /// Number of transfers awaiting continuation.
  pub fn len(&self) -> usize {
    self.list.len()
  }

  /// Whether no transfer is in progress.
  pub fn is_empty(&self) -> bool {
    self.list.is_empty()
  }
}

/// An inbound assembly overran the configured size ceiling and was
/// discarded.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct TooLarge;

/// What became of one inbound fragment.
#[derive(Clone, PartialEq, Debug)]
pub enum Progress {
  /// In order; appended. The transfer now waits for this block number.
  Appended(u32),
  /// Out of order; discarded without prejudice
  Dropped,
  /// That was the final fragment: here is the logical message
  Complete(Message),
}

struct Assembly<C: Clock> {
  key: Addrd<Token>,
  buf: Vec<u8>,
  next_expected: u32,
  last_update: Instant<C>,
}

impl<C: Clock> ::core::fmt::Debug for Assembly<C> {
  fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
    f.debug_struct("Assembly")
     .field("key", &self.key)
     .field("have_bytes", &self.buf.len())
     .field("next_expected", &self.next_expected)
     .finish()
  }
}

/// Inbound transfers being reassembled.
#[derive(Debug)]
pub struct Assemblies<C: Clock> {
  list: Vec<Assembly<C>>,
  max_size: usize,
  idle_timeout: Millis,
}

impl<C: Clock> Assemblies<C> {
  /// An assembly table that fails transfers above `max_size` bytes and
  /// forgets transfers idle longer than `idle_timeout`.
  pub fn new(max_size: usize, idle_timeout: Millis) -> Self {
    Assemblies { list: Vec::new(),
                 max_size,
                 idle_timeout }
  }

  /// Feed one fragment.
  ///
  /// In-order fragments accumulate; the final one (`more` clear)
  /// completes the transfer and yields the logical message, carrying
  /// the final fragment's metadata and the full payload.
  pub fn fragment(&mut self,
                  mut msg: Message,
                  peer: no_std_net::SocketAddr,
                  block: Block,
                  now: Instant<C>)
                  -> Result<Progress, TooLarge> {
    let key = Addrd(msg.token, peer);

    let pos = match self.list.iter().position(|a| a.key == key) {
      | Some(pos) => pos,
      | None => {
        self.list.push(Assembly { key,
                                  buf: Vec::new(),
                                  next_expected: 0,
                                  last_update: now });
        self.list.len() - 1
      },
    };

    if block.num() != self.list[pos].next_expected {
      log::debug!("dropping block {} from {}, expected {}",
                  block.num(),
                  peer,
                  self.list[pos].next_expected);
      return Ok(Progress::Dropped);
    }

    if self.list[pos].buf.len() + msg.payload.0.len() > self.max_size {
      log::warn!("assembly from {} exceeded {} bytes, failing transfer",
                 peer,
                 self.max_size);
      self.list.remove(pos);
      return Err(TooLarge);
    }

    let a = &mut self.list[pos];
    a.buf.extend_from_slice(&msg.payload.0);
    a.next_expected += 1;
    a.last_update = now;

    if block.more() {
      return Ok(Progress::Appended(a.next_expected));
    }

    let done = self.list.remove(pos);
    msg.payload = Payload(done.buf);
    Ok(Progress::Complete(msg))
  }

  /// Forget assemblies whose last fragment is older than the idle
  /// timeout.
  pub fn reap(&mut self, now: Instant<C>) {
    let (timeout, before) = (self.idle_timeout, self.list.len());
    self.list.retain(|a| elapsed(a.last_update, now) < timeout);

    let removed = before - self.list.len();
    if removed > 0 {
      log::debug!("removed {} idle blockwise assemblies", removed);
    }
  }

  /// Number of partially assembled transfers.
  pub fn len(&self) -> usize {
    self.list.len()
  }

  /// Whether nothing is being reassembled.
  pub fn is_empty(&self) -> bool {
    self.list.is_empty()
  }
}
