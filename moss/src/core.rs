//! The protocol engine.
//!
//! [`Engine`] owns every piece of temporal protocol state and is
//! driven entirely by the host: [`Engine::send`] for outbound logical
//! messages, [`Engine::handle_rx`] for every inbound datagram, and
//! [`Engine::tick`] on a timer. All three take `now` from the host's
//! clock and none of them blocks.

use embedded_time::Instant;
#[cfg(feature = "block")]
use moss_msg::{Block, CodeKind, Token};
use moss_msg::{validity_check, EncodeError, Id, Message, MessageParseError,
               TryFromBytes, TryIntoBytes, Type, ValidityError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std_alloc::vec::Vec;

#[cfg(feature = "block")]
use crate::block::{Assemblies, OutboundTransfers, Progress, TooLarge};
use crate::config::Config;
use crate::dedup::{DedupStore, Disposition};
use crate::net::{Addrd, Transport};
#[cfg(feature = "resend")]
use crate::resend::{AckMatch, ResendQueue};
use crate::time::Clock;

/// Something the application should know about.
#[derive(Clone, PartialEq, Debug)]
pub enum Event {
  /// A complete logical message arrived (duplicates suppressed,
  /// blockwise transfers already reassembled)
  Recv(Addrd<Message>),
  /// A Confirmable message exhausted its retransmissions without an
  /// Ack or Reset; the peer looks unresponsive
  TimedOut(Addrd<Id>),
}

/// Everything that can go wrong inside an engine entry point.
#[derive(Clone, PartialEq, Debug)]
pub enum Error<E> {
  /// Serializing a message to bytes failed
  Encode(EncodeError),
  /// An inbound datagram was not parseable as a message
  Parse(MessageParseError),
  /// An inbound message parsed but broke a structural rule
  Invalid(ValidityError),
  /// The transport failed
  Transport(E),
  /// The transport reported `WouldBlock`; the datagram was not sent
  Backpressure,
  /// No free slot to track another in-flight Confirmable
  ResendFull,
  /// An inbound blockwise transfer exceeded the configured ceiling
  BlockwiseTooLarge,
}

impl<E> From<nb::Error<E>> for Error<E> {
  fn from(e: nb::Error<E>) -> Self {
    match e {
      | nb::Error::WouldBlock => Error::Backpressure,
      | nb::Error::Other(e) => Error::Transport(e),
    }
  }
}

/// A single-threaded draft-09 CoAP engine.
///
/// Concurrent use of one engine from several threads is not supported;
/// run one engine per execution context instead. Independent engines
/// share nothing.
#[allow(missing_debug_implementations)]
pub struct Engine<Tx: Transport, C: Clock> {
  tx: Tx,
  cfg: Config,
  rng: ChaCha8Rng,
  next_mid: u16,
  dedup: DedupStore<C>,
  #[cfg(feature = "resend")]
  resendq: ResendQueue<C>,
  #[cfg(feature = "block")]
  outbound: OutboundTransfers<C>,
  #[cfg(feature = "block")]
  assemblies: Assemblies<C>,
}

impl<Tx: Transport, C: Clock> Engine<Tx, C> {
  /// An engine writing to `tx`, configured by `cfg`.
  pub fn new(tx: Tx, cfg: Config) -> Self {
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let next_mid = rng.gen::<u16>();

    Engine { tx,
             rng,
             next_mid,
             dedup: DedupStore::new(cfg.dedup.window, cfg.dedup.capacity),
             #[cfg(feature = "resend")]
             resendq: ResendQueue::new(cfg.con.capacity),
             #[cfg(feature = "block")]
             outbound: OutboundTransfers::new(cfg.block.idle_timeout),
             #[cfg(feature = "block")]
             assemblies: Assemblies::new(cfg.block.max_incoming_size,
                                         cfg.block.idle_timeout),
             cfg }
  }

  /// A message id no other exchange started by this engine is using.
  pub fn next_id(&mut self) -> Id {
    let id = Id(self.next_mid);
    self.next_mid = self.next_mid.wrapping_add(1);
    id
  }

  /// Encode and transmit a logical message.
  ///
  /// Confirmables are parked for retransmission until the peer
  /// acknowledges. A payload larger than the configured block size is
  /// not sent whole: block 0 goes out and the rest waits for the
  /// peer's continuation acks.
  ///
  /// On failure nothing is tracked and the caller keeps the exchange;
  /// re-invoking with the same message is safe.
  pub fn send(&mut self,
              msg: Message,
              peer: no_std_net::SocketAddr,
              now: Instant<C>)
              -> Result<Id, Error<Tx::Error>> {
    validity_check(&msg).map_err(|e| Error::Encode(EncodeError::Invalid(e)))?;

    #[cfg(feature = "block")]
    let msg = if msg.code.kind() != CodeKind::Empty
                 && msg.payload.0.len() > usize::from(self.cfg.block.block_size)
    {
      self.outbound
          .start(msg, peer, self.cfg.block.block_size, now)
    } else {
      msg
    };

    let id = msg.id;
    let bytes = (&msg).try_into_bytes().map_err(Error::Encode)?;

    self.tx.transmit(Addrd(&bytes, peer)).map_err(Error::from)?;
    log::trace!("{:?} {:?} ({}b) -> {}", msg.ty, msg.code, bytes.len(), peer);

    #[cfg(feature = "resend")]
    if msg.ty == Type::Con {
      self.resendq
          .register(Addrd(id, peer),
                    bytes,
                    now,
                    &self.cfg.con.retry_strategy,
                    self.cfg.con.max_attempts,
                    &mut self.rng)
          .map_err(|_| Error::ResendFull)?;
    }
    #[cfg(not(feature = "resend"))]
    let _ = now;

    Ok(id)
  }

  /// Process one inbound datagram.
  ///
  /// Yields at most one event: a freshly received logical message, or
  /// nothing — because the datagram was an Ack, a duplicate, or a
  /// fragment of a transfer still in flight.
  pub fn handle_rx(&mut self,
                   dgram: Addrd<&[u8]>,
                   now: Instant<C>)
                   -> Result<Option<Event>, Error<Tx::Error>> {
    let peer = dgram.addr();
    let msg = Message::try_from_bytes(dgram.data()).map_err(Error::Parse)?;
    validity_check(&msg).map_err(Error::Invalid)?;
    log::trace!("{:?} {:?} ({}b) <- {}",
                msg.ty,
                msg.code,
                dgram.data().len(),
                peer);

    match msg.ty {
      | Type::Ack | Type::Reset => self.handle_ack_or_reset(msg, peer, now),
      | Type::Con | Type::Non => self.handle_con_or_non(msg, peer, now),
    }
  }

  fn handle_ack_or_reset(&mut self,
                         msg: Message,
                         peer: no_std_net::SocketAddr,
                         now: Instant<C>)
                         -> Result<Option<Event>, Error<Tx::Error>> {
    #[cfg(feature = "resend")]
    match self.resendq.ack_or_reset(Addrd(msg.id, peer)) {
      | AckMatch::Matched => (),
      | AckMatch::NotFound if msg.ty == Type::Ack => {
        log::warn!("discarding ack from {} addressing unknown {:?}", peer, msg.id);
      },
      | AckMatch::NotFound => (),
    }

    #[cfg(feature = "block")]
    if msg.ty == Type::Ack {
      if let Some(requested) = msg.opts.block1.or(msg.opts.block2) {
        let id = self.next_id();
        if let Some(next) = self.outbound
                                .next_block(Addrd(msg.token, peer), requested, id, now)
        {
          self.send(next, peer, now)?;
        }
      }
    }
    #[cfg(not(feature = "block"))]
    let _ = now;

    match msg.ty {
      // a Reset means something to the application (it is how a CoAP
      // ping comes back, and how an Observe registration dies)
      | Type::Reset => Ok(Some(Event::Recv(Addrd(msg, peer)))),
      | _ => Ok(None),
    }
  }

  fn handle_con_or_non(&mut self,
                       msg: Message,
                       peer: no_std_net::SocketAddr,
                       now: Instant<C>)
                       -> Result<Option<Event>, Error<Tx::Error>> {
    if self.dedup.check_and_record(Addrd(msg.id, peer), now) == Disposition::Duplicate {
      log::debug!("suppressing duplicate {:?} from {}", msg.id, peer);
      return Ok(None);
    }

    #[cfg(feature = "block")]
    if let Some(block) = msg.opts.block1.or(msg.opts.block2) {
      if block.more() || block.num() > 0 {
        return self.assemble(msg, peer, block, now);
      }
    }

    Ok(Some(Event::Recv(Addrd(msg, peer))))
  }

  #[cfg(feature = "block")]
  fn assemble(&mut self,
              msg: Message,
              peer: no_std_net::SocketAddr,
              block: Block,
              now: Instant<C>)
              -> Result<Option<Event>, Error<Tx::Error>> {
    let con = msg.ty == Type::Con;
    let (id, token) = (msg.id, msg.token);
    let via_block1 = msg.opts.block1.is_some();

    match self.assemblies.fragment(msg, peer, block, now) {
      | Err(TooLarge) => Err(Error::BlockwiseTooLarge),
      | Ok(Progress::Dropped) => Ok(None),
      | Ok(Progress::Appended(next)) => {
        // the application never sees this fragment, so acking it (and
        // asking for the next block) is on us
        if con {
          let request = Block::new(block.size(), next, true);
          self.continuation_ack(id, token, peer, Some((via_block1, request)), now)?;
        }
        Ok(None)
      },
      | Ok(Progress::Complete(done)) => {
        if con {
          self.continuation_ack(id, token, peer, None, now)?;
        }
        Ok(Some(Event::Recv(Addrd(done, peer))))
      },
    }
  }

  #[cfg(feature = "block")]
  fn continuation_ack(&mut self,
                      id: Id,
                      token: Token,
                      peer: no_std_net::SocketAddr,
                      request: Option<(bool, Block)>,
                      now: Instant<C>)
                      -> Result<(), Error<Tx::Error>> {
    let mut ack = Message::empty(Type::Ack, moss_msg::Code::EMPTY, id);
    // the peer keys its transfer by (peer, token)
    ack.token = token;
    match request {
      | Some((true, b)) => ack.opts.block1 = Some(b),
      | Some((false, b)) => ack.opts.block2 = Some(b),
      | None => (),
    }

    self.send(ack, peer, now).map(|_| ())
  }

  /// Let time pass: re-send what is due, surface what has given up,
  /// forget what has aged out.
  ///
  /// Call this on a timer; every few hundred milliseconds is typical.
  pub fn tick(&mut self, now: Instant<C>) -> Result<Vec<Event>, Error<Tx::Error>> {
    let mut events = Vec::new();

    #[cfg(feature = "resend")]
    {
      let outcome = self.resendq.tick(now, &self.cfg.con.retry_strategy);
      for dgram in &outcome.resend {
        match self.tx.transmit(*dgram) {
          | Ok(()) => (),
          | Err(nb::Error::WouldBlock) => {
            log::debug!("transport backpressure, retransmission to {} dropped",
                        dgram.addr());
          },
          | Err(nb::Error::Other(e)) => return Err(Error::Transport(e)),
        }
      }
      events.extend(outcome.expired.into_iter().map(Event::TimedOut));
    }

    self.dedup.reap(now);

    #[cfg(feature = "block")]
    {
      self.assemblies.reap(now);
      self.outbound.reap(now);
    }

    Ok(events)
  }
}
