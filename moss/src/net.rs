use no_std_net::SocketAddr;

/// Data associated with the peer it came from or is going to
#[derive(PartialEq, PartialOrd, Eq, Ord, Hash, Debug, Clone, Copy)]
pub struct Addrd<T>(pub T, pub SocketAddr);

impl<T> Addrd<T> {
  /// Borrow the contents of this Addressed
  pub fn as_ref(&self) -> Addrd<&T> {
    Addrd(self.data(), self.addr())
  }

  /// Discard the address and get the data in this Addressed
  pub fn unwrap(self) -> T {
    self.0
  }

  /// Map the data contained in this Addressed
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  /// Borrow the contents of the addressed item
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Mutably borrow the contents of the addressed item
  pub fn data_mut(&mut self) -> &mut T {
    &mut self.0
  }

  /// Copy the address associated with the data
  pub fn addr(&self) -> SocketAddr {
    self.1
  }
}

/// The host's outbound datagram path.
///
/// [`transmit`](Transport::transmit) is invoked on every send and on
/// every retransmission. It must not block: either the datagram is
/// handed to the network right away, or the transport reports
/// [`nb::Error::WouldBlock`] and the engine treats the datagram as
/// dropped (retransmission will cover Confirmables).
///
/// Closures get a blanket implementation, which keeps simple hosts and
/// tests to one line:
///
/// ```
/// use moss::net::{Addrd, Transport};
///
/// let mut sent = 0u32;
/// let mut tx = |_dgram: Addrd<&[u8]>| -> nb::Result<(), core::convert::Infallible> {
///   sent += 1;
///   Ok(())
/// };
/// tx.transmit(Addrd(&b"hi"[..], "127.0.0.1:5683".parse().unwrap())).unwrap();
/// ```
pub trait Transport {
  /// The error yielded by the underlying network
  type Error: ::core::fmt::Debug;

  /// Hand one datagram to the network, without blocking
  fn transmit(&mut self, dgram: Addrd<&[u8]>) -> nb::Result<(), Self::Error>;
}

impl<F, E> Transport for F
  where F: FnMut(Addrd<&[u8]>) -> nb::Result<(), E>,
        E: ::core::fmt::Debug
{
  type Error = E;

  fn transmit(&mut self, dgram: Addrd<&[u8]>) -> nb::Result<(), E> {
    self(dgram)
  }
}
