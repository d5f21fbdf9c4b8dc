//! The MCTP demux socket: datagram framing and the transport seam.
//!
//! Every datagram on the mux socket carries a two byte prefix
//! `[eid, msg_type]` ahead of the PLDM message. On open, the client writes a
//! single `0x01` byte to register as a PLDM consumer.

use crate::error::Error;
use crate::{Eid, MCTP_MSG_TYPE_PLDM};

/// Largest datagram this stack will accept or produce, prefix included.
pub const MAX_DATAGRAM: usize = 4096;

/// The abstract socket name of the MCTP demux daemon.
pub const MCTP_MUX_SOCKET: &[u8] = b"mctp-mux";

/// A datagram transport speaking MCTP framing.
///
/// The production implementation is [`MctpSocket`]; tests drive the engine
/// through scripted in-memory implementations.
pub trait MctpTransport {
    /// Send one PLDM message to `eid`, prefix prepended. Returns the number
    /// of PLDM bytes sent.
    async fn send(&self, eid: Eid, msg: &[u8]) -> Result<usize, Error>;

    /// Receive one PLDM message, prefix stripped and validated. The returned
    /// EID is the remote endpoint the datagram pertains to.
    async fn recv(&self) -> Result<(Eid, Vec<u8>), Error>;
}

impl<T: MctpTransport> MctpTransport for std::rc::Rc<T> {
    async fn send(&self, eid: Eid, msg: &[u8]) -> Result<usize, Error> {
        T::send(self, eid, msg).await
    }

    async fn recv(&self) -> Result<(Eid, Vec<u8>), Error> {
        T::recv(self).await
    }
}

#[cfg(unix)]
pub use unix::MctpSocket;

#[cfg(unix)]
mod unix {
    use super::{MctpTransport, MAX_DATAGRAM, MCTP_MUX_SOCKET};
    use crate::error::Error;
    use crate::{Eid, MCTP_MSG_TYPE_PLDM};
    use async_io::Async;
    use nix::sys::socket::{connect, socket, AddressFamily, SockFlag, SockType, UnixAddr};
    use std::io;
    use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};

    fn nix_to_io(err: nix::errno::Errno) -> io::Error {
        io::Error::from_raw_os_error(err as i32)
    }

    fn read_fd(fd: &impl AsRawFd, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: buf outlives the call and len is its real length.
        let n = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };

        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(n as usize)
    }

    fn write_fd(fd: &impl AsRawFd, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: buf outlives the call and len is its real length.
        let n = unsafe { libc::write(fd.as_raw_fd(), buf.as_ptr().cast(), buf.len()) };

        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(n as usize)
    }

    #[derive(Debug)]
    struct MuxFd(OwnedFd);

    impl AsFd for MuxFd {
        fn as_fd(&self) -> BorrowedFd<'_> {
            self.0.as_fd()
        }
    }

    impl AsRawFd for MuxFd {
        fn as_raw_fd(&self) -> std::os::fd::RawFd {
            self.0.as_raw_fd()
        }
    }

    /// The demux daemon connection.
    #[derive(Debug)]
    pub struct MctpSocket {
        io: Async<MuxFd>,
    }

    impl MctpSocket {
        /// Connect to the demux daemon and register as a PLDM consumer.
        pub fn open() -> Result<Self, Error> {
            let fd = socket(
                AddressFamily::Unix,
                SockType::SeqPacket,
                SockFlag::empty(),
                None,
            )
            .map_err(nix_to_io)?;

            let addr = UnixAddr::new_abstract(MCTP_MUX_SOCKET).map_err(nix_to_io)?;

            connect(fd.as_raw_fd(), &addr).map_err(nix_to_io)?;

            write_fd(&fd, &[MCTP_MSG_TYPE_PLDM])?;

            Ok(Self {
                io: Async::new(MuxFd(fd))?,
            })
        }
    }

    impl MctpTransport for MctpSocket {
        async fn send(&self, eid: Eid, msg: &[u8]) -> Result<usize, Error> {
            let datagram = super::frame_datagram(eid, msg);

            let sent = self
                .io
                .write_with(|s| write_fd(s, &datagram))
                .await?;

            if sent != datagram.len() {
                return Err(Error::PartialSend {
                    len: datagram.len(),
                    sent,
                });
            }

            Ok(msg.len())
        }

        async fn recv(&self) -> Result<(Eid, Vec<u8>), Error> {
            let mut buf = [0u8; MAX_DATAGRAM];

            let len = self.io.read_with(|s| read_fd(s, &mut buf)).await?;

            super::parse_datagram(&buf[..len])
        }
    }
}

/// Validate the `[eid, msg_type]` prefix and split off the PLDM message.
pub fn parse_datagram(datagram: &[u8]) -> Result<(Eid, Vec<u8>), Error> {
    // prefix plus at least a PLDM header
    if datagram.len() < 2 + crate::codec::PLDM_HEADER_LEN {
        return Err(Error::Protocol(crate::error::ProtocolError::Truncated));
    }

    if datagram[1] != MCTP_MSG_TYPE_PLDM {
        return Err(Error::Protocol(crate::error::ProtocolError::Truncated));
    }

    Ok((datagram[0], datagram[2..].to_vec()))
}

/// Prefix a PLDM message for the wire.
pub fn frame_datagram(eid: Eid, msg: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + msg.len());
    out.push(eid);
    out.push(MCTP_MSG_TYPE_PLDM);
    out.extend_from_slice(msg);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datagram_round_trip() {
        let msg = [0x85u8, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];

        let framed = frame_datagram(9, &msg);

        assert_eq!(framed[0], 9);
        assert_eq!(framed[1], MCTP_MSG_TYPE_PLDM);
        assert_eq!(parse_datagram(&framed).unwrap(), (9, msg.to_vec()));
    }

    #[test]
    fn short_datagram_rejected() {
        assert!(parse_datagram(&[9, MCTP_MSG_TYPE_PLDM, 0x85]).is_err());
    }

    #[test]
    fn wrong_msg_type_rejected() {
        let framed = frame_datagram(9, &[0x85, 0x00, 0x03, 0x00]);

        let mut wrong = framed.clone();
        wrong[1] = 0x7E;

        assert!(parse_datagram(&wrong).is_err());
    }
}
