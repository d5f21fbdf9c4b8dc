//! The MCTP request/response engine.
//!
//! The engine multiplexes outstanding requests on one datagram socket.
//! Responses are matched to requests by `(EID, instance id)`; the type and
//! command octets must also agree or the datagram is silently dropped and
//! the request keeps waiting. At most one request may be in flight per
//! `(EID, instance id)`; the instance id reservation discipline guarantees
//! it, and double-binding is rejected as a logic error.
//!
//! ```text
//! caller ──► alloc iid ──► encode ──► send_recv ─────────► suspended
//!                                        │                     ▲
//!                                        ▼                     │ wake
//! run() ◄── socket readable ◄── peer     └── response/timeout ─┘
//! ```

mod timeouts;

pub use timeouts::Timeouts;

use crate::codec::{Msg, MsgHeader, PLDM_HEADER_LEN};
use crate::error::Error;
use crate::instance_id::InstanceIdDb;
use crate::mctp::MctpTransport;
use crate::{Eid, InstanceId};
use async_io::Timer;
use futures_lite::future;
use pldm_wire::PldmWireRead;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Instant;

/// Callback form of a response sink: receives the full response message, or
/// `None` on timeout or transport error.
pub type ResponseCallback = Box<dyn FnOnce(Eid, Option<&[u8]>)>;

#[derive(Default)]
struct Slot {
    result: Option<Result<Vec<u8>, Error>>,
    waker: Option<Waker>,
}

struct SlotFuture {
    slot: Rc<RefCell<Slot>>,
}

impl Future for SlotFuture {
    type Output = Result<Vec<u8>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();

        match slot.result.take() {
            Some(result) => Poll::Ready(result),
            None => {
                slot.waker = Some(cx.waker().clone());

                Poll::Pending
            }
        }
    }
}

enum Sink {
    Waiting(Rc<RefCell<Slot>>),
    Callback(ResponseCallback),
}

/// Wakes the run loop when a new request is bound, so its timeout deadline
/// is picked up even while the loop is parked on a quiet socket.
#[derive(Default)]
struct BindSignal {
    flagged: std::cell::Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

impl BindSignal {
    fn raise(&self) {
        self.flagged.set(true);

        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }

    fn wait(&self) -> BindWait<'_> {
        BindWait { signal: self }
    }
}

struct BindWait<'a> {
    signal: &'a BindSignal,
}

impl Future for BindWait<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.signal.flagged.replace(false) {
            return Poll::Ready(());
        }

        *self.signal.waker.borrow_mut() = Some(cx.waker().clone());

        Poll::Pending
    }
}

struct PendingRequest {
    /// `(type, command)` the response must echo.
    expect: (u8, u8),
    deadline: Instant,
    sink: Sink,
}

/// The request/response engine over a transport.
pub struct Engine<T> {
    transport: T,
    iids: RefCell<InstanceIdDb>,
    pending: RefCell<HashMap<(Eid, InstanceId), PendingRequest>>,
    timeouts: Timeouts,
    bind_signal: BindSignal,
}

impl<T: MctpTransport> Engine<T> {
    /// An engine owning `transport`.
    pub fn new(transport: T, timeouts: Timeouts) -> Self {
        Self {
            transport,
            iids: RefCell::new(InstanceIdDb::new()),
            pending: RefCell::new(HashMap::new()),
            timeouts,
            bind_signal: BindSignal::default(),
        }
    }

    /// Reserve the next instance id for `eid`.
    pub fn next_instance_id(&self, eid: Eid) -> Result<InstanceId, Error> {
        self.iids.borrow_mut().next(eid)
    }

    /// Release an instance id reservation, e.g. after an encode failure.
    pub fn free_instance_id(&self, eid: Eid, instance_id: InstanceId) {
        self.iids.borrow_mut().free(eid, instance_id);
    }

    /// Write a single datagram. Returns the number of PLDM bytes sent.
    pub async fn send(&self, eid: Eid, msg: &[u8]) -> Result<usize, Error> {
        self.transport.send(eid, msg).await
    }

    /// Receive one datagram destined for `eid`, bypassing the correlation
    /// table. Datagrams for other endpoints are dropped.
    pub async fn recv_any(&self, eid: Eid) -> Result<(InstanceId, Vec<u8>), Error> {
        loop {
            let (from, msg) = self.transport.recv().await?;

            if from != eid {
                log::trace!("dropping datagram for eid {} while receiving from {}", from, eid);

                continue;
            }

            let header = Msg::parse(&msg).map_err(Error::from)?.header;

            return Ok((header.instance_id, msg));
        }
    }

    fn bind(&self, eid: Eid, header: MsgHeader, sink: Sink) -> Result<(), Error> {
        let mut pending = self.pending.borrow_mut();

        if pending.contains_key(&(eid, header.instance_id)) {
            return Err(Error::InstanceIdInFlight {
                eid,
                instance_id: header.instance_id,
            });
        }

        let deadline =
            Instant::now() + self.timeouts.for_command(header.pldm_type, header.command);

        pending.insert(
            (eid, header.instance_id),
            PendingRequest {
                expect: (header.pldm_type, header.command),
                deadline,
                sink,
            },
        );

        drop(pending);

        self.bind_signal.raise();

        Ok(())
    }

    fn unbind(&self, eid: Eid, instance_id: InstanceId) -> Option<PendingRequest> {
        let removed = self.pending.borrow_mut().remove(&(eid, instance_id));

        if removed.is_some() {
            self.free_instance_id(eid, instance_id);
        }

        removed
    }

    /// Send a request and suspend until the matching response arrives or the
    /// command-class timeout expires.
    ///
    /// The instance id in the request header must have been reserved via
    /// [`Self::next_instance_id`]; it is released when the response lands,
    /// on timeout, or on a send failure.
    pub async fn send_recv(&self, eid: Eid, req: &[u8]) -> Result<Vec<u8>, Error> {
        let header = Msg::parse(req).map_err(Error::from)?.header;

        if !header.kind.is_request() {
            return Err(Error::Internal);
        }

        let slot = Rc::new(RefCell::new(Slot::default()));

        self.bind(eid, header, Sink::Waiting(Rc::clone(&slot)))?;

        if let Err(e) = self.transport.send(eid, req).await {
            self.unbind(eid, header.instance_id);

            return Err(e);
        }

        SlotFuture { slot }.await
    }

    /// Typed variant of [`Self::send_recv`]: encodes `payload` as a request,
    /// sends it and decodes the response.
    pub async fn send_recv_typed<R: crate::codec::Request>(
        &self,
        eid: Eid,
        payload: &R,
    ) -> Result<R::Response, Error> {
        let instance_id = self.next_instance_id(eid)?;
        let req = crate::codec::request(instance_id, payload);

        let resp = self.send_recv(eid, &req).await?;

        let msg = Msg::parse(&resp).map_err(Error::from)?;

        R::Response::unpack_from_slice(msg.payload).map_err(Error::from)
    }

    /// Non-blocking request: `on_response` is invoked with the response
    /// message, or with `None` on timeout or transport failure.
    pub async fn register_request(
        &self,
        eid: Eid,
        req: &[u8],
        on_response: ResponseCallback,
    ) -> Result<(), Error> {
        let header = Msg::parse(req).map_err(Error::from)?.header;

        if !header.kind.is_request() {
            return Err(Error::Internal);
        }

        self.bind(eid, header, Sink::Callback(on_response))?;

        if let Err(e) = self.transport.send(eid, req).await {
            log::error!("send to eid {} failed: {}", eid, e);

            if let Some(entry) = self.unbind(eid, header.instance_id) {
                if let Sink::Callback(cb) = entry.sink {
                    cb(eid, None);
                }
            }
        }

        Ok(())
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.borrow().values().map(|p| p.deadline).min()
    }

    fn expire(&self, now: Instant) {
        let expired: Vec<(Eid, InstanceId)> = self
            .pending
            .borrow()
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(key, _)| *key)
            .collect();

        for (eid, instance_id) in expired {
            log::warn!(
                "request to eid {} instance {} timed out",
                eid,
                instance_id
            );

            if let Some(entry) = self.unbind(eid, instance_id) {
                match entry.sink {
                    Sink::Waiting(slot) => {
                        let mut slot = slot.borrow_mut();

                        slot.result = Some(Err(Error::Timeout));

                        if let Some(waker) = slot.waker.take() {
                            waker.wake();
                        }
                    }
                    Sink::Callback(cb) => cb(eid, None),
                }
            }
        }
    }

    fn deliver_response(&self, eid: Eid, msg: &[u8], header: &MsgHeader) {
        let matches = {
            let pending = self.pending.borrow();

            match pending.get(&(eid, header.instance_id)) {
                Some(entry) => entry.expect == (header.pldm_type, header.command),
                // No reservation: a late response after timeout, dropped.
                None => {
                    log::trace!(
                        "unsolicited response from eid {} instance {}",
                        eid,
                        header.instance_id
                    );

                    return;
                }
            }
        };

        if !matches {
            log::trace!(
                "response type/command mismatch from eid {} instance {}; still waiting",
                eid,
                header.instance_id
            );

            return;
        }

        if let Some(entry) = self.unbind(eid, header.instance_id) {
            match entry.sink {
                Sink::Waiting(slot) => {
                    let mut slot = slot.borrow_mut();

                    slot.result = Some(Ok(msg.to_vec()));

                    if let Some(waker) = slot.waker.take() {
                        waker.wake();
                    }
                }
                Sink::Callback(cb) => cb(eid, Some(msg)),
            }
        }
    }

    /// Drive the engine: receive datagrams, steer responses to their
    /// reservations, dispatch requests through `handler` and send whatever
    /// it returns. Runs until the transport fails.
    pub async fn run<H>(&self, mut handler: H) -> Result<(), Error>
    where
        H: FnMut(Eid, Msg<'_>) -> Option<Vec<u8>>,
    {
        enum Step {
            Datagram(Result<(Eid, Vec<u8>), Error>),
            Deadline,
            Rebind,
        }

        loop {
            let rebind = async {
                self.bind_signal.wait().await;

                Step::Rebind
            };

            let step = match self.next_deadline() {
                Some(deadline) => {
                    future::or(
                        future::or(
                            async { Step::Datagram(self.transport.recv().await) },
                            async {
                                Timer::at(deadline).await;

                                Step::Deadline
                            },
                        ),
                        rebind,
                    )
                    .await
                }
                None => {
                    future::or(
                        async { Step::Datagram(self.transport.recv().await) },
                        rebind,
                    )
                    .await
                }
            };

            match step {
                // A new request was bound: recompute the nearest deadline.
                Step::Rebind => continue,
                Step::Deadline => self.expire(Instant::now()),
                Step::Datagram(Err(Error::Protocol(e))) => {
                    log::debug!("dropping malformed datagram: {}", e);
                }
                Step::Datagram(Err(e)) => return Err(e),
                Step::Datagram(Ok((eid, raw))) => {
                    let msg = match Msg::parse(&raw) {
                        Ok(msg) => msg,
                        Err(e) => {
                            log::debug!("dropping undecodable message from eid {}: {}", eid, e);

                            continue;
                        }
                    };

                    if msg.header.kind.is_request() {
                        if let Some(resp) = handler(eid, msg) {
                            debug_assert!(resp.len() >= PLDM_HEADER_LEN);

                            if let Err(e) = self.transport.send(eid, &resp).await {
                                log::error!("response send to eid {} failed: {}", eid, e);
                            }
                        }
                    } else {
                        self.deliver_response(eid, &raw, &msg.header);
                    }
                }
            }
        }
    }
}
