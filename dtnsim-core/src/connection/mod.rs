//! Contacts between two hosts and the transfers going through them.

mod id;
mod transfer;

use crate::{
    host::HostId,
    measure::Bandwidth,
    message::{Message, MessageId},
    router::{ReceiveError, Router},
    time::SimTime,
};
use thiserror::Error;
use tracing::debug;

pub use self::{
    id::ConnectionId,
    transfer::{Transfer, TransferState},
};

/// A contact between two hosts.
///
/// The connection has a fixed [`Bandwidth`] and carries at most one
/// [`Transfer`] at a time, in either direction:
///
/// ```text
/// Idle -> Transferring -> { Done | Aborted } -> Idle
/// ```
///
/// The connection is shared by its two hosts and lives for as long as the
/// hosts are in range of each other.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    initiator: HostId,
    peer: HostId,
    bandwidth: Bandwidth,
    up: bool,
    transfer: Option<Transfer>,
    /// bytes credited by finished and aborted transfers
    bytes_transferred: u64,
}

/// Error returned when [`Connection::start_transfer`] fails.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Connection ({connection}) is busy with another transfer")]
    Busy { connection: ConnectionId },
    #[error("Connection ({connection}) is down")]
    Down { connection: ConnectionId },
    #[error("Host ({host}) is not an end of the connection ({connection})")]
    NotAnEndpoint {
        host: HostId,
        connection: ConnectionId,
    },
    #[error("Receiver ({receiver}) refused message ({message}): {reason}")]
    Denied {
        receiver: HostId,
        message: MessageId,
        #[source]
        reason: ReceiveError,
    },
}

impl Connection {
    pub fn new(initiator: HostId, peer: HostId, bandwidth: Bandwidth) -> Self {
        Self {
            id: ConnectionId::new((initiator, peer)),
            initiator,
            peer,
            bandwidth,
            up: true,
            transfer: None,
            bytes_transferred: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[inline]
    pub fn initiator(&self) -> HostId {
        self.initiator
    }

    #[inline]
    pub fn peer(&self) -> HostId {
        self.peer
    }

    #[inline]
    pub fn is_initiator(&self, host: HostId) -> bool {
        self.initiator == host
    }

    /// the end of the connection that is not `host`
    #[inline]
    pub fn other(&self, host: HostId) -> HostId {
        if self.initiator == host {
            self.peer
        } else {
            self.initiator
        }
    }

    #[inline]
    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    #[inline]
    pub fn is_up(&self) -> bool {
        self.up
    }

    /// the current or last transfer of the connection
    #[inline]
    pub fn transfer(&self) -> Option<&Transfer> {
        self.transfer.as_ref()
    }

    #[inline]
    pub fn is_transferring(&self) -> bool {
        self.transfer.as_ref().is_some_and(Transfer::is_in_flight)
    }

    #[inline]
    pub fn is_ready_for_transfer(&self) -> bool {
        self.up && !self.is_transferring()
    }

    /// start sending a copy of `message` from `from` to the other end
    ///
    /// The `receiver` (the router at the other end) decides whether it
    /// accepts the message. On refusal the connection stays idle.
    pub fn start_transfer(
        &mut self,
        now: SimTime,
        from: HostId,
        message: &Message,
        receiver: &mut Router,
    ) -> Result<(), TransferError> {
        if !self.up {
            return Err(TransferError::Down {
                connection: self.id,
            });
        }
        if self.is_transferring() {
            return Err(TransferError::Busy {
                connection: self.id,
            });
        }
        if !self.id.involves(from) {
            return Err(TransferError::NotAnEndpoint {
                host: from,
                connection: self.id,
            });
        }
        let to = self.other(from);
        debug_assert_eq!(receiver.host(), to, "receiver is not the other end");

        receiver
            .receive_message(now, message, from)
            .map_err(|reason| TransferError::Denied {
                receiver: to,
                message: message.id().clone(),
                reason,
            })?;

        debug!(
            connection = %self.id,
            message = %message.id(),
            %from,
            %to,
            size = message.size(),
            "transfer started"
        );

        self.transfer = Some(Transfer::new(
            message.replicate(),
            from,
            to,
            now,
            self.bandwidth,
        ));
        Ok(())
    }

    /// bytes of the in-flight message still to send, `0` when idle
    pub fn remaining_bytes(&self, now: SimTime) -> u64 {
        self.transfer
            .as_ref()
            .filter(|transfer| transfer.is_in_flight())
            .map_or(0, |transfer| transfer.remaining_bytes(now))
    }

    /// the in-flight message has been fully sent
    pub fn is_message_transferred(&self, now: SimTime) -> bool {
        self.transfer
            .as_ref()
            .is_some_and(|transfer| transfer.is_in_flight() && transfer.is_complete(now))
    }

    /// mark the in-flight transfer as done, crediting all its bytes
    ///
    /// Returns the finished transfer, `None` if nothing was in flight.
    pub fn finalize(&mut self) -> Option<&Transfer> {
        let transfer = self.transfer.as_mut().filter(|t| t.is_in_flight())?;
        transfer.finish();
        self.bytes_transferred += transfer.message().size();
        Some(transfer)
    }

    /// interrupt the in-flight transfer
    ///
    /// Returns the number of bytes the transfer actually sent. Aborting
    /// again, or aborting a completed transfer, changes nothing and
    /// reports the same number.
    pub fn abort(&mut self, now: SimTime) -> u64 {
        let Some(transfer) = self.transfer.as_mut() else {
            return 0;
        };
        match transfer.state() {
            TransferState::InFlight => {
                let sent = transfer.abort(now);
                self.bytes_transferred += sent;
                debug!(connection = %self.id, message = %transfer.message().id(), sent, "transfer aborted");
                sent
            }
            TransferState::Aborted { sent } => sent,
            TransferState::Done => transfer.message().size(),
        }
    }

    /// all the bytes that went through the connection so far, including
    /// the progress of the in-flight transfer
    pub fn total_bytes_transferred(&self, now: SimTime) -> u64 {
        let in_flight = self
            .transfer
            .as_ref()
            .filter(|transfer| transfer.is_in_flight())
            .map_or(0, |transfer| transfer.sent_bytes(now));
        self.bytes_transferred + in_flight
    }

    pub(crate) fn set_down(&mut self) {
        self.up = false;
    }
}
