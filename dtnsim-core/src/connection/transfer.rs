use crate::{host::HostId, measure::Bandwidth, message::Message, time::SimTime};

/// Lifecycle of a [`Transfer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// bytes are still flowing
    InFlight,
    /// every byte was credited to the connection
    Done,
    /// the transfer was interrupted after `sent` bytes
    Aborted { sent: u64 },
}

/// One copy of a message moving across a connection.
///
/// Progress is a pure function of the simulated time: the transfer sends
/// `bandwidth` bytes per second from the moment it started until all the
/// bytes of the message are sent.
#[derive(Debug, Clone)]
pub struct Transfer {
    message: Message,
    from: HostId,
    to: HostId,
    started: SimTime,
    bandwidth: Bandwidth,
    state: TransferState,
}

impl Transfer {
    pub(crate) fn new(
        message: Message,
        from: HostId,
        to: HostId,
        started: SimTime,
        bandwidth: Bandwidth,
    ) -> Self {
        Self {
            message,
            from,
            to,
            started,
            bandwidth,
            state: TransferState::InFlight,
        }
    }

    #[inline]
    pub fn message(&self) -> &Message {
        &self.message
    }

    #[inline]
    pub fn from(&self) -> HostId {
        self.from
    }

    #[inline]
    pub fn to(&self) -> HostId {
        self.to
    }

    #[inline]
    pub fn started(&self) -> SimTime {
        self.started
    }

    #[inline]
    pub fn state(&self) -> TransferState {
        self.state
    }

    #[inline]
    pub fn is_in_flight(&self) -> bool {
        self.state == TransferState::InFlight
    }

    /// expected end of the transfer
    pub fn done_at(&self) -> SimTime {
        SimTime::from_secs(
            self.started.as_secs() + self.bandwidth.transfer_secs(self.message.size()),
        )
    }

    /// bytes still to send at `now`, fractional bytes rounded up
    pub fn remaining_bytes(&self, now: SimTime) -> u64 {
        let size = self.message.size();
        match self.state {
            TransferState::InFlight => {
                let elapsed = now.secs_since(self.started);
                let remaining = size as f64 - self.bandwidth.bytes_in(elapsed);
                // the float can only shrink `size`, the cast cannot overflow
                remaining.max(0.0).ceil() as u64
            }
            TransferState::Done => 0,
            TransferState::Aborted { sent } => size - sent,
        }
    }

    /// bytes sent so far
    pub fn sent_bytes(&self, now: SimTime) -> u64 {
        self.message.size() - self.remaining_bytes(now)
    }

    /// all the bytes of the message went through
    pub fn is_complete(&self, now: SimTime) -> bool {
        match self.state {
            TransferState::InFlight => self.remaining_bytes(now) == 0,
            TransferState::Done => true,
            TransferState::Aborted { .. } => false,
        }
    }

    pub(crate) fn finish(&mut self) {
        self.state = TransferState::Done;
    }

    pub(crate) fn abort(&mut self, now: SimTime) -> u64 {
        let sent = self.sent_bytes(now);
        self.state = TransferState::Aborted { sent };
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(size: u64, bandwidth: u64) -> Transfer {
        let message = Message::builder("M1")
            .from(HostId::new(1))
            .to(HostId::new(2))
            .size(size)
            .build()
            .unwrap();
        Transfer::new(
            message,
            HostId::new(1),
            HostId::new(2),
            SimTime::from_secs(10.0),
            Bandwidth::new(bandwidth),
        )
    }

    fn at(elapsed: f64) -> SimTime {
        SimTime::from_secs(10.0 + elapsed)
    }

    #[test]
    fn progress_is_linear() {
        let transfer = transfer(50, 10);

        assert_eq!(transfer.remaining_bytes(at(0.0)), 50);
        assert_eq!(transfer.remaining_bytes(at(3.0)), 20);
        assert_eq!(transfer.sent_bytes(at(3.0)), 30);
        assert_eq!(transfer.done_at(), at(5.0));
    }

    #[test]
    fn fractional_bytes_are_rounded_up() {
        let transfer = transfer(50, 10);

        // 2.55 bytes sent, 47.45 remain
        assert_eq!(transfer.remaining_bytes(at(0.255)), 48);
    }

    #[test]
    fn completes_after_size_over_bandwidth() {
        let transfer = transfer(50, 10);

        assert!(!transfer.is_complete(at(4.9)));
        assert!(transfer.is_complete(at(5.0)));
        assert!(transfer.is_complete(at(7.0)));
        assert_eq!(transfer.remaining_bytes(at(7.0)), 0);
    }

    #[test]
    fn before_start_nothing_is_sent() {
        let transfer = transfer(50, 10);
        assert_eq!(transfer.remaining_bytes(SimTime::ZERO), 50);
    }

    #[test]
    fn aborted_progress_is_frozen() {
        let mut transfer = transfer(50, 10);

        assert_eq!(transfer.abort(at(2.0)), 20);
        assert_eq!(transfer.state(), TransferState::Aborted { sent: 20 });
        assert_eq!(transfer.remaining_bytes(at(4.0)), 30);
        assert!(!transfer.is_complete(at(10.0)));
    }

    #[test]
    fn empty_message_is_immediate() {
        let transfer = transfer(0, 10);
        assert!(transfer.is_complete(at(0.0)));
    }
}
