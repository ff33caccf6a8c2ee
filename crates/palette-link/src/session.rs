//! The device side of the Palette link.
//!
//! A [`LinkSession`] owns the transport and drives the two-state protocol:
//!
//! - **Seeking**: while no host input is waiting, announce the device
//!   identity and pulse the status indicator. The first waiting byte moves
//!   the session to exchanging.
//! - **Exchanging**: read one inbound packet, decode it, hand the output
//!   values to the output stage, take fresh input values from the input
//!   stage, encode them, and write one outbound packet.
//!
//! Each call to [`LinkSession::tick`] performs one step; [`LinkSession::run`]
//! ticks until cancelled or until the transport fails.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use palette_codec::PacketFormat;
use palette_core::clock::Clock;
use palette_core::error::{Error, Result};
use palette_core::events::SessionEvent;
use palette_core::identity::DeviceIdentity;
use palette_core::stages::{InputStage, OutputStage, StatusIndicator};
use palette_core::transport::Transport;
use palette_core::types::Sample;

/// Capacity of the session event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Which half of the protocol the session is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No host heard yet; announcing.
    Seeking,
    /// Host found; exchanging packets.
    Exchanging,
}

/// What a single [`LinkSession::tick`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Sent the announcement and pulsed the indicator.
    Announced,
    /// Host input was waiting; the session switched to exchanging.
    PeerDetected,
    /// Completed one round trip.
    Exchanged {
        /// Number of exchanges completed so far, starting at 1.
        sequence: u64,
        /// Microseconds since the previous exchange completed.
        elapsed_micros: u64,
    },
    /// The inbound packet did not arrive in time. Bytes that did arrive,
    /// and any input already buffered behind them, were discarded.
    TimedOut { received: usize },
    /// The read timed out and the session went back to announcing.
    ReturnedToSeeking,
}

/// Session timing and fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bound on reading one inbound packet.
    pub read_timeout: Duration,
    /// Length of each half of the status pulse.
    pub pulse_delay: Duration,
    /// Return to seeking when an inbound read times out.
    pub reannounce_on_silence: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            pulse_delay: Duration::from_millis(50),
            reannounce_on_silence: false,
        }
    }
}

/// The hardware seams a session drives.
pub(crate) struct Stages {
    pub output: Box<dyn OutputStage>,
    pub input: Box<dyn InputStage>,
    pub indicator: Box<dyn StatusIndicator>,
}

/// Device-side link session. Build one with
/// [`LinkSessionBuilder`](crate::builder::LinkSessionBuilder).
pub struct LinkSession {
    transport: Box<dyn Transport>,
    identity: DeviceIdentity,
    announcement: String,
    config: SessionConfig,

    inbound: PacketFormat,
    outbound: PacketFormat,
    inbound_bytes: Box<[u8]>,
    outputs: Box<[Sample]>,
    inputs: Box<[Sample]>,
    outbound_bytes: Box<[u8]>,

    stages: Stages,
    clock: Arc<dyn Clock>,
    last_exchange_micros: u64,

    state: LinkState,
    sequence: u64,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl LinkSession {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        identity: DeviceIdentity,
        config: SessionConfig,
        stages: Stages,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let inbound = PacketFormat::new(identity.output);
        let outbound = PacketFormat::new(identity.input);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let last_exchange_micros = clock.now_micros();

        debug!(
            identity = %identity,
            inbound_len = inbound.len(),
            outbound_len = outbound.len(),
            "link session created"
        );

        Self {
            transport,
            announcement: identity.announcement(),
            identity,
            config,
            inbound_bytes: vec![0; inbound.len()].into_boxed_slice(),
            outputs: vec![0; inbound.channels()].into_boxed_slice(),
            inputs: vec![0; outbound.channels()].into_boxed_slice(),
            outbound_bytes: vec![0; outbound.len()].into_boxed_slice(),
            inbound,
            outbound,
            stages,
            clock,
            last_exchange_micros,
            state: LinkState::Seeking,
            sequence: 0,
            event_tx,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of exchanges completed so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Perform one protocol step.
    ///
    /// Timeouts while exchanging are reported as outcomes, not errors.
    /// Transport failures and stage failures are returned as errors.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        match self.state {
            LinkState::Seeking => self.seek().await,
            LinkState::Exchanging => self.exchange().await,
        }
    }

    /// Tick until `cancel` fires or a tick fails.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        info!(identity = %self.identity, "link session running");
        loop {
            let outcome = tokio::select! {
                biased;

                _ = cancel.cancelled() => None,
                outcome = self.tick() => Some(outcome),
            };

            match outcome {
                None => {
                    debug!(exchanges = self.sequence, "link session cancelled");
                    return Ok(());
                }
                Some(Err(e)) => {
                    warn!(error = %e, exchanges = self.sequence, "link session stopped");
                    return Err(e);
                }
                Some(Ok(_)) => {}
            }
        }
    }

    async fn seek(&mut self) -> Result<TickOutcome> {
        if self.transport.has_input()? {
            info!("host input detected, exchanging packets");
            self.state = LinkState::Exchanging;
            self.emit(SessionEvent::PeerDetected);
            return Ok(TickOutcome::PeerDetected);
        }

        trace!(announcement = %self.announcement, "announcing");
        self.transport.send_line(&self.announcement).await?;
        self.pulse().await;
        self.emit(SessionEvent::Announced);
        Ok(TickOutcome::Announced)
    }

    async fn pulse(&mut self) {
        let delay = self.config.pulse_delay;
        self.stages.indicator.set(false);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.stages.indicator.set(true);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn exchange(&mut self) -> Result<TickOutcome> {
        match self
            .transport
            .read_exact(&mut self.inbound_bytes, self.config.read_timeout)
            .await
        {
            Ok(()) => {}
            Err(Error::Timeout) => return Ok(self.read_timed_out(0)),
            Err(Error::IncompletePacket { received, .. }) => {
                let dropped = self.discard_buffered_input().await?;
                if dropped > 0 {
                    debug!(dropped, "discarded late bytes of truncated packet");
                }
                return Ok(self.read_timed_out(received));
            }
            Err(e) => return Err(e),
        }

        self.inbound.decode(&self.inbound_bytes, &mut self.outputs)?;
        self.stages.output.apply(&self.outputs)?;

        let elapsed_micros = self
            .clock
            .now_micros()
            .saturating_sub(self.last_exchange_micros);
        self.stages.input.sample(elapsed_micros, &mut self.inputs)?;

        self.outbound.encode(&self.inputs, &mut self.outbound_bytes)?;
        self.transport.send(&self.outbound_bytes).await?;

        self.last_exchange_micros = self.clock.now_micros();
        self.sequence += 1;

        trace!(
            sequence = self.sequence,
            elapsed_us = elapsed_micros,
            outputs = ?self.outputs,
            inputs = ?self.inputs,
            "exchanged"
        );
        self.emit(SessionEvent::Exchanged {
            sequence: self.sequence,
            elapsed_micros,
        });
        Ok(TickOutcome::Exchanged {
            sequence: self.sequence,
            elapsed_micros,
        })
    }

    /// Drop the input that is waiting right now.
    ///
    /// The tail of a truncated packet may already be buffered; reading it
    /// as the head of the next packet would shift every later packet.
    /// Bytes that arrive after this call are not affected.
    async fn discard_buffered_input(&mut self) -> Result<usize> {
        let mut left = self.transport.bytes_available()?;
        let mut dropped = 0;
        while left > 0 {
            match self
                .transport
                .receive(&mut self.inbound_bytes, self.config.read_timeout)
                .await
            {
                Ok(0) | Err(Error::Timeout) => break,
                Ok(n) => {
                    dropped += n;
                    left = left.saturating_sub(n);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(dropped)
    }

    fn read_timed_out(&mut self, received: usize) -> TickOutcome {
        warn!(
            expected = self.inbound.len(),
            received,
            "inbound packet timed out, discarding received bytes"
        );
        self.emit(SessionEvent::ReadTimedOut { received });

        if self.config.reannounce_on_silence {
            info!("host silent, returning to seeking");
            self.state = LinkState::Seeking;
            self.emit(SessionEvent::ReturnedToSeeking);
            return TickOutcome::ReturnedToSeeking;
        }
        TickOutcome::TimedOut { received }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is not an error.
        let _ = self.event_tx.send(event);
    }
}
