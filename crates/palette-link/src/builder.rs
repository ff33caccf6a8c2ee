//! LinkSessionBuilder -- fluent builder for constructing [`LinkSession`]
//! instances.
//!
//! Separates configuration from construction so that callers can plug in
//! hardware stages, timing policy, and serial port parameters before the
//! transport is opened.
//!
//! # Example
//!
//! ```no_run
//! use palette_core::identity;
//! use palette_link::builder::LinkSessionBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> palette_core::Result<()> {
//! let mut session = LinkSessionBuilder::new(identity::palette())
//!     .serial_port("/dev/ttyACM0")
//!     .read_timeout(Duration::from_millis(500))
//!     .build()
//!     .await?;
//! session.tick().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use palette_core::clock::{Clock, MonotonicClock};
use palette_core::error::{Error, Result};
use palette_core::identity::DeviceIdentity;
use palette_core::stages::{DiscardOutput, InputStage, NoIndicator, OutputStage, StatusIndicator};
use palette_core::transport::Transport;
use palette_transport::{SerialConfig, SerialTransport};

use crate::session::{LinkSession, SessionConfig, Stages};
use crate::timing::TimingInputStage;

/// Fluent builder for [`LinkSession`].
///
/// Every setting has a default, so the simplest usage is:
///
/// ```ignore
/// let session = LinkSessionBuilder::new(identity::palette())
///     .serial_port("/dev/ttyACM0")
///     .build()
///     .await?;
/// ```
///
/// Without explicit stages the session discards output values, reports
/// the round-trip timing metric on every input channel, and has no status
/// indicator.
pub struct LinkSessionBuilder {
    identity: DeviceIdentity,
    config: SessionConfig,
    serial_port: Option<String>,
    baud_rate: Option<u32>,
    output_stage: Option<Box<dyn OutputStage>>,
    input_stage: Option<Box<dyn InputStage>>,
    status_indicator: Option<Box<dyn StatusIndicator>>,
    clock: Option<Arc<dyn Clock>>,
}

impl LinkSessionBuilder {
    /// Create a new builder for a device with the given identity.
    pub fn new(identity: DeviceIdentity) -> Self {
        LinkSessionBuilder {
            identity,
            config: SessionConfig::default(),
            serial_port: None,
            baud_rate: None,
            output_stage: None,
            input_stage: None,
            status_indicator: None,
            clock: None,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyACM0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the default baud rate (115200). USB CDC ports ignore it.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = Some(baud);
        self
    }

    /// Set the bound on reading one inbound packet (default: 1s).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the length of each half of the status pulse (default: 50ms).
    ///
    /// Zero disables the delays; the indicator is still toggled.
    pub fn pulse_delay(mut self, delay: Duration) -> Self {
        self.config.pulse_delay = delay;
        self
    }

    /// Go back to announcing when the host stops sending (default: off).
    ///
    /// When off, a silent host only produces timeout outcomes and the
    /// session keeps waiting for packets.
    pub fn reannounce_on_silence(mut self, enabled: bool) -> Self {
        self.config.reannounce_on_silence = enabled;
        self
    }

    /// Set the stage that receives decoded output values.
    pub fn output_stage(mut self, stage: impl OutputStage + 'static) -> Self {
        self.output_stage = Some(Box::new(stage));
        self
    }

    /// Set the stage that produces input values.
    pub fn input_stage(mut self, stage: impl InputStage + 'static) -> Self {
        self.input_stage = Some(Box::new(stage));
        self
    }

    /// Set the indicator pulsed while seeking.
    pub fn status_indicator(mut self, indicator: impl StatusIndicator + 'static) -> Self {
        self.status_indicator = Some(Box::new(indicator));
        self
    }

    /// Replace the monotonic system clock.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Build a [`LinkSession`] with a caller-provided transport.
    ///
    /// This is the primary entry point for testing (pass a
    /// `ScriptedTransport` from `palette-test-harness`) and for TCP links.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<LinkSession> {
        if self.config.read_timeout.is_zero() {
            return Err(Error::InvalidParameter("read_timeout must be non-zero".into()));
        }

        let input_depth = self.identity.input.depth();
        let stages = Stages {
            output: self.output_stage.unwrap_or_else(|| Box::new(DiscardOutput)),
            input: self
                .input_stage
                .unwrap_or_else(|| Box::new(TimingInputStage::new(input_depth))),
            indicator: self.status_indicator.unwrap_or_else(|| Box::new(NoIndicator)),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));

        Ok(LinkSession::new(transport, self.identity, self.config, stages, clock))
    }

    /// Build a [`LinkSession`] over a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<LinkSession> {
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;
        let mut config = SerialConfig::default();
        if let Some(baud) = self.baud_rate {
            config.baud_rate = baud;
        }

        let transport = SerialTransport::open_with_config(port, config).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{LinkState, TickOutcome};
    use palette_core::identity;
    use palette_test_harness::ScriptedTransport;

    #[tokio::test]
    async fn builder_defaults() {
        let (transport, _script) = ScriptedTransport::new();
        let session = LinkSessionBuilder::new(identity::palette())
            .build_with_transport(Box::new(transport))
            .await
            .unwrap();

        assert_eq!(session.identity(), &identity::palette());
        assert_eq!(session.state(), LinkState::Seeking);
        assert_eq!(session.config(), &SessionConfig::default());
        assert_eq!(session.config().read_timeout, Duration::from_secs(1));
        assert_eq!(session.config().pulse_delay, Duration::from_millis(50));
        assert!(!session.config().reannounce_on_silence);
    }

    #[tokio::test]
    async fn builder_custom_settings() {
        let (transport, _script) = ScriptedTransport::new();
        let session = LinkSessionBuilder::new(identity::palette())
            .serial_port("/dev/ttyACM0")
            .baud_rate(9600)
            .read_timeout(Duration::from_millis(200))
            .pulse_delay(Duration::from_millis(5))
            .reannounce_on_silence(true)
            .build_with_transport(Box::new(transport))
            .await
            .unwrap();

        assert_eq!(
            session.config(),
            &SessionConfig {
                read_timeout: Duration::from_millis(200),
                pulse_delay: Duration::from_millis(5),
                reannounce_on_silence: true,
            }
        );
    }

    #[tokio::test]
    async fn builder_rejects_zero_read_timeout() {
        let (transport, _script) = ScriptedTransport::new();
        let result = LinkSessionBuilder::new(identity::palette())
            .read_timeout(Duration::ZERO)
            .build_with_transport(Box::new(transport))
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_serial_port_required_for_build() {
        let result = LinkSessionBuilder::new(identity::palette()).build().await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn default_stages_send_timing_metric() {
        let (transport, script) = ScriptedTransport::new();
        let mut session = LinkSessionBuilder::new(identity::palette())
            .build_with_transport(Box::new(transport))
            .await
            .unwrap();

        script.push_inbound(&[0; 12]);
        assert_eq!(session.tick().await.unwrap(), TickOutcome::PeerDetected);
        assert!(matches!(
            session.tick().await.unwrap(),
            TickOutcome::Exchanged { sequence: 1, .. }
        ));

        let reply = script.sent_data();
        assert_eq!(reply.len(), 1);
        assert_eq!(reply[0].len(), 12);
        // A freshly built session answers within a fraction of 0.4 s, so every
        // channel carries the same in-range metric.
        let values = palette_codec::PacketFormat::new(identity::palette().input)
            .decode_to_vec(&reply[0])
            .unwrap();
        assert!(values.iter().all(|&v| v == values[0] && v < 4095));
    }
}
