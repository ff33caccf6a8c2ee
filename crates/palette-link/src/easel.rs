//! The host side of the Palette link.
//!
//! [`EaselLink::discover`] listens for the device's announcement line and
//! learns the packet layouts from it. [`EaselLink::exchange`] then runs one
//! round trip: send the output values, wait for the input values.
//!
//! The device keeps announcing until it notices host input, so one or more
//! announcement lines may still be in flight when the first packet goes out.
//! Until the first reply has been read, whole announcement lines at the head
//! of the input are skipped.

use std::time::Duration;

use bytes::{Buf, BytesMut};
use tracing::{debug, info, trace, warn};

use palette_codec::PacketFormat;
use palette_core::error::{Error, Result};
use palette_core::identity::DeviceIdentity;
use palette_core::transport::Transport;
use palette_core::types::Sample;

/// Longest line accepted while waiting for an announcement.
const MAX_LINE: usize = 256;

/// Size of one transport read.
const READ_CHUNK: usize = 256;

/// Host-side link to a discovered Palette.
pub struct EaselLink {
    transport: Box<dyn Transport>,
    identity: DeviceIdentity,
    announcement: Vec<u8>,
    inbound: PacketFormat,
    outbound: PacketFormat,
    read_timeout: Duration,
    pending: BytesMut,
    synced: bool,
}

impl EaselLink {
    /// Wait up to `timeout` for a valid announcement and return a link to
    /// the device that sent it.
    ///
    /// Lines that do not parse as an announcement are logged and skipped.
    /// `timeout` also becomes the read timeout for [`exchange`](Self::exchange).
    pub async fn discover(mut transport: Box<dyn Transport>, timeout: Duration) -> Result<Self> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut pending = BytesMut::with_capacity(MAX_LINE);

        let (identity, announcement) = loop {
            if let Some(line) = take_line(&mut pending) {
                let text = String::from_utf8_lossy(&line);
                match DeviceIdentity::parse_announcement(&text) {
                    Ok(identity) => break (identity, line.to_vec()),
                    Err(e) => {
                        debug!(line = %text.trim_end(), error = %e, "ignoring non-announcement line");
                        continue;
                    }
                }
            }
            if pending.len() > MAX_LINE {
                warn!(len = pending.len(), "no line break in input, discarding");
                pending.clear();
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }
            read_more(&mut *transport, &mut pending, remaining).await?;
        };

        info!(identity = %identity, "discovered device");

        Ok(Self {
            transport,
            announcement,
            inbound: PacketFormat::new(identity.output),
            outbound: PacketFormat::new(identity.input),
            identity,
            read_timeout: timeout,
            pending,
            synced: false,
        })
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Change the bound on waiting for one reply packet.
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    /// Send one set of output values and return the device's input values.
    ///
    /// `outputs` must hold exactly one value per device output channel.
    /// A reply that does not arrive in time is discarded and reported as
    /// [`Error::Timeout`] or [`Error::IncompletePacket`].
    pub async fn exchange(&mut self, outputs: &[Sample]) -> Result<Vec<Sample>> {
        let packet = self.inbound.encode_to_vec(outputs)?;
        self.transport.send(&packet).await?;

        let len = self.outbound.len();
        let deadline = tokio::time::Instant::now() + self.read_timeout;

        loop {
            let waiting_on_announcement = !self.synced && self.skip_announcements();
            if !waiting_on_announcement && self.pending.len() >= len {
                break;
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let result = if remaining.is_zero() {
                Err(Error::Timeout)
            } else {
                read_more(&mut *self.transport, &mut self.pending, remaining).await
            };

            match result {
                Ok(()) => {}
                // What looked like the start of an announcement was a reply.
                Err(Error::Timeout) if self.pending.len() >= len => break,
                Err(Error::Timeout) => {
                    let received = self.pending.len();
                    self.pending.clear();
                    warn!(expected = len, received, "reply timed out, discarding partial bytes");
                    return Err(if received == 0 {
                        Error::Timeout
                    } else {
                        Error::IncompletePacket {
                            expected: len,
                            received,
                        }
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let reply = self.pending.split_to(len);
        self.synced = true;
        let inputs = self.outbound.decode_to_vec(&reply)?;
        trace!(outputs = ?outputs, inputs = ?inputs, "exchanged");
        Ok(inputs)
    }

    /// Close the underlying transport.
    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }

    /// Drop complete copies of the discovered announcement line from the
    /// head of `pending`.
    ///
    /// Returns `true` if `pending` holds the beginning of an announcement
    /// and more bytes are needed to tell it apart from a reply.
    fn skip_announcements(&mut self) -> bool {
        let line = self.announcement.as_slice();
        loop {
            let head = &self.pending[..];
            let common = head.len().min(line.len());
            if head[..common] != line[..common] {
                return false;
            }
            if head.len() <= line.len() {
                return !head.is_empty();
            }

            let skip = match &head[line.len()..] {
                [b'\n', ..] => line.len() + 1,
                [b'\r', b'\n', ..] => line.len() + 2,
                [b'\r'] => return true,
                _ => return false,
            };
            debug!("skipping stale announcement");
            self.pending.advance(skip);
        }
    }
}

/// Append whatever the transport delivers within `timeout` to `pending`.
async fn read_more(
    transport: &mut dyn Transport,
    pending: &mut BytesMut,
    timeout: Duration,
) -> Result<()> {
    let mut chunk = [0u8; READ_CHUNK];
    let n = transport.receive(&mut chunk, timeout).await?;
    if n == 0 {
        return Err(Error::ConnectionLost);
    }
    pending.extend_from_slice(&chunk[..n]);
    Ok(())
}

/// Split off one line (without its terminator) if a `\n` has arrived.
fn take_line(pending: &mut BytesMut) -> Option<BytesMut> {
    let end = pending.iter().position(|&b| b == b'\n')?;
    let mut line = pending.split_to(end + 1);
    line.truncate(end);
    if line.last() == Some(&b'\r') {
        line.truncate(end - 1);
    }
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LinkSessionBuilder;
    use palette_core::identity;
    use palette_test_harness::{RecordingOutputStage, ScriptHandle, ScriptedTransport};
    use palette_transport::TcpTransport;
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    const ANNOUNCEMENT: &[u8] = b"Palettev0.4.4 8 12 8 12\n";
    const TIMEOUT: Duration = Duration::from_millis(100);

    fn reply(values: [Sample; 8]) -> Vec<u8> {
        PacketFormat::new(identity::palette().input)
            .encode_to_vec(&values)
            .unwrap()
    }

    async fn discovered() -> (EaselLink, ScriptHandle) {
        let (transport, script) = ScriptedTransport::new();
        script.push_inbound(ANNOUNCEMENT);
        let link = EaselLink::discover(Box::new(transport), TIMEOUT)
            .await
            .unwrap();
        (link, script)
    }

    #[tokio::test]
    async fn discover_parses_announcement() {
        let (link, _script) = discovered().await;
        assert_eq!(link.identity(), &identity::palette());
    }

    #[tokio::test]
    async fn discover_accepts_space_separated_crlf_form() {
        let (transport, script) = ScriptedTransport::new();
        script.push_inbound(b"Palette v0.4.4 8 12 8 12\r\n");
        let link = EaselLink::discover(Box::new(transport), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(link.identity().model_name, "Palette");
        assert_eq!(link.identity().firmware_version, "v0.4.4");
    }

    #[tokio::test]
    async fn discover_skips_noise_and_partial_lines() {
        let (transport, script) = ScriptedTransport::new();
        script.set_max_chunk(5);
        script.push_inbound(b"tte 8 12\nboot ok\n");
        script.push_inbound(ANNOUNCEMENT);
        let link = EaselLink::discover(Box::new(transport), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(link.identity(), &identity::palette());
    }

    #[tokio::test]
    async fn discover_times_out_without_announcement() {
        let (transport, script) = ScriptedTransport::new();
        script.push_inbound(b"Palettev0.4");
        let result = EaselLink::discover(Box::new(transport), TIMEOUT).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn exchange_sends_packet_and_decodes_reply() {
        let (mut link, script) = discovered().await;
        let inputs = [10, 20, 30, 40, 50, 60, 70, 4095];
        script.queue_reply(&reply(inputs));

        let outputs = [0x123, 0x456, 4095, 0, 0, 4095, 2048, 2048];
        let got = link.exchange(&outputs).await.unwrap();
        assert_eq!(got, inputs.to_vec());

        let sent = script.sent_data();
        assert_eq!(
            sent,
            vec![vec![
                0x12, 0x34, 0x56, 0xFF, 0xF0, 0x00, 0x00, 0x0F, 0xFF, 0x80, 0x08, 0x00
            ]]
        );
    }

    #[tokio::test]
    async fn exchange_skips_stale_announcements() {
        let (mut link, script) = discovered().await;
        script.push_inbound(ANNOUNCEMENT);
        script.push_inbound(b"Palettev0.4.4 8 12 8 12\r\n");
        let mut late = ANNOUNCEMENT.to_vec();
        late.extend(reply([7; 8]));
        script.queue_reply(&late);

        assert_eq!(link.exchange(&[0; 8]).await.unwrap(), vec![7; 8]);

        // Once synced, bytes are taken as packets without inspection.
        script.queue_reply(&reply([1; 8]));
        assert_eq!(link.exchange(&[0; 8]).await.unwrap(), vec![1; 8]);
    }

    #[tokio::test]
    async fn exchange_skips_stale_space_separated_announcements() {
        const SPACED: &[u8] = b"Palette v0.4.4 8 12 8 12\n";
        let (transport, script) = ScriptedTransport::new();
        script.push_inbound(SPACED);
        let mut link = EaselLink::discover(Box::new(transport), TIMEOUT)
            .await
            .unwrap();

        script.push_inbound(SPACED);
        script.queue_reply(&reply([7; 8]));
        assert_eq!(link.exchange(&[0; 8]).await.unwrap(), vec![7; 8]);
    }

    #[tokio::test]
    async fn exchange_skips_stale_crlf_announcements_after_crlf_discovery() {
        const SPACED_CRLF: &[u8] = b"Palette v0.4.4 8 12 8 12\r\n";
        let (transport, script) = ScriptedTransport::new();
        script.push_inbound(SPACED_CRLF);
        let mut link = EaselLink::discover(Box::new(transport), TIMEOUT)
            .await
            .unwrap();

        script.push_inbound(SPACED_CRLF);
        script.push_inbound(SPACED_CRLF);
        script.queue_reply(&reply([3; 8]));
        assert_eq!(link.exchange(&[0; 8]).await.unwrap(), vec![3; 8]);

        script.queue_reply(&reply([4; 8]));
        assert_eq!(link.exchange(&[0; 8]).await.unwrap(), vec![4; 8]);
    }

    #[tokio::test]
    async fn exchange_reports_missing_and_partial_replies() {
        let (mut link, script) = discovered().await;
        link.set_read_timeout(Duration::from_millis(20));
        assert!(matches!(link.exchange(&[0; 8]).await, Err(Error::Timeout)));

        script.queue_reply(&[0xAB; 5]);
        assert!(matches!(
            link.exchange(&[0; 8]).await,
            Err(Error::IncompletePacket {
                expected: 12,
                received: 5
            })
        ));

        // Partial bytes were dropped; the next reply decodes cleanly.
        script.queue_reply(&reply([9; 8]));
        assert_eq!(link.exchange(&[0; 8]).await.unwrap(), vec![9; 8]);
    }

    #[tokio::test]
    async fn exchange_rejects_wrong_channel_count() {
        let (mut link, script) = discovered().await;
        assert!(matches!(
            link.exchange(&[0; 3]).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(script.sent_data().is_empty());
    }

    #[tokio::test]
    async fn device_and_host_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let outputs = RecordingOutputStage::new();
        let cancel = CancellationToken::new();

        let device = {
            let outputs = outputs.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let (stream, peer) = listener.accept().await.unwrap();
                let transport = TcpTransport::from_stream(stream, peer.to_string());
                let mut session = LinkSessionBuilder::new(identity::palette())
                    .pulse_delay(Duration::from_millis(2))
                    .output_stage(outputs)
                    .build_with_transport(Box::new(transport))
                    .await
                    .unwrap();
                session.run(cancel).await.unwrap();
                session.sequence()
            })
        };

        let transport = TcpTransport::connect(&addr).await.unwrap();
        let mut link = EaselLink::discover(Box::new(transport), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(link.identity(), &identity::palette());

        let mut sent = Vec::new();
        for n in 0..20u16 {
            let values: Vec<Sample> = (0..8).map(|ch| (n * 200 + ch) % 4096).collect();
            let inputs = link.exchange(&values).await.unwrap();
            assert_eq!(inputs.len(), 8);
            assert!(inputs.iter().all(|&v| v == inputs[0] && v <= 4095));
            sent.push(values);
        }

        cancel.cancel();
        assert_eq!(device.await.unwrap(), 20);
        assert_eq!(outputs.applied(), sent);
        link.close().await.unwrap();
    }

    #[test]
    fn take_line_strips_terminators() {
        let mut pending = BytesMut::from(&b"one\r\ntwo\nthr"[..]);
        assert_eq!(&take_line(&mut pending).unwrap()[..], b"one");
        assert_eq!(&take_line(&mut pending).unwrap()[..], b"two");
        assert!(take_line(&mut pending).is_none());
        assert_eq!(&pending[..], b"thr");
    }
}
