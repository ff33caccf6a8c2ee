//! Device identity and the discovery announcement.
//!
//! While no host is talking to it, the Palette repeatedly announces itself
//! with a single text line:
//!
//! ```text
//! <ModelName><FirmwareVersion> <OutChannels> <OutBits> <InChannels> <InBits>\n
//! ```
//!
//! The model name and firmware version are concatenated with no separator,
//! e.g. `Palettev0.4.4 8 12 8 12`. The parser also accepts the older form
//! with a space between them.

use std::fmt;

use crate::error::{Error, Result};
use crate::types::{BitDepth, ChannelLayout};

/// Model name reported by the stock firmware.
pub const MODEL_NAME: &str = "Palette";

/// Firmware version reported by the stock firmware.
pub const FIRMWARE_VERSION: &str = "v0.4.4";

/// The fixed configuration a Palette build reports during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Model name, e.g. `"Palette"`.
    pub model_name: String,
    /// Firmware version, e.g. `"v0.4.4"`.
    pub firmware_version: String,
    /// Layout of the inbound packet (Easel → Palette, DAC values).
    pub output: ChannelLayout,
    /// Layout of the outbound packet (Palette → Easel, ADC values).
    pub input: ChannelLayout,
}

/// The stock Palette: 8 × 12-bit outputs, 8 × 12-bit inputs.
pub fn palette() -> DeviceIdentity {
    DeviceIdentity::new(
        MODEL_NAME,
        FIRMWARE_VERSION,
        ChannelLayout::EIGHT_BY_TWELVE,
        ChannelLayout::EIGHT_BY_TWELVE,
    )
}

impl DeviceIdentity {
    pub fn new(
        model_name: &str,
        firmware_version: &str,
        output: ChannelLayout,
        input: ChannelLayout,
    ) -> Self {
        Self {
            model_name: model_name.to_string(),
            firmware_version: firmware_version.to_string(),
            output,
            input,
        }
    }

    /// The announcement line, without the trailing newline.
    pub fn announcement(&self) -> String {
        format!(
            "{}{} {} {} {} {}",
            self.model_name,
            self.firmware_version,
            self.output.channels(),
            self.output.depth().bits(),
            self.input.channels(),
            self.input.depth().bits(),
        )
    }

    /// Parse one announcement line (trailing `\r\n` is ignored).
    pub fn parse_announcement(line: &str) -> Result<Self> {
        let tokens: Vec<&str> = line.trim_end_matches(['\r', '\n']).split_whitespace().collect();

        let (model_name, firmware_version, numbers) = match tokens.as_slice() {
            [name_version, rest @ ..] if rest.len() == 4 => {
                let (m, v) = split_model_version(name_version);
                (m, v, rest)
            }
            [model, version, rest @ ..] if rest.len() == 4 => (*model, *version, rest),
            _ => {
                return Err(Error::Protocol(format!(
                    "announcement has {} fields: {line:?}",
                    tokens.len()
                )));
            }
        };

        let output = parse_layout(numbers[0], numbers[1])?;
        let input = parse_layout(numbers[2], numbers[3])?;

        Ok(Self::new(model_name, firmware_version, output, input))
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.announcement())
    }
}

/// Split `Palettev0.4.4` at the last `v` that is followed by a digit.
fn split_model_version(token: &str) -> (&str, &str) {
    let bytes = token.as_bytes();
    let split = (1..bytes.len().saturating_sub(1))
        .rev()
        .find(|&i| bytes[i] == b'v' && bytes[i + 1].is_ascii_digit());
    match split {
        Some(i) => token.split_at(i),
        None => (token, ""),
    }
}

fn parse_layout(channels: &str, bits: &str) -> Result<ChannelLayout> {
    let channels: usize = channels
        .parse()
        .map_err(|_| Error::Protocol(format!("invalid channel count {channels:?}")))?;
    let bits: u8 = bits
        .parse()
        .map_err(|_| Error::Protocol(format!("invalid bit depth {bits:?}")))?;
    let depth = BitDepth::new(bits).map_err(|e| Error::Protocol(e.to_string()))?;
    ChannelLayout::new(channels, depth).map_err(|e| Error::Protocol(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_announcement() {
        assert_eq!(palette().announcement(), "Palettev0.4.4 8 12 8 12");
    }

    #[test]
    fn display_matches_announcement() {
        let id = palette();
        assert_eq!(id.to_string(), id.announcement());
    }

    #[test]
    fn parse_concatenated_form() {
        let id = DeviceIdentity::parse_announcement("Palettev0.4.4 8 12 8 12\n").unwrap();
        assert_eq!(id, palette());
    }

    #[test]
    fn parse_space_separated_form() {
        let id = DeviceIdentity::parse_announcement("Palette v0.4.4 8 12 8 12\r\n").unwrap();
        assert_eq!(id.model_name, "Palette");
        assert_eq!(id.firmware_version, "v0.4.4");
        assert_eq!(id.output.packet_len(), 12);
    }

    #[test]
    fn parse_asymmetric_layout() {
        let id = DeviceIdentity::parse_announcement("Palettev1.0 4 12 2 16").unwrap();
        assert_eq!(id.output.channels(), 4);
        assert_eq!(id.input.channels(), 2);
        assert_eq!(id.input.depth().bits(), 16);
        assert_eq!(id.input.packet_len(), 4);
    }

    #[test]
    fn parse_without_version() {
        let id = DeviceIdentity::parse_announcement("Prototype 2 12 2 12").unwrap();
        assert_eq!(id.model_name, "Prototype");
        assert_eq!(id.firmware_version, "");
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        assert!(matches!(
            DeviceIdentity::parse_announcement("Palettev0.4.4 8 12"),
            Err(Error::Protocol(_))
        ));
        assert!(DeviceIdentity::parse_announcement("").is_err());
    }

    #[test]
    fn parse_rejects_bad_numbers() {
        assert!(DeviceIdentity::parse_announcement("Palettev0.4.4 eight 12 8 12").is_err());
        assert!(DeviceIdentity::parse_announcement("Palettev0.4.4 8 40 8 12").is_err());
        assert!(DeviceIdentity::parse_announcement("Palettev0.4.4 7 12 8 12").is_err());
    }

    #[test]
    fn round_trip_through_announcement() {
        let id = palette();
        let parsed = DeviceIdentity::parse_announcement(&id.announcement()).unwrap();
        assert_eq!(parsed, id);
    }
}
