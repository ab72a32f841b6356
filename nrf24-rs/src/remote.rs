//! Remote sensor nodes.
//!
//! Each node samples four analog channels and broadcasts them once a second as a
//! 16-byte packet of four little-endian `f32` values, on its own pipe address.

use crate::{MAX_PAYLOAD, Nrf24, Nrf24Result};
use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiDevice};

/// Pipe address of the pH node.
pub const PH_NODE_ADDRESS: [u8; 5] = *b"pHsns";
/// Pipe address of the TDS node.
pub const TDS_NODE_ADDRESS: [u8; 5] = *b"TDSsn";
/// RF channel shared by the nodes.
pub const REMOTE_CHANNEL: u8 = 76;
/// Value returned for a channel index that does not exist.
pub const REMOTE_DISCONNECTED: f32 = -999.0;
/// Number of analog channels per node.
pub const REMOTE_CHANNELS: usize = 4;

/// Wire format of a node broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RemotePacket {
    /// Channel values, A0 first.
    pub values: [f32; REMOTE_CHANNELS],
}

impl RemotePacket {
    /// Encoded size in bytes.
    pub const SIZE: usize = 4 * REMOTE_CHANNELS;

    /// Encode the packet as it is sent over the air.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0; Self::SIZE];
        for (chunk, value) in out.chunks_exact_mut(4).zip(self.values.iter()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Decode a received payload. Payloads shorter than [`SIZE`](RemotePacket::SIZE)
    /// are rejected; trailing bytes beyond it are ignored.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let payload = payload.get(..Self::SIZE)?;
        let mut values = [0.0; REMOTE_CHANNELS];
        for (value, chunk) in values.iter_mut().zip(payload.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Some(Self { values })
    }
}

/// Latest values received from one remote node.
#[derive(Debug, Clone)]
pub struct RemoteNode {
    pipe: u8,
    values: [f32; REMOTE_CHANNELS],
}

impl RemoteNode {
    /// Node listening on `pipe`. Values start at zero.
    pub fn new(pipe: u8) -> Self {
        Self {
            pipe,
            values: [0.0; REMOTE_CHANNELS],
        }
    }

    /// Pipe this node's packets arrive on.
    pub fn pipe(&self) -> u8 {
        self.pipe
    }

    /// Consume the packet at the head of the RX FIFO if it belongs to this node.
    ///
    /// # Returns
    /// `true` if a well-formed packet updated the values. Nothing pending, a packet for
    /// another pipe (left in the FIFO) and a short payload (consumed) all return `false`.
    pub fn read<SPI: SpiDevice, CE: OutputPin, D: DelayNs>(
        &mut self,
        radio: &mut Nrf24<SPI, CE, D>,
    ) -> Nrf24Result<bool, SPI::Error, CE::Error> {
        if !radio.available()? {
            return Ok(false);
        }
        if radio.rx_pipe()? != Some(self.pipe) {
            return Ok(false);
        }
        let mut buf = [0; MAX_PAYLOAD];
        let len = radio.read(&mut buf)?;
        match RemotePacket::decode(&buf[..len]) {
            Some(packet) => {
                self.values = packet.values;
                log::debug!("remote node on pipe {}: {:?}", self.pipe, self.values);
                Ok(true)
            }
            None => {
                log::warn!("remote node on pipe {}: short payload ({} bytes)", self.pipe, len);
                Ok(false)
            }
        }
    }

    /// Value of channel `index`, or [`REMOTE_DISCONNECTED`] if out of range.
    pub fn value(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(REMOTE_DISCONNECTED)
    }

    /// All channel values.
    pub fn values(&self) -> &[f32; REMOTE_CHANNELS] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::tests::radio;

    fn packet(values: [f32; 4]) -> [u8; RemotePacket::SIZE] {
        RemotePacket { values }.encode()
    }

    #[test]
    fn packet_layout_is_little_endian_f32() {
        let bytes = packet([7.0, -1.5, 0.0, 1023.0]);
        assert_eq!(&bytes[..4], &7.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0xc0, 0xbf]);
        assert_eq!(
            RemotePacket::decode(&bytes).map(|p| p.values),
            Some([7.0, -1.5, 0.0, 1023.0])
        );
        assert_eq!(RemotePacket::decode(&bytes[..15]), None);
    }

    #[test]
    fn node_reads_its_own_pipe_only() {
        let mut radio = radio();
        radio.start_listening().unwrap();
        let mut ph = RemoteNode::new(0);
        let mut tds = RemoteNode::new(1);

        assert_eq!(ph.read(&mut radio), Ok(false));

        radio.spi.deliver(1, &packet([640.0, 1.0, 2.0, 3.0]));
        assert_eq!(ph.read(&mut radio), Ok(false));
        assert_eq!(ph.values(), &[0.0; 4]);
        assert_eq!(tds.read(&mut radio), Ok(true));
        assert_eq!(tds.value(0), 640.0);

        radio.spi.deliver(0, &packet([6.5, 0.0, 0.0, 0.0]));
        assert_eq!(tds.read(&mut radio), Ok(false));
        assert_eq!(ph.read(&mut radio), Ok(true));
        assert_eq!(ph.value(0), 6.5);
        assert!(radio.spi.rx_fifo.is_empty());
    }

    #[test]
    fn short_payload_is_consumed_without_update() {
        let mut radio = radio();
        let mut ph = RemoteNode::new(0);
        radio.spi.deliver(0, &packet([6.5, 0.0, 0.0, 0.0]));
        assert_eq!(ph.read(&mut radio), Ok(true));

        radio.spi.deliver(0, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(ph.read(&mut radio), Ok(false));
        assert!(radio.spi.rx_fifo.is_empty());
        assert_eq!(ph.value(0), 6.5);
    }

    #[test]
    fn out_of_range_channel() {
        let node = RemoteNode::new(0);
        assert_eq!(node.value(3), 0.0);
        assert_eq!(node.value(4), REMOTE_DISCONNECTED);
    }
}
