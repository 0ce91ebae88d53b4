//! # Status packet framing
//!
//! Once the tunnel is in passthrough mode, status packets are written directly to the serial
//! link:
//!
//! ````text
//! [0xAA][0xCC][device_id][sequence][payload: N bytes][crc_hi][crc_lo]
//! ````
//!
//! The CRC16 (s. [crc16_ibm]) covers everything up to the payload end, which is
//! [StatusFramer::PACKET_LENGTH] bytes. The sequence counter is owned by the [StatusFramer] and
//! advances by one (wrapping) after every successfully written packet.
use crate::checksum::crc16_ibm;
use embedded_io::Write;
use heapless::Vec;
use log::trace;

/// Fixed packet header
pub const HEADER: [u8; 2] = [0xAA, 0xCC];

/// Header, device id and sequence counter
const PREFIX_LENGTH: usize = 4;

/// Length of the CRC trailer
const TRAILER_LENGTH: usize = 2;

/// Capacity of the frame buffer, limits the payload length to 58 bytes
pub const MAX_FRAME_LENGTH: usize = 64;

/// Errors when decoding a status packet
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// Frame length does not match the packet length + trailer
    InvalidLength(usize),

    /// Frame does not start with [HEADER]
    InvalidHeader,

    /// Trailer does not match the CRC computed over the packet
    ChecksumMismatch {
        /// Checksum contained in the trailer
        received: u16,

        /// Checksum computed over the packet
        computed: u16,
    },
}

/// Builds and sends status packets carrying a payload of PAYLOAD_LENGTH bytes
pub struct StatusFramer<const PAYLOAD_LENGTH: usize> {
    /// Identity of this device
    device_id: u8,

    /// Sequence number of the next packet
    sequence: u8,
}

impl<const PAYLOAD_LENGTH: usize> StatusFramer<PAYLOAD_LENGTH> {
    /// Bytes covered by the CRC: header, device id, sequence counter and payload
    pub const PACKET_LENGTH: usize = PREFIX_LENGTH + PAYLOAD_LENGTH;

    /// Total length on the wire including the CRC trailer
    pub const FRAME_LENGTH: usize = Self::PACKET_LENGTH + TRAILER_LENGTH;

    /// Post-monomorphization check that the frame fits the buffer
    const FITS_BUFFER: () = assert!(
        Self::FRAME_LENGTH <= MAX_FRAME_LENGTH,
        "Status payload exceeds frame buffer"
    );

    pub fn new(device_id: u8, initial_sequence: u8) -> Self {
        let () = Self::FITS_BUFFER;

        Self {
            device_id,
            sequence: initial_sequence,
        }
    }

    /// Sequence number of the next packet
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    /// Encodes the packet with the current sequence number without advancing it
    pub fn encode(&self, payload: &[u8; PAYLOAD_LENGTH]) -> Vec<u8, MAX_FRAME_LENGTH> {
        let mut frame: Vec<u8, MAX_FRAME_LENGTH> = Vec::new();

        // Capacity is asserted at compile time, so the slices always fit
        let _ = frame.extend_from_slice(&HEADER);
        let _ = frame.extend_from_slice(&[self.device_id, self.sequence]);
        let _ = frame.extend_from_slice(payload);

        let crc = crc16_ibm(&frame[..Self::PACKET_LENGTH]);
        let _ = frame.extend_from_slice(&crc.to_be_bytes());
        frame
    }

    /// Writes the status packet to the link and advances the sequence counter on success
    pub fn emit_status<W: Write>(&mut self, link: &mut W, payload: &[u8; PAYLOAD_LENGTH]) -> Result<(), W::Error> {
        let frame = self.encode(payload);
        link.write_all(&frame)?;
        link.flush()?;

        trace!("Status packet #{} sent", self.sequence);
        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }
}

/// Decoded status packet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusPacket<const PAYLOAD_LENGTH: usize> {
    pub device_id: u8,
    pub sequence: u8,
    pub payload: [u8; PAYLOAD_LENGTH],
    pub crc: u16,
}

impl<const PAYLOAD_LENGTH: usize> StatusPacket<PAYLOAD_LENGTH> {
    /// Decodes a frame and validates length, header and checksum
    pub fn parse(frame: &[u8]) -> Result<Self, FrameError> {
        let packet_length = PREFIX_LENGTH + PAYLOAD_LENGTH;

        if frame.len() != packet_length + TRAILER_LENGTH {
            return Err(FrameError::InvalidLength(frame.len()));
        }

        if frame[..2] != HEADER {
            return Err(FrameError::InvalidHeader);
        }

        let received = u16::from_be_bytes([frame[packet_length], frame[packet_length + 1]]);
        let computed = crc16_ibm(&frame[..packet_length]);
        if received != computed {
            return Err(FrameError::ChecksumMismatch { received, computed });
        }

        let mut payload = [0x0; PAYLOAD_LENGTH];
        payload.copy_from_slice(&frame[PREFIX_LENGTH..packet_length]);

        Ok(Self {
            device_id: frame[2],
            sequence: frame[3],
            payload,
            crc: received,
        })
    }
}
