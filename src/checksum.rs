//! CRC16 checksum of status packets
//!
//! The receiver validates packets with the IBM/ANSI variant: reflected polynomial 0x8005
//! (0xA001 in reflected form), zero initial value and no final XOR, which is listed as
//! CRC-16/ARC in the CRC catalogue.
use crc::{Crc, CRC_16_ARC};

const CRC16_IBM: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Computes the IBM/ANSI CRC16 over the given bytes
pub fn crc16_ibm(data: &[u8]) -> u16 {
    CRC16_IBM.checksum(data)
}
