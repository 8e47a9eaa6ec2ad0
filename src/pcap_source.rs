// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! PCAP replay of recorded sensor traffic.
//!
//! [`PcapSource`] extracts the UDP payloads of a capture, the same bytes
//! the sensor's data port delivers after the 42 byte Ethernet/IPv4/UDP
//! header is stripped. Velodyne captures usually interleave 1206 byte data
//! packets on port 2368 with 512 byte position packets on port 8308; filter
//! on the data port to keep the former.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_velodynepub::{PcapSource, ScanAccumulator, ModelType};
//!
//! let source = PcapSource::from_file("vlp16.pcap", Some(2368))?;
//! let mut acc = ScanAccumulator::new(ModelType::Vlp16, 5)?;
//! acc.start(source)?;
//! while acc.has_more() {
//!     if let Some(scan) = acc.run_cycle().await? {
//!         // use scan
//!     }
//! }
//! ```

use crate::{lidar::Error, packet_source::PacketSource};
use pcap_parser::traits::PcapReaderIterator;
use std::{future::Future, path::Path, pin::Pin};

/// Legacy PCAP/PCAPNG packet source.
pub struct PcapSource {
    payloads: Vec<Vec<u8>>,
    index: usize,
}

impl PcapSource {
    /// Load a capture from disk, keeping UDP payloads whose source or
    /// destination port matches `port` (all UDP payloads if `None`).
    pub fn from_file<P: AsRef<Path>>(path: P, port: Option<u16>) -> Result<Self, Error> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data, port)
    }

    /// Load a capture held in memory.
    pub fn from_bytes(data: &[u8], port: Option<u16>) -> Result<Self, Error> {
        let mut payloads = Vec::new();

        // PCAPNG starts with the Section Header Block magic
        if data.starts_with(&[0x0a, 0x0d, 0x0d, 0x0a]) {
            read_pcapng(data, port, &mut payloads)?;
        } else {
            read_legacy(data, port, &mut payloads)?;
        }

        Ok(Self { payloads, index: 0 })
    }

    /// Drop every payload that is not exactly `len` bytes long.
    pub fn retain_len(mut self, len: usize) -> Self {
        self.payloads.retain(|p| p.len() == len);
        self.index = 0;
        self
    }

    /// Rewind to the first packet.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.payloads.len().saturating_sub(self.index)
    }
}

fn read_legacy(data: &[u8], port: Option<u16>, payloads: &mut Vec<Vec<u8>>) -> Result<(), Error> {
    use pcap_parser::*;

    // The whole capture is in memory, size the reader buffer to match
    let mut reader = LegacyPcapReader::new(data.len().max(65536), data)
        .map_err(|e| Error::InvalidPacket(format!("PCAP header: {:?}", e)))?;

    loop {
        match reader.next() {
            Ok((offset, block)) => {
                if let PcapBlockOwned::Legacy(packet) = block {
                    payloads.extend(udp_payload(packet.data, port));
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) | Err(PcapError::Incomplete(_)) => break,
            Err(e) => return Err(Error::InvalidPacket(format!("PCAP record: {:?}", e))),
        }
    }

    Ok(())
}

fn read_pcapng(data: &[u8], port: Option<u16>, payloads: &mut Vec<Vec<u8>>) -> Result<(), Error> {
    use pcap_parser::*;

    let mut reader = PcapNGReader::new(data.len().max(65536), data)
        .map_err(|e| Error::InvalidPacket(format!("PCAPNG header: {:?}", e)))?;

    loop {
        match reader.next() {
            Ok((offset, block)) => {
                match block {
                    PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                        payloads.extend(udp_payload(epb.data, port));
                    }
                    PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                        payloads.extend(udp_payload(spb.data, port));
                    }
                    _ => {}
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) | Err(PcapError::Incomplete(_)) => break,
            Err(e) => return Err(Error::InvalidPacket(format!("PCAPNG block: {:?}", e))),
        }
    }

    Ok(())
}

/// UDP payload of an Ethernet frame, if it matches the port filter.
fn udp_payload(frame: &[u8], port: Option<u16>) -> Option<Vec<u8>> {
    use etherparse::{SlicedPacket, TransportSlice};

    let packet = SlicedPacket::from_ethernet(frame).ok()?;
    let udp = match packet.transport {
        Some(TransportSlice::Udp(udp)) => udp,
        _ => return None,
    };

    if let Some(port) = port {
        if udp.source_port() != port && udp.destination_port() != port {
            return None;
        }
    }

    let payload = udp.payload();
    (!payload.is_empty()).then(|| payload.to_vec())
}

impl PacketSource for PcapSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            let Some(payload) = self.payloads.get(self.index) else {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "end of capture",
                )));
            };

            let len = payload.len().min(buf.len());
            buf[..len].copy_from_slice(&payload[..len]);
            self.index += 1;
            Ok(len)
        })
    }

    fn has_more(&self) -> bool {
        self.index < self.payloads.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Legacy PCAP global header, little-endian, Ethernet link type
    const PCAP_HEADER: [u8; 24] = [
        0xd4, 0xc3, 0xb2, 0xa1, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xff, 0xff, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
    ];

    // Ethernet + IPv4 + UDP frame as sent by a sensor at 192.168.2.201
    fn sensor_frame(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let udp_len = 8 + payload.len();
        let ip_len = 20 + udp_len;

        let mut frame = Vec::with_capacity(14 + ip_len);
        frame.extend_from_slice(&[0xff; 6]);
        frame.extend_from_slice(&[0x60, 0x76, 0x88, 0x00, 0x00, 0x01]);
        frame.extend_from_slice(&[0x08, 0x00]);

        frame.extend_from_slice(&[0x45, 0x00]);
        frame.extend_from_slice(&(ip_len as u16).to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00, 0x40, 0x00, 0xff, 0x11, 0x00, 0x00]);
        frame.extend_from_slice(&[192, 168, 2, 201]);
        frame.extend_from_slice(&[255, 255, 255, 255]);

        frame.extend_from_slice(&src_port.to_be_bytes());
        frame.extend_from_slice(&dst_port.to_be_bytes());
        frame.extend_from_slice(&(udp_len as u16).to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00]);

        frame.extend_from_slice(payload);
        frame
    }

    fn record(frame: &[u8]) -> Vec<u8> {
        let len = (frame.len() as u32).to_le_bytes();
        let mut rec = vec![0u8; 8];
        rec.extend_from_slice(&len);
        rec.extend_from_slice(&len);
        rec.extend_from_slice(frame);
        rec
    }

    fn capture(frames: &[Vec<u8>]) -> Vec<u8> {
        let mut data = PCAP_HEADER.to_vec();
        for frame in frames {
            data.extend(record(frame));
        }
        data
    }

    #[test]
    fn test_header_is_stripped() {
        let frame = sensor_frame(2368, 2368, &[0xAB; 1206]);
        assert_eq!(frame.len(), 1248);
        let payload = udp_payload(&frame, Some(2368)).unwrap();
        assert_eq!(payload.len(), 1206);
        assert!(payload.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_port_filter() {
        let data = capture(&[
            sensor_frame(2368, 2368, &[1u8; 1206]),
            sensor_frame(8308, 8308, &[2u8; 512]),
            sensor_frame(2368, 2368, &[3u8; 1206]),
        ]);

        let source = PcapSource::from_bytes(&data, Some(2368)).unwrap();
        assert_eq!(source.len(), 2);

        let source = PcapSource::from_bytes(&data, None).unwrap();
        assert_eq!(source.len(), 3);

        let source = source.retain_len(1206);
        assert_eq!(source.len(), 2);
    }

    #[tokio::test]
    async fn test_replay() {
        let data = capture(&[
            sensor_frame(2368, 2368, &[1u8; 1206]),
            sensor_frame(2368, 2368, &[2u8; 1206]),
        ]);
        let mut source = PcapSource::from_bytes(&data, Some(2368)).unwrap();
        let mut buf = [0u8; 2048];

        assert_eq!(source.remaining(), 2);
        let len = source.recv(&mut buf).await.unwrap();
        assert_eq!(len, 1206);
        assert_eq!(buf[0], 1);
        let len = source.recv(&mut buf).await.unwrap();
        assert_eq!(len, 1206);
        assert_eq!(buf[0], 2);

        assert!(!source.has_more());
        assert!(source.recv(&mut buf).await.is_err());

        source.reset();
        assert_eq!(source.remaining(), 2);
    }

    #[test]
    fn test_empty_capture() {
        let source = PcapSource::from_bytes(&PCAP_HEADER, None).unwrap();
        assert!(source.is_empty());
        assert!(!source.has_more());
    }
}
