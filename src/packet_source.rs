// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet source abstraction for the Velodyne driver.
//!
//! A [`PacketSource`] delivers one packet body per `recv` call:
//!
//! - **Live operation**: [`UdpSource`] reading the sensor's data port
//! - **Testing**: [`TestSource`] replaying scripted packets
//! - **Pcap replay**: `PcapSource` (with the `pcap` feature)
//!
//! A read that times out returns `Ok(0)`. The caller compares the returned
//! length against the expected packet size; sources never retry.

use crate::lidar::Error;
use std::{future::Future, net::IpAddr, pin::Pin, time::Duration};
use tracing::trace;

/// Trait for packet sources.
///
/// Dropping a source releases the underlying transport.
pub trait PacketSource: Send {
    /// Receive the next packet into the provided buffer.
    ///
    /// # Returns
    /// - `Ok(len)` - Number of bytes received, `0` on timeout
    /// - `Err` - I/O or source error
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>>;

    /// Check if more packets are available.
    ///
    /// For infinite sources (like UDP), always returns `true`.
    /// For finite sources (test, pcap), returns `false` when exhausted.
    fn has_more(&self) -> bool;
}

/// UDP socket packet source for live sensor operation.
pub struct UdpSource {
    socket: tokio::net::UdpSocket,
    device: Option<IpAddr>,
    timeout: Duration,
}

impl UdpSource {
    /// Create a new UDP source from an existing socket.
    ///
    /// Datagrams not sent by `device` are skipped. `None` accepts any sender.
    pub fn new(socket: tokio::net::UdpSocket, device: Option<IpAddr>, timeout: Duration) -> Self {
        Self {
            socket,
            device,
            timeout,
        }
    }

    /// Bind to an address and create a UDP source.
    pub async fn bind(addr: &str, device: Option<IpAddr>, timeout: Duration) -> Result<Self, Error> {
        let socket = tokio::net::UdpSocket::bind(addr).await?;
        Ok(Self::new(socket, device, timeout))
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }
}

impl PacketSource for UdpSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            let deadline = tokio::time::Instant::now() + self.timeout;
            loop {
                let (len, src) =
                    match tokio::time::timeout_at(deadline, self.socket.recv_from(buf)).await {
                        Ok(res) => res?,
                        Err(_) => return Ok(0),
                    };

                match self.device {
                    Some(device) if device != src.ip() => {
                        trace!("ignoring {} byte datagram from {}", len, src);
                    }
                    _ => return Ok(len),
                }
            }
        })
    }

    fn has_more(&self) -> bool {
        true // UDP sources are infinite
    }
}

/// Test packet source for unit testing.
///
/// Provides a sequence of pre-defined packets for testing driver logic
/// without hardware. An empty packet behaves like a read timeout.
pub struct TestSource {
    packets: Vec<Vec<u8>>,
    index: usize,
}

impl TestSource {
    /// Create a new test source with the given packets.
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        Self { packets, index: 0 }
    }

    /// Create an empty test source.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Reset the source to the beginning.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Get the number of packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Get the current index.
    pub fn current_index(&self) -> usize {
        self.index
    }
}

impl PacketSource for TestSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            if self.index >= self.packets.len() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "no more packets",
                )));
            }

            let packet = &self.packets[self.index];
            let len = packet.len().min(buf.len());
            buf[..len].copy_from_slice(&packet[..len]);
            self.index += 1;
            Ok(len)
        })
    }

    fn has_more(&self) -> bool {
        self.index < self.packets.len()
    }
}

/// Looping test source that repeats packets indefinitely.
///
/// Useful for performance testing or simulating continuous sensor data.
pub struct LoopingTestSource {
    packets: Vec<Vec<u8>>,
    index: usize,
}

impl LoopingTestSource {
    /// Create a new looping test source.
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        Self { packets, index: 0 }
    }

    /// Get the current loop index (wraps around).
    pub fn current_index(&self) -> usize {
        self.index
    }
}

impl PacketSource for LoopingTestSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>> {
        Box::pin(async move {
            if self.packets.is_empty() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "no packets to loop",
                )));
            }

            let packet = &self.packets[self.index % self.packets.len()];
            let len = packet.len().min(buf.len());
            buf[..len].copy_from_slice(&packet[..len]);
            self.index += 1;
            Ok(len)
        })
    }

    fn has_more(&self) -> bool {
        !self.packets.is_empty()
    }
}
