// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst Velodyne Publisher Library
//!
//! Decodes Velodyne VLP-16 data packets and accumulates them into organized
//! range scans, one grid of `slices x beams` ranges and intensities per
//! accumulation cycle.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │  PacketSource   │ ──► │  ScanAccumulator │ ──► │  RangeScan      │
//! │  (UDP/pcap/test)│     │  (K+1 packets)   │     │  (slices×beams) │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//!                                  │                        │
//!                                  ▼                        ▼
//!                     ┌──────────────────────┐  ┌──────────────────────────┐
//!                     │  packet::decode_block│  │  formats::format_range_* │
//!                     │  azimuth::interpolate│  │  (PointCloud2 packing)   │
//!                     └──────────────────────┘  └──────────────────────────┘
//! ```
//!
//! The accumulator owns its packet buffers and the carried lookahead packet:
//! 1. Client builds it: `ScanAccumulator::new(ModelType::Vlp16, 5)`
//! 2. Client attaches a transport: `acc.start(source)`
//! 3. Each `acc.run_cycle().await` reads one cycle of packets
//! 4. The first cycle returns `Ok(None)`, every later one `Ok(Some(scan))`
//! 5. `acc.stop()` releases the transport
//!
//! # Modules
//!
//! - [`accumulator`]: Scan accumulation state machine and [`RangeScan`]
//! - [`azimuth`]: Azimuth conversion and interpolation
//! - [`formats`]: PointCloud2 packing of range scans
//! - [`lidar`]: Error handling and host timestamps
//! - [`model`]: Sensor model parameter tables
//! - [`packet`]: Zero-copy packet and block views
//! - [`packet_source`]: Packet source abstraction for live and test input
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_velodynepub::{ModelType, ScanAccumulator, UdpSource};
//! use std::time::Duration;
//!
//! let source = UdpSource::bind("0.0.0.0:2368", None, Duration::from_secs(1)).await?;
//! let mut acc = ScanAccumulator::new(ModelType::Vlp16, 5)?;
//! acc.start(source)?;
//!
//! loop {
//!     if let Some(scan) = acc.run_cycle().await? {
//!         let range = scan.range_meters(0, 0);
//!         let azimuth = scan.theta[0];
//!     }
//! }
//! ```

pub mod accumulator;
pub mod azimuth;
pub mod formats;
pub mod lidar;
pub mod model;
pub mod packet;
pub mod packet_source;
#[cfg(feature = "pcap")]
pub mod pcap_source;

// Re-exports for convenience
pub use accumulator::{AccumulatorState, PACKETS_PER_SCAN, RangeScan, ScanAccumulator};
pub use formats::PointFieldType;
pub use lidar::Error;
pub use model::{ModelParameters, ModelType};
pub use packet::ReturnMode;
pub use packet_source::{LoopingTestSource, PacketSource, TestSource, UdpSource};
#[cfg(feature = "pcap")]
pub use pcap_source::PcapSource;
