// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Model-specific geometry tables.
//!
//! Every supported sensor shares the VLP-16 wire layout and differs only in
//! the values below. Parameters are resolved once when the driver is built
//! and never change afterwards.

use crate::lidar::Error;
use clap::ValueEnum;
use std::{fmt, str::FromStr};

/// Distance resolution of one device unit in meters.
///
/// The firmware documents 2mm; the value is kept at single precision so the
/// meter-to-unit conversion of the range gate truncates the same way the
/// device tooling does (0.2m becomes 99 units, not 100).
pub const DISTANCE_TO_METERS: f64 = 0.002_f32 as f64;

/// Maximum reflectivity value used to normalize intensities (100%).
pub const MAX_INTENSITY: f32 = 100.0;

/// Time between two firings in microseconds.
pub const DELTA_TIME_US: u16 = 50;

/// Size of the Ethernet + IPv4 + UDP headers preceding each packet body.
const PACKET_HEADER_SIZE: usize = 42;

/// Size of a full data packet on the wire.
const DATA_PACKET_SIZE: usize = 1248;

const BLOCKS_PER_PACKET: usize = 12;
const CHANNELS_PER_BLOCK: usize = 32;
const VERTICAL_BEAMS: usize = 16;

/// Vertical angles of the VLP-16 in radians, in firing order.
const VLP16_VERTICAL_ANGLES: [f64; VERTICAL_BEAMS] = [
    -0.2617993878,
    0.01745329252,
    -0.2268928028,
    0.05235987756,
    -0.1919862177,
    0.0872664626,
    -0.1570796327,
    0.1221730476,
    -0.1221730476,
    0.1570796327,
    -0.0872664626,
    0.1919862177,
    -0.05235987756,
    0.2268928028,
    -0.01745329252,
    0.2617993878,
];

/// Vertical angles of the Puck Hi-Res in radians (-10° to +10°).
const VLP16_HIRES_VERTICAL_ANGLES: [f64; VERTICAL_BEAMS] = [
    -0.1745329252,
    0.01169370599,
    -0.15132004615,
    0.03490658504,
    -0.12793263417,
    0.05811946409,
    -0.10471975512,
    0.08150687607,
    -0.08150687607,
    0.10471975512,
    -0.05811946409,
    0.12793263417,
    -0.03490658504,
    0.15132004615,
    -0.01169370599,
    0.1745329252,
];

/// Supported Velodyne sensor models
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ModelType {
    /// VLP-16 (Puck), ±15° vertical field of view
    #[default]
    #[value(name = "vlp16")]
    Vlp16,
    /// VLP-16 Hi-Res (Puck Hi-Res), ±10° vertical field of view
    #[value(name = "vlp16-hires")]
    Vlp16HiRes,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelType::Vlp16 => write!(f, "VLP16"),
            ModelType::Vlp16HiRes => write!(f, "VLP16_HIRES"),
        }
    }
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "VLP16" => Ok(ModelType::Vlp16),
            "VLP16_HIRES" | "VLP16_HI_RES" => Ok(ModelType::Vlp16HiRes),
            _ => Err(Error::UnknownModel(s.to_string())),
        }
    }
}

/// Range thresholds expressed in device distance units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeGate {
    pub min_units: u16,
    pub max_units: u16,
}

impl RangeGate {
    /// Returns true if `distance` lies inside the closed interval.
    #[inline]
    pub fn contains(&self, distance: u16) -> bool {
        distance >= self.min_units && distance <= self.max_units
    }
}

/// Geometry and timing table for one sensor model
#[derive(Clone, Debug, PartialEq)]
pub struct ModelParameters {
    /// Minimum valid range in meters
    pub minimum_range: f64,
    /// Maximum valid range in meters
    pub maximum_range: f64,
    /// Size of the network header stripped by the transport
    pub packet_header_size: usize,
    /// Size of a packet body in bytes
    pub packet_size_without_header: usize,
    /// Size of one data block in bytes
    pub block_size: usize,
    pub channels_per_block: usize,
    pub blocks_per_packet: usize,
    pub vertical_beam_count: usize,
    /// Elevation of each beam in radians, in firing order
    pub vertical_angles: Vec<f64>,
    /// Product id reported in the packet trailer
    pub product_id: u8,
}

impl ModelParameters {
    /// Look up the parameter table for `model`.
    pub fn resolve(model: ModelType) -> Self {
        let (vertical_angles, product_id) = match model {
            ModelType::Vlp16 => (&VLP16_VERTICAL_ANGLES, 0x22),
            ModelType::Vlp16HiRes => (&VLP16_HIRES_VERTICAL_ANGLES, 0x24),
        };

        Self {
            minimum_range: 0.2,
            maximum_range: 100.0,
            packet_header_size: PACKET_HEADER_SIZE,
            packet_size_without_header: DATA_PACKET_SIZE - PACKET_HEADER_SIZE,
            block_size: 2 + 2 + 3 * CHANNELS_PER_BLOCK,
            channels_per_block: CHANNELS_PER_BLOCK,
            blocks_per_packet: BLOCKS_PER_PACKET,
            vertical_beam_count: VERTICAL_BEAMS,
            vertical_angles: vertical_angles.to_vec(),
            product_id,
        }
    }

    /// Range thresholds converted to device units.
    pub fn range_gate(&self) -> RangeGate {
        RangeGate {
            min_units: (self.minimum_range / DISTANCE_TO_METERS) as u16,
            max_units: (self.maximum_range / DISTANCE_TO_METERS) as u16,
        }
    }

    /// Number of rays collected from `packets_per_scan` packets.
    pub fn rays_per_scan(&self, packets_per_scan: usize) -> usize {
        packets_per_scan * self.blocks_per_packet * self.channels_per_block
    }

    /// Number of grid slices built from `packets_per_scan` packets.
    pub fn slices_per_scan(&self, packets_per_scan: usize) -> usize {
        self.rays_per_scan(packets_per_scan) / self.vertical_beam_count
    }

    /// Check that a scan of `packets_per_scan` packets can be assembled.
    pub fn validate(&self, packets_per_scan: usize) -> Result<(), Error> {
        if packets_per_scan == 0 {
            return Err(Error::Geometry(
                "at least one packet per scan is required".to_string(),
            ));
        }

        if self.vertical_beam_count == 0 {
            return Err(Error::Geometry(
                "number of vertical beams needs to be positive".to_string(),
            ));
        }

        if self.vertical_angles.len() != self.vertical_beam_count {
            return Err(Error::Geometry(format!(
                "{} vertical angles for {} beams",
                self.vertical_angles.len(),
                self.vertical_beam_count
            )));
        }

        // One azimuth is reported per block and covers two firings of every beam.
        if self.channels_per_block != 2 * self.vertical_beam_count {
            return Err(Error::Geometry(format!(
                "expecting two firings per block: {} channels for {} beams",
                self.channels_per_block, self.vertical_beam_count
            )));
        }

        let rays = self.rays_per_scan(packets_per_scan);
        if rays % self.vertical_beam_count != 0 {
            return Err(Error::Geometry(format!(
                "number of rays ({}) is not divisible by number of vertical beams ({})",
                rays, self.vertical_beam_count
            )));
        }

        if self.block_size != 4 + 3 * self.channels_per_block {
            return Err(Error::Geometry(format!(
                "block size {} does not hold {} channels",
                self.block_size, self.channels_per_block
            )));
        }

        if self.blocks_per_packet * self.block_size > self.packet_size_without_header {
            return Err(Error::Geometry(format!(
                "{} blocks of {} bytes exceed the {} byte packet",
                self.blocks_per_packet, self.block_size, self.packet_size_without_header
            )));
        }

        Ok(())
    }
}
