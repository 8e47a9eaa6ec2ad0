// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! VLP-16 data packet decoding.
//!
//! # Packet Structure
//!
//! The transport strips the 42 byte network header; the remaining 1206 byte
//! body is laid out as:
//!
//! ```text
//! ┌──────────┬──────────┬─────┬───────────┬──────────────┬─────────┬────────────┐
//! │ block 0  │ block 1  │ ... │ block 11  │ timestamp:u32│ mode:u8 │ product:u8 │
//! │ 100B     │ 100B     │     │ 100B      │ 4B           │ 1B      │ 1B         │
//! └──────────┴──────────┴─────┴───────────┴──────────────┴─────────┴────────────┘
//!
//! block:   [flag:u16][azimuth:u16][channel; 32]
//! channel: [distance:u16][reflectivity:u8]
//! ```
//!
//! All fields are little-endian. Block and channel counts come from
//! [`ModelParameters`] so offsets are computed at runtime.

use crate::{
    azimuth::azimuth_from_raw,
    lidar::Error,
    model::{ModelParameters, RangeGate},
};
use std::fmt;
use tracing::warn;

/// Expected value of every block flag.
pub const BLOCK_FLAG: u16 = 0xEEFF;

/// Size of one channel record in bytes.
pub const CHANNEL_SIZE: usize = 3;

/// Size of the block flag and azimuth fields.
const BLOCK_HEADER_SIZE: usize = 4;

/// Size of the timestamp, return mode and product id trailer.
pub const TRAILER_SIZE: usize = 6;

/// Return mode reported in the packet trailer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReturnMode {
    #[default]
    Strongest,
    Last,
    Dual,
    Unknown(u8),
}

impl From<u8> for ReturnMode {
    fn from(value: u8) -> Self {
        match value {
            0x37 => ReturnMode::Strongest,
            0x38 => ReturnMode::Last,
            0x39 => ReturnMode::Dual,
            val => ReturnMode::Unknown(val),
        }
    }
}

impl fmt::Display for ReturnMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReturnMode::Strongest => write!(f, "strongest"),
            ReturnMode::Last => write!(f, "last"),
            ReturnMode::Dual => write!(f, "dual"),
            ReturnMode::Unknown(val) => write!(f, "unknown return mode: 0x{:02x}", val),
        }
    }
}

/// Factory bytes following the data blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Trailer {
    /// Microseconds past the top of the hour for the first firing
    pub timestamp_us: u32,
    pub return_mode: ReturnMode,
    pub product_id: u8,
}

/// One laser firing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Channel {
    /// Distance in device units
    pub distance: u16,
    pub reflectivity: u8,
}

impl Channel {
    /// Apply the range gate, replacing out of range readings with `(0, 0)`.
    #[inline]
    pub fn gated(&self, gate: &RangeGate) -> (u16, u8) {
        if gate.contains(self.distance) {
            (self.distance, self.reflectivity)
        } else {
            (0, 0)
        }
    }
}

/// Bounds-checked view over one data block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockSlice<'a> {
    slice: &'a [u8],
    channels: usize,
}

impl<'a> BlockSlice<'a> {
    /// Size in bytes of a block holding `channels` channels.
    pub const fn size(channels: usize) -> usize {
        BLOCK_HEADER_SIZE + CHANNEL_SIZE * channels
    }

    pub fn from_slice(slice: &'a [u8], channels: usize) -> Result<BlockSlice<'a>, Error> {
        let size = Self::size(channels);
        if slice.len() < size {
            return Err(Error::UnexpectedEnd(slice.len()));
        }

        Ok(BlockSlice {
            slice: &slice[..size],
            channels,
        })
    }

    pub fn block_flag(&self) -> u16 {
        u16::from_le_bytes([self.slice[0], self.slice[1]])
    }

    pub fn has_valid_flag(&self) -> bool {
        self.block_flag() == BLOCK_FLAG
    }

    /// Azimuth in hundredths of a degree.
    pub fn azimuth_raw(&self) -> u16 {
        u16::from_le_bytes([self.slice[2], self.slice[3]])
    }

    /// Azimuth in radians, negated to the counter-clockwise convention.
    pub fn azimuth(&self) -> f64 {
        azimuth_from_raw(self.azimuth_raw())
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// Channel `index`; panics if `index` is out of range.
    pub fn channel(&self, index: usize) -> Channel {
        assert!(index < self.channels);
        let offset = BLOCK_HEADER_SIZE + index * CHANNEL_SIZE;
        Channel {
            distance: u16::from_le_bytes([self.slice[offset], self.slice[offset + 1]]),
            reflectivity: self.slice[offset + 2],
        }
    }

    pub fn channels(self) -> impl Iterator<Item = Channel> + 'a {
        let slice: &'a [u8] = self.slice;
        slice[BLOCK_HEADER_SIZE..]
            .chunks_exact(CHANNEL_SIZE)
            .map(|c| Channel {
                distance: u16::from_le_bytes([c[0], c[1]]),
                reflectivity: c[2],
            })
    }
}

/// Decode every channel of `block` into gated `(range, intensity)` pairs.
///
/// A block flag other than [`BLOCK_FLAG`] is reported but the block is still
/// decoded with its declared layout.
pub fn decode_block<'a>(
    block: BlockSlice<'a>,
    gate: RangeGate,
) -> impl Iterator<Item = (u16, u8)> + 'a {
    if !block.has_valid_flag() {
        warn!(
            "invalid block flag 0x{:04x} at azimuth {}",
            block.block_flag(),
            block.azimuth_raw()
        );
    }

    block.channels().map(move |channel| channel.gated(&gate))
}

/// Grid cell `(slice, beam)` of the ray at global `index`.
///
/// Consecutive rays cycle through the beams, so the two firings sharing one
/// block azimuth land in adjacent slices of the same beam.
#[inline]
pub fn ray_cell(index: usize, vertical_beams: usize) -> (usize, usize) {
    (index / vertical_beams, index % vertical_beams)
}

/// Bounds-checked view over one packet body.
#[derive(Copy, Clone, Debug)]
pub struct PacketSlice<'a> {
    slice: &'a [u8],
    block_size: usize,
    blocks: usize,
    channels: usize,
}

impl<'a> PacketSlice<'a> {
    pub fn from_slice(slice: &'a [u8], params: &ModelParameters) -> Result<PacketSlice<'a>, Error> {
        if slice.len() != params.packet_size_without_header {
            return Err(Error::InvalidPacket(format!(
                "packet body is {} bytes, expected {}",
                slice.len(),
                params.packet_size_without_header
            )));
        }

        if params.blocks_per_packet * params.block_size > slice.len() {
            return Err(Error::UnexpectedEnd(slice.len()));
        }

        Ok(PacketSlice {
            slice,
            block_size: params.block_size,
            blocks: params.blocks_per_packet,
            channels: params.channels_per_block,
        })
    }

    pub fn block_count(&self) -> usize {
        self.blocks
    }

    pub fn block(&self, index: usize) -> Result<BlockSlice<'a>, Error> {
        let start = index * self.block_size;
        let end = start + self.block_size;
        if index >= self.blocks || end > self.slice.len() {
            return Err(Error::UnexpectedEnd(self.slice.len()));
        }
        let slice: &'a [u8] = self.slice;
        BlockSlice::from_slice(&slice[start..end], self.channels)
    }

    pub fn blocks(self) -> impl Iterator<Item = BlockSlice<'a>> + 'a {
        let channels = self.channels;
        let slice: &'a [u8] = self.slice;
        slice[..self.blocks * self.block_size]
            .chunks_exact(self.block_size)
            .filter_map(move |block| BlockSlice::from_slice(block, channels).ok())
    }

    /// Trailer following the data blocks, if the body has room for one.
    pub fn trailer(&self) -> Option<Trailer> {
        let start = self.blocks * self.block_size;
        let t = self.slice.get(start..start + TRAILER_SIZE)?;
        Some(Trailer {
            timestamp_us: u32::from_le_bytes([t[0], t[1], t[2], t[3]]),
            return_mode: ReturnMode::from(t[4]),
            product_id: t[5],
        })
    }
}
