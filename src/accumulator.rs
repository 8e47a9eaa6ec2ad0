// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Scan accumulation across packet reads.
//!
//! One call to [`ScanAccumulator::run_cycle`] reads `K + 1` packets: `K`
//! packets whose rays form the emitted scan and one lookahead packet whose
//! block azimuths close the interpolation of the last block. The lookahead
//! packet is carried over and becomes the first packet of the next cycle.
//!
//! ```text
//!  cycle n:    [carry] [p1] [p2] ... [pK-1] [pK]
//!                 rays + azimuths ───────┘   └── azimuths only, carried
//!  cycle n+1:  [pK] [p1'] ...
//! ```
//!
//! The very first cycle has nothing to carry in: it reads all `K + 1`
//! packets from the source, keeps the last one and emits nothing.

use crate::{
    azimuth,
    lidar::{Error, timestamp},
    model::{DELTA_TIME_US, DISTANCE_TO_METERS, MAX_INTENSITY, ModelParameters, ModelType},
    packet::{PacketSlice, ReturnMode, decode_block, ray_cell},
    packet_source::PacketSource,
};
use ndarray::Array2;
use tracing::{debug, info, warn};

/// Default number of packets forming one scan.
pub const PACKETS_PER_SCAN: usize = 5;

/// Receive buffer size; larger than any datagram the sensor sends so that
/// oversized datagrams are detected rather than truncated.
const RECV_BUFFER_SIZE: usize = 2048;

/// Range and intensity grid assembled from one accumulation cycle.
///
/// `ranges` and `intensities` are indexed `[[slice, beam]]`. Cells whose
/// reading fell outside the model's range thresholds hold zero.
#[derive(Clone, Debug)]
pub struct RangeScan {
    /// Host timestamp in nanoseconds when the scan was assembled
    pub timestamp: u64,
    /// Scan sequence ID (wraps at u32::MAX)
    pub frame_id: u32,
    /// Device timestamp of the first packet, microseconds past the hour
    pub device_timestamp_us: u32,
    pub return_mode: ReturnMode,
    /// Ranges in device units
    pub ranges: Array2<u16>,
    /// Raw reflectivity
    pub intensities: Array2<u8>,
    /// Elevation of each beam in radians
    pub phi: Vec<f64>,
    /// Azimuth of each slice in radians
    pub theta: Vec<f64>,
    /// Multiplier mapping `range / 65535` to meters
    pub range_denormalizer: f32,
    /// Multiplier mapping `intensity / 255` to percent
    pub intensity_denormalizer: f32,
    /// Ranges below this many meters were zeroed
    pub invalid_range_threshold: f64,
    /// Ranges above this many meters were zeroed
    pub out_of_range_threshold: f64,
    /// Time between firings in microseconds
    pub delta_time: u16,
    /// Number of decoded blocks with an unexpected block flag
    pub invalid_blocks: usize,
}

impl RangeScan {
    pub fn slices(&self) -> usize {
        self.ranges.nrows()
    }

    pub fn beams(&self) -> usize {
        self.ranges.ncols()
    }

    /// Range of one cell in meters; zero for cells without a return.
    pub fn range_meters(&self, slice: usize, beam: usize) -> f32 {
        (self.ranges[[slice, beam]] as f64 * DISTANCE_TO_METERS) as f32
    }
}

/// Lifecycle state of a [`ScanAccumulator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccumulatorState {
    /// Built but no packet source attached yet
    Idle,
    /// Started, the next cycle only captures the carried packet
    AwaitingFirstSeed,
    /// Every cycle emits a scan
    Running,
    /// Source released, no further cycles
    Stopped,
}

enum Seed {
    Empty,
    Carried(Vec<u8>),
}

/// Velodyne scan accumulator
pub struct ScanAccumulator {
    params: ModelParameters,
    packets_per_scan: usize,
    source: Option<Box<dyn PacketSource>>,
    seed: Seed,
    stopped: bool,
    /// Packet bodies of the current cycle, `K + 1` entries
    packets: Vec<Vec<u8>>,
    scratch: Vec<u8>,
    frame_id: u32,
    product_checked: bool,
}

impl ScanAccumulator {
    /// Resolve the model parameters and check that they form a valid grid.
    pub fn new(model: ModelType, packets_per_scan: usize) -> Result<Self, Error> {
        Self::with_parameters(ModelParameters::resolve(model), packets_per_scan)
    }

    /// Build from an explicit parameter table.
    pub fn with_parameters(params: ModelParameters, packets_per_scan: usize) -> Result<Self, Error> {
        params.validate(packets_per_scan)?;

        let packets = vec![vec![0u8; params.packet_size_without_header]; packets_per_scan + 1];
        Ok(Self {
            params,
            packets_per_scan,
            source: None,
            seed: Seed::Empty,
            stopped: false,
            packets,
            scratch: vec![0u8; RECV_BUFFER_SIZE],
            frame_id: 0,
            product_checked: false,
        })
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.params
    }

    pub fn packets_per_scan(&self) -> usize {
        self.packets_per_scan
    }

    /// Number of slices in every emitted scan.
    pub fn slices_per_scan(&self) -> usize {
        self.params.slices_per_scan(self.packets_per_scan)
    }

    pub fn state(&self) -> AccumulatorState {
        if self.stopped {
            AccumulatorState::Stopped
        } else if self.source.is_none() {
            AccumulatorState::Idle
        } else {
            match self.seed {
                Seed::Empty => AccumulatorState::AwaitingFirstSeed,
                Seed::Carried(_) => AccumulatorState::Running,
            }
        }
    }

    /// Returns false once a finite source has delivered its last packet.
    pub fn has_more(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.has_more())
    }

    /// Attach an opened packet source. Any previously carried packet is
    /// discarded so the next cycle seeds from scratch.
    pub fn start<S: PacketSource + 'static>(&mut self, source: S) -> Result<(), Error> {
        if self.stopped {
            return Err(Error::Stopped);
        }

        self.source = Some(Box::new(source));
        self.seed = Seed::Empty;
        Ok(())
    }

    /// Release the packet source. The accumulator cannot be restarted.
    pub fn stop(&mut self) {
        self.source = None;
        self.seed = Seed::Empty;
        self.stopped = true;
    }

    /// Run one accumulation cycle.
    ///
    /// # Returns
    /// - `Ok(None)` on the first cycle, which only captures the carried packet
    /// - `Ok(Some(scan))` on every following cycle
    /// - `Err(Error::ShortRead)` if a read timed out or returned the wrong
    ///   size; the cycle is abandoned and the carried packet is unchanged
    pub async fn run_cycle(&mut self) -> Result<Option<RangeScan>, Error> {
        if self.stopped {
            return Err(Error::Stopped);
        }
        let source = self.source.as_deref_mut().ok_or(Error::NotStarted)?;
        let lookahead = self.packets_per_scan;

        let seeded = match &self.seed {
            Seed::Carried(carried) => {
                self.packets[0].copy_from_slice(carried);
                true
            }
            Seed::Empty => false,
        };

        for index in usize::from(seeded)..=lookahead {
            read_packet(&mut *source, &mut self.scratch, &mut self.packets[index]).await?;
        }

        if let Seed::Carried(carried) = &mut self.seed {
            carried.copy_from_slice(&self.packets[lookahead]);
        }

        if !seeded {
            info!(
                "captured first {} byte packet, scans follow from the next cycle",
                self.params.packet_size_without_header
            );
            self.seed = Seed::Carried(self.packets[lookahead].clone());
            return Ok(None);
        }

        let scan = self.assemble()?;
        debug!(
            "scan {}: {} slices x {} beams, {} invalid blocks",
            scan.frame_id,
            scan.slices(),
            scan.beams(),
            scan.invalid_blocks
        );
        Ok(Some(scan))
    }

    /// Decode the packets of a completed cycle into a [`RangeScan`].
    fn assemble(&mut self) -> Result<RangeScan, Error> {
        let params = &self.params;
        let beams = params.vertical_beam_count;
        let slices = params.slices_per_scan(self.packets_per_scan);
        let gate = params.range_gate();

        let mut ranges = Array2::<u16>::zeros((slices, beams));
        let mut intensities = Array2::<u8>::zeros((slices, beams));
        let mut azimuths = Vec::with_capacity(self.packets.len() * params.blocks_per_packet);
        let mut invalid_blocks = 0;
        let mut offset = 0;

        for (index, raw) in self.packets.iter().enumerate() {
            let packet = PacketSlice::from_slice(raw, params)?;
            for block in packet.blocks() {
                azimuths.push(block.azimuth());

                // The lookahead packet only contributes its azimuths
                if index == self.packets_per_scan {
                    continue;
                }

                if !block.has_valid_flag() {
                    invalid_blocks += 1;
                }
                for (i, (range, intensity)) in decode_block(block, gate).enumerate() {
                    let cell = ray_cell(offset + i, beams);
                    ranges[cell] = range;
                    intensities[cell] = intensity;
                }
                offset += params.channels_per_block;
            }
        }

        let used = self.packets_per_scan * params.blocks_per_packet;
        let theta = azimuth::interpolate(&azimuths[..=used]);

        let trailer = PacketSlice::from_slice(&self.packets[0], params)?
            .trailer()
            .unwrap_or_default();
        if !self.product_checked {
            self.product_checked = true;
            if trailer.product_id != params.product_id {
                warn!(
                    "packet product id 0x{:02x} does not match configured model (0x{:02x})",
                    trailer.product_id, params.product_id
                );
            }
        }

        let frame_id = self.frame_id;
        self.frame_id = self.frame_id.wrapping_add(1);

        Ok(RangeScan {
            timestamp: timestamp()?,
            frame_id,
            device_timestamp_us: trailer.timestamp_us,
            return_mode: trailer.return_mode,
            ranges,
            intensities,
            phi: self.params.vertical_angles.clone(),
            theta,
            range_denormalizer: (DISTANCE_TO_METERS * u16::MAX as f64) as f32,
            intensity_denormalizer: MAX_INTENSITY,
            invalid_range_threshold: self.params.minimum_range,
            out_of_range_threshold: self.params.maximum_range,
            delta_time: DELTA_TIME_US,
            invalid_blocks,
        })
    }
}

/// Read exactly one packet body into `packet`.
async fn read_packet(
    source: &mut dyn PacketSource,
    scratch: &mut [u8],
    packet: &mut [u8],
) -> Result<(), Error> {
    let expected = packet.len();
    match source.recv(scratch).await {
        Ok(len) if len == expected => {
            packet.copy_from_slice(&scratch[..len]);
            Ok(())
        }
        Ok(len) => Err(Error::ShortRead {
            expected,
            received: len,
            source: None,
        }),
        Err(Error::Io(err)) => Err(Error::ShortRead {
            expected,
            received: 0,
            source: Some(err),
        }),
        Err(err) => Err(err),
    }
}
