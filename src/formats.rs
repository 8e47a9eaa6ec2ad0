// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Range scan packing for PointCloud2 messages.
//!
//! A [`RangeScan`] is published as an organized cloud with one row per beam
//! and one column per slice. Every cell is packed into 13 bytes:
//!
//! ```text
//! ┌─────────────┬───────────────┬─────────────┬───────────┐
//! │ azimuth:f32 │ elevation:f32 │ range:f32   │ intensity │
//! │ 4B          │ 4B            │ 4B (meters) │ 1B        │
//! └─────────────┴───────────────┴─────────────┴───────────┘
//! ```
//!
//! Cells without a return carry a range of zero.

use crate::{accumulator::RangeScan, model::DISTANCE_TO_METERS};
use edgefirst_schemas::sensor_msgs::PointField;

/// Bytes per packed cell.
pub const POINT_STEP: usize = 13;

/// Point field data types for PointCloud2 messages.
///
/// These values correspond to the ROS sensor_msgs/PointField datatype field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(dead_code)]
pub enum PointFieldType {
    INT8 = 1,
    UINT8 = 2,
    INT16 = 3,
    UINT16 = 4,
    INT32 = 5,
    UINT32 = 6,
    FLOAT32 = 7,
    FLOAT64 = 8,
}

/// Build the range scan point fields (13-byte stride).
///
/// - azimuth: FLOAT32 at offset 0
/// - elevation: FLOAT32 at offset 4
/// - range: FLOAT32 at offset 8
/// - reflect: UINT8 at offset 12
pub fn range_scan_fields() -> Vec<PointField> {
    vec![
        PointField {
            name: String::from("azimuth"),
            offset: 0,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        },
        PointField {
            name: String::from("elevation"),
            offset: 4,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        },
        PointField {
            name: String::from("range"),
            offset: 8,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        },
        PointField {
            name: String::from("reflect"),
            offset: 12,
            datatype: PointFieldType::UINT8 as u8,
            count: 1,
        },
    ]
}

/// Pack `scan` into a new buffer, beam-major.
pub fn format_range_scan(scan: &RangeScan) -> Vec<u8> {
    let mut data = vec![0u8; POINT_STEP * scan.slices() * scan.beams()];
    format_range_scan_into(scan, &mut data);
    data
}

/// Pack `scan` into a pre-allocated buffer.
///
/// # Panics
///
/// Panics if `out` is shorter than `13 * slices * beams` bytes.
pub fn format_range_scan_into(scan: &RangeScan, out: &mut [u8]) {
    let slices = scan.slices();
    let beams = scan.beams();
    assert!(out.len() >= POINT_STEP * slices * beams);

    for beam in 0..beams {
        let elevation = (scan.phi[beam] as f32).to_le_bytes();
        for slice in 0..slices {
            let offset = (beam * slices + slice) * POINT_STEP;
            let range = (scan.ranges[[slice, beam]] as f64 * DISTANCE_TO_METERS) as f32;
            out[offset..offset + 4].copy_from_slice(&(scan.theta[slice] as f32).to_le_bytes());
            out[offset + 4..offset + 8].copy_from_slice(&elevation);
            out[offset + 8..offset + 12].copy_from_slice(&range.to_le_bytes());
            out[offset + 12] = scan.intensities[[slice, beam]];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::ReturnMode;
    use ndarray::Array2;

    fn make_scan() -> RangeScan {
        let mut ranges = Array2::<u16>::zeros((4, 2));
        let mut intensities = Array2::<u8>::zeros((4, 2));
        ranges[[1, 0]] = 1000;
        intensities[[1, 0]] = 55;
        ranges[[3, 1]] = 500;
        intensities[[3, 1]] = 9;

        RangeScan {
            timestamp: 0,
            frame_id: 0,
            device_timestamp_us: 0,
            return_mode: ReturnMode::Strongest,
            ranges,
            intensities,
            phi: vec![-0.25, 0.25],
            theta: vec![0.0, -0.1, -0.2, -0.3],
            range_denormalizer: 131.07,
            intensity_denormalizer: 100.0,
            invalid_range_threshold: 0.2,
            out_of_range_threshold: 100.0,
            delta_time: 50,
            invalid_blocks: 0,
        }
    }

    fn read_f32(data: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    }

    #[test]
    fn test_format_range_scan() {
        let scan = make_scan();
        let data = format_range_scan(&scan);
        assert_eq!(data.len(), 13 * 8);

        // Row 0 (beam 0), column 1 (slice 1)
        let offset = 13;
        assert_eq!(read_f32(&data, offset), -0.1);
        assert_eq!(read_f32(&data, offset + 4), -0.25);
        assert!((read_f32(&data, offset + 8) - 2.0).abs() < 1e-5);
        assert_eq!(data[offset + 12], 55);

        // Row 1 (beam 1), column 3 (slice 3)
        let offset = (4 + 3) * 13;
        assert_eq!(read_f32(&data, offset), -0.3);
        assert_eq!(read_f32(&data, offset + 4), 0.25);
        assert!((read_f32(&data, offset + 8) - 1.0).abs() < 1e-5);
        assert_eq!(data[offset + 12], 9);

        // No return
        assert_eq!(read_f32(&data, 8), 0.0);
        assert_eq!(data[12], 0);
    }

    #[test]
    fn test_point_field_builder() {
        let fields = range_scan_fields();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].name, "azimuth");
        assert_eq!(fields[2].name, "range");
        assert_eq!(fields[2].offset, 8);
        assert_eq!(fields[3].name, "reflect");
        assert_eq!(fields[3].offset, 12);
        assert_eq!(fields[3].datatype, PointFieldType::UINT8 as u8);
    }

    #[test]
    #[should_panic]
    fn test_format_into_short_buffer() {
        let scan = make_scan();
        let mut out = vec![0u8; 10];
        format_range_scan_into(&scan, &mut out);
    }
}
