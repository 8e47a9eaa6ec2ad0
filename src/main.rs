// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use cdr::{CdrLe, Infinite};
use clap::Parser as _;
use edgefirst_schemas::{builtin_interfaces::Time, sensor_msgs::PointCloud2, std_msgs::Header};
use edgefirst_velodynepub::{
    Error, RangeScan, ScanAccumulator, UdpSource,
    formats::{POINT_STEP, format_range_scan, range_scan_fields},
};
use std::net::IpAddr;
use tracing::{debug, error, info, instrument, trace, warn};
use zenoh::{
    bytes::{Encoding, ZBytes},
    qos::{CongestionControl, Priority},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.rust_log)
        .init();

    let mut acc = ScanAccumulator::new(args.model, args.packets_per_scan)?;
    info!(
        "{} accumulator: {} packets per scan, {} slices x {} beams",
        args.model,
        acc.packets_per_scan(),
        acc.slices_per_scan(),
        acc.parameters().vertical_beam_count
    );

    let session = zenoh::open(zenoh::Config::try_from(&args)?).await?;
    debug!("opened zenoh session");

    let publisher = match session
        .declare_publisher(args.scan_topic.clone())
        .priority(Priority::DataHigh)
        .congestion_control(CongestionControl::Drop)
        .await
    {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to create publisher {}: {:?}", args.scan_topic, e);
            return Err(e);
        }
    };

    start_source(&mut acc, &args).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let result = tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted, shutting down");
                break;
            }
            result = acc.run_cycle() => result,
        };

        match result {
            Ok(Some(scan)) => {
                let (msg, enc) = match format_scan(&scan, args.frame_id.clone()) {
                    Ok(v) => v,
                    Err(e) => {
                        error!("Could not encode range scan: {:?}", e);
                        continue;
                    }
                };

                match publisher.put(msg).encoding(enc).await {
                    Ok(_) => trace!("{} message sent", args.scan_topic),
                    Err(e) => error!("{} message error: {:?}", args.scan_topic, e),
                }
            }
            Ok(None) => {}
            Err(e @ Error::ShortRead { .. }) => warn!("abandoned cycle: {}", e),
            Err(e) => {
                error!("lidar error: {}", e);
                acc.stop();
                return Err(e.into());
            }
        }

        if !acc.has_more() {
            info!("packet source exhausted");
            break;
        }
    }

    acc.stop();
    Ok(())
}

/// Attach the packet source named by `args.target` to the accumulator.
async fn start_source(
    acc: &mut ScanAccumulator,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    #[cfg(feature = "pcap")]
    if std::path::Path::new(&args.target).is_file() {
        let source = edgefirst_velodynepub::PcapSource::from_file(&args.target, Some(args.port))?
            .retain_len(acc.parameters().packet_size_without_header);
        info!("replaying {} packets from {}", source.len(), args.target);
        acc.start(source)?;
        return Ok(());
    }

    let device: IpAddr = args.target.parse()?;

    // On Linux [::] will bind to IPv4 and IPv6 but not on Windows so we bind
    // according to the device IP version.
    let bind_addr = match device.is_ipv4() {
        true => format!("0.0.0.0:{}", args.port),
        false => format!("[::]:{}", args.port),
    };
    let device = (!device.is_unspecified()).then_some(device);

    let source = UdpSource::bind(&bind_addr, device, args.read_timeout()).await?;
    info!("listening on {} for {}", source.local_addr()?, args.target);
    acc.start(source)?;
    Ok(())
}

/// Encode a range scan as an organized PointCloud2, one row per beam.
#[instrument(skip_all)]
fn format_scan(scan: &RangeScan, frame_id: String) -> Result<(ZBytes, Encoding), cdr::Error> {
    let slices = scan.slices() as u32;

    let msg = PointCloud2 {
        header: Header {
            stamp: Time {
                sec: (scan.timestamp / 1_000_000_000) as i32,
                nanosec: (scan.timestamp % 1_000_000_000) as u32,
            },
            frame_id,
        },
        height: scan.beams() as u32,
        width: slices,
        fields: range_scan_fields(),
        is_bigendian: false,
        point_step: POINT_STEP as u32,
        row_step: POINT_STEP as u32 * slices,
        data: format_range_scan(scan),
        is_dense: false,
    };

    let msg = ZBytes::from(cdr::serialize::<_, _, CdrLe>(&msg, Infinite)?);
    let enc = Encoding::APPLICATION_CDR.with_schema("sensor_msgs/msg/PointCloud2");

    Ok((msg, enc))
}
