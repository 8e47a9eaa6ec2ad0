// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_velodynepub::{ModelType, PACKETS_PER_SCAN};
use serde_json::json;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use zenoh::config::{Config, WhatAmI};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Sensor IP address or pcap file.  Datagrams from other hosts are
    /// ignored, use 0.0.0.0 to accept any sender.  If target is an existing
    /// pcap file and the pcap feature is enabled, it is replayed instead.
    #[arg(env)]
    pub target: String,

    /// UDP data port
    #[arg(long, env, default_value = "2368")]
    pub port: u16,

    /// Sensor model
    #[arg(long, env, value_enum, default_value_t = ModelType::Vlp16)]
    pub model: ModelType,

    /// Number of packets accumulated into one range scan
    #[arg(long, env, default_value_t = PACKETS_PER_SCAN)]
    pub packets_per_scan: usize,

    /// Packet read timeout in milliseconds
    #[arg(long, env, default_value = "1000")]
    pub read_timeout: u64,

    /// The name of the lidar frame
    #[arg(long, env, default_value = "lidar")]
    pub frame_id: String,

    /// range scan topic
    #[arg(long, env, default_value = "rt/lidar/scan")]
    pub scan_topic: String,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,

    /// zenoh connection mode
    #[arg(long, env, default_value = "peer")]
    mode: WhatAmI,

    /// connect to zenoh endpoints
    #[arg(long, env)]
    connect: Vec<String>,

    /// listen to zenoh endpoints
    #[arg(long, env)]
    listen: Vec<String>,

    /// disable zenoh multicast scouting
    #[arg(long, env)]
    no_multicast_scouting: bool,
}

impl Args {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout)
    }
}

impl TryFrom<&Args> for Config {
    type Error = zenoh::Error;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let mut config = Config::default();

        config.insert_json5("mode", &json!(args.mode).to_string())?;

        if !args.connect.is_empty() {
            config.insert_json5("connect/endpoints", &json!(args.connect).to_string())?;
        }

        if !args.listen.is_empty() {
            config.insert_json5("listen/endpoints", &json!(args.listen).to_string())?;
        }

        if args.no_multicast_scouting {
            config.insert_json5("scouting/multicast/enabled", &json!(false).to_string())?;
        }

        config.insert_json5("scouting/multicast/interface", &json!("lo").to_string())?;

        Ok(config)
    }
}
