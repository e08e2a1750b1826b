//! Host CPU topology from /proc/cpuinfo

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;

use crate::models::{CpuTotalInfo, NodeCpuInfo, ProcessorInfo};

/// Read and parse the host CPU topology. The path is injectable so tests
/// can point at a fixture instead of the live procfs.
pub async fn read_cpu_info(path: &Path) -> Result<NodeCpuInfo> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_cpuinfo(&content))
}

/// Parse /proc/cpuinfo content into per-processor records plus aggregate
/// counts. Unrecognized fields are ignored; missing topology fields default
/// to zero (single-socket virtual machines often omit them).
pub fn parse_cpuinfo(content: &str) -> NodeCpuInfo {
    let mut cpus = Vec::new();
    let mut current: Option<ProcessorInfo> = None;

    for line in content.lines() {
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim();
        let value = value.trim();

        match field {
            "processor" => {
                if let Some(done) = current.take() {
                    cpus.push(done);
                }
                current = Some(ProcessorInfo {
                    processor: value.parse().unwrap_or(0),
                    core_id: 0,
                    socket_id: 0,
                    mhz: 0.0,
                });
            }
            "core id" => {
                if let Some(cpu) = current.as_mut() {
                    cpu.core_id = value.parse().unwrap_or(0);
                }
            }
            "physical id" => {
                if let Some(cpu) = current.as_mut() {
                    cpu.socket_id = value.parse().unwrap_or(0);
                }
            }
            "cpu MHz" => {
                if let Some(cpu) = current.as_mut() {
                    cpu.mhz = value.parse().unwrap_or(0.0);
                }
            }
            _ => {}
        }
    }
    if let Some(done) = current.take() {
        cpus.push(done);
    }

    let cores: BTreeSet<(u32, u32)> = cpus.iter().map(|c| (c.socket_id, c.core_id)).collect();
    let sockets: BTreeSet<u32> = cpus.iter().map(|c| c.socket_id).collect();
    let total = CpuTotalInfo {
        cpu_count: cpus.len() as u32,
        core_count: cores.len() as u32,
        socket_count: sockets.len() as u32,
    };

    NodeCpuInfo {
        cpus,
        total,
        collected_at: chrono::Utc::now().timestamp(),
    }
}
