//! Container state queries
//!
//! Lists running containers for the configured image via the runtime's
//! formatted `ps` output and parses the tab-separated fields.

use std::collections::HashMap;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Format string handed to `ps --format`, one container per line
const PS_FORMAT: &str = "{{.Names}}\t{{.Ports}}\t{{.Mounts}}";

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Failed to run `{runtime} ps`: {source}")]
    ListFailed {
        runtime: String,
        source: std::io::Error,
    },
    #[error("`{runtime} ps` exited with status {code}: {stderr}")]
    ListNonZeroExit {
        runtime: String,
        code: i32,
        stderr: String,
    },
}

/// Metadata for one running server container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInfo {
    /// Container name (`apds<port>`)
    pub name: String,
    /// Port mappings as reported by the runtime
    pub ports: String,
    /// Mount sources as reported by the runtime
    pub mounts: String,
}

/// Derive the container name for a port
pub fn container_name(port: u16) -> String {
    format!("apds{}", port)
}

/// List running containers created from the given image, keyed by name
pub async fn list_containers(
    runtime_bin: &str,
    image: &str,
) -> Result<HashMap<String, ContainerInfo>, RuntimeError> {
    let filter = format!("ancestor={}", image);
    let output = Command::new(runtime_bin)
        .args(["ps", "--filter", filter.as_str(), "--format", PS_FORMAT])
        .output()
        .await
        .map_err(|source| RuntimeError::ListFailed {
            runtime: runtime_bin.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(RuntimeError::ListNonZeroExit {
            runtime: runtime_bin.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let containers = parse_ps_output(&stdout);
    debug!(image = %image, count = containers.len(), "Listed running containers");
    Ok(containers)
}

/// Parse tab-separated `ps` output into a name -> metadata map
///
/// Lines without all three fields are skipped.
fn parse_ps_output(text: &str) -> HashMap<String, ContainerInfo> {
    let mut containers = HashMap::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        let mut fields = line.splitn(3, '\t');
        let (name, ports, mounts) = match (fields.next(), fields.next(), fields.next()) {
            (Some(name), Some(ports), Some(mounts)) if !name.is_empty() => {
                (name, ports, mounts)
            }
            _ => {
                debug!(line = %line, "Skipping malformed ps line");
                continue;
            }
        };

        containers.insert(
            name.to_string(),
            ContainerInfo {
                name: name.to_string(),
                ports: ports.to_string(),
                mounts: mounts.to_string(),
            },
        );
    }

    containers
}
