//! Server lifecycle operations
//!
//! Start, stop, restart, exec into, tail logs of, and list the per-port
//! PHP dev server containers. Every operation queries the runtime fresh;
//! no server state is kept between invocations.

use crate::config::Config;
use crate::exec::{self, ExecError};
use crate::runtime::{self, container_name, ContainerInfo, RuntimeError};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// PHP error log path inside the server container
const PHP_ERROR_LOG: &str = "/var/log/apache2/error.log";
/// Lines shown by `logs` when not following
const LOG_TAIL_LINES: &str = "100";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Port {0} is already in use by a running server")]
    PortInUse(u16),
    #[error("No server is running on port {0}")]
    PortNotInUse(u16),
    #[error("Invalid document root `{path}`: {source}")]
    DocumentRoot {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

/// Fail if the port's container is already running
fn ensure_not_running(
    containers: &HashMap<String, ContainerInfo>,
    port: u16,
) -> Result<(), ServerError> {
    if containers.contains_key(&container_name(port)) {
        return Err(ServerError::PortInUse(port));
    }
    Ok(())
}

/// Fail if the port's container is not running
fn ensure_running(
    containers: &HashMap<String, ContainerInfo>,
    port: u16,
) -> Result<(), ServerError> {
    if !containers.contains_key(&container_name(port)) {
        return Err(ServerError::PortNotInUse(port));
    }
    Ok(())
}

/// Build the `run` arguments for a new server container
fn build_run_args(config: &Config, port: u16, document_root: &str) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "-p".to_string(),
        format!("{}:80", port),
        "-v".to_string(),
        format!("{}:/var/www/html", document_root),
    ];
    for mount in &config.mounts {
        args.push("-v".to_string());
        args.push(format!("{}:{}", mount.host_path, mount.container_path));
    }
    args.push("--name".to_string());
    args.push(container_name(port));
    args.push(config.image.clone());
    args
}

/// Start a server on the port, serving `document_root`
///
/// Fails before any runtime side effect if the port is already in use.
pub async fn start(config: &Config, port: u16, document_root: &Path) -> Result<(), ServerError> {
    let containers = runtime::list_containers(&config.runtime_bin, &config.image).await?;
    ensure_not_running(&containers, port)?;

    let docroot = document_root
        .canonicalize()
        .map_err(|source| ServerError::DocumentRoot {
            path: document_root.display().to_string(),
            source,
        })?;

    info!(port = port, document_root = %docroot.display(), "Starting server");
    let args = build_run_args(config, port, &docroot.to_string_lossy());
    exec::run_checked(&config.runtime_bin, &args).await?;
    info!(port = port, "Server started");
    Ok(())
}

/// Stop and remove the port's server container
pub async fn stop(config: &Config, port: u16) -> Result<(), ServerError> {
    let containers = runtime::list_containers(&config.runtime_bin, &config.image).await?;
    ensure_running(&containers, port)?;

    info!(port = port, "Stopping server");
    let args = vec!["rm".to_string(), "-f".to_string(), container_name(port)];
    exec::run_checked(&config.runtime_bin, &args).await?;
    info!(port = port, "Server stopped");
    Ok(())
}

/// Restart the port's server container
pub async fn restart(config: &Config, port: u16) -> Result<(), ServerError> {
    let containers = runtime::list_containers(&config.runtime_bin, &config.image).await?;
    ensure_running(&containers, port)?;

    info!(port = port, "Restarting server");
    let args = vec!["restart".to_string(), container_name(port)];
    exec::run_checked(&config.runtime_bin, &args).await?;
    info!(port = port, "Server restarted");
    Ok(())
}

/// Run a command inside the port's server container
///
/// The command is attached to the user's terminal, so interactive tools
/// (composer, a shell) work as expected.
pub async fn exec_command(
    config: &Config,
    port: u16,
    command: &[String],
) -> Result<(), ServerError> {
    let containers = runtime::list_containers(&config.runtime_bin, &config.image).await?;
    ensure_running(&containers, port)?;

    let mut args = vec![
        "exec".to_string(),
        "-it".to_string(),
        container_name(port),
    ];
    args.extend(command.iter().cloned());
    exec::run_passthrough(&config.runtime_bin, &args).await?;
    Ok(())
}

/// Show (or clear) the PHP error log of the port's server container
pub async fn logs(config: &Config, port: u16, follow: bool, clear: bool) -> Result<(), ServerError> {
    let containers = runtime::list_containers(&config.runtime_bin, &config.image).await?;
    ensure_running(&containers, port)?;

    if clear {
        info!(port = port, "Clearing PHP error log");
        let args = vec![
            "exec".to_string(),
            container_name(port),
            "truncate".to_string(),
            "-s".to_string(),
            "0".to_string(),
            PHP_ERROR_LOG.to_string(),
        ];
        exec::run_checked(&config.runtime_bin, &args).await?;
        return Ok(());
    }

    let mut args = vec!["exec".to_string(), container_name(port), "tail".to_string()];
    if follow {
        args.push("-f".to_string());
    } else {
        args.push("-n".to_string());
        args.push(LOG_TAIL_LINES.to_string());
    }
    args.push(PHP_ERROR_LOG.to_string());
    exec::run_passthrough(&config.runtime_bin, &args).await?;
    Ok(())
}

/// List running servers for the configured image, sorted by name
pub async fn list(config: &Config) -> Result<Vec<ContainerInfo>, ServerError> {
    let containers = runtime::list_containers(&config.runtime_bin, &config.image).await?;
    let mut servers: Vec<ContainerInfo> = containers.into_values().collect();
    servers.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(servers)
}

/// Render the server listing, or a "none running" notice when empty
pub fn format_server_table(servers: &[ContainerInfo]) -> String {
    if servers.is_empty() {
        return "No servers running\n".to_string();
    }

    let mut out = format!("{:<12} {:<28} MOUNTS\n", "NAME", "PORTS");
    for server in servers {
        out.push_str(&format!(
            "{:<12} {:<28} {}\n",
            server.name, server.ports, server.mounts
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MountMapping;

    fn running(ports: &[u16]) -> HashMap<String, ContainerInfo> {
        ports
            .iter()
            .map(|&port| {
                let name = container_name(port);
                (
                    name.clone(),
                    ContainerInfo {
                        name,
                        ports: format!("0.0.0.0:{}->80/tcp", port),
                        mounts: "/home/dev/site".to_string(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_ensure_not_running_rejects_occupied_port() {
        let containers = running(&[8080]);
        let result = ensure_not_running(&containers, 8080);
        assert!(matches!(result, Err(ServerError::PortInUse(8080))));
    }

    #[test]
    fn test_ensure_not_running_accepts_free_port() {
        let containers = running(&[8080]);
        assert!(ensure_not_running(&containers, 9090).is_ok());
    }

    #[test]
    fn test_ensure_running_rejects_free_port() {
        let containers = running(&[]);
        let result = ensure_running(&containers, 8080);
        assert!(matches!(result, Err(ServerError::PortNotInUse(8080))));
    }

    #[test]
    fn test_ensure_running_accepts_occupied_port() {
        let containers = running(&[8080]);
        assert!(ensure_running(&containers, 8080).is_ok());
    }

    #[test]
    fn test_build_run_args() {
        let config = Config::default();
        let args = build_run_args(&config, 8080, "/home/dev/site");
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        assert_eq!(
            args,
            vec![
                "run",
                "-d",
                "-p",
                "8080:80",
                "-v",
                "/home/dev/site:/var/www/html",
                "--name",
                "apds8080",
                "ccf/php:dev",
            ]
        );
    }

    #[test]
    fn test_build_run_args_with_extra_mounts() {
        let mut config = Config::default();
        config.mounts.push(MountMapping {
            host_path: "/srv/shared".to_string(),
            container_path: "/var/www/shared".to_string(),
        });

        let args = build_run_args(&config, 8081, "/home/dev/site");
        let joined = args.join(" ");
        assert!(joined.contains("-v /srv/shared:/var/www/shared"));
        assert!(joined.contains("--name apds8081"));
    }

    #[test]
    fn test_format_server_table_empty() {
        assert_eq!(format_server_table(&[]), "No servers running\n");
    }

    #[test]
    fn test_format_server_table() {
        let servers: Vec<ContainerInfo> = running(&[8080]).into_values().collect();
        let table = format_server_table(&servers);
        assert!(table.contains("NAME"));
        assert!(table.contains("apds8080"));
        assert!(table.contains("0.0.0.0:8080->80/tcp"));
    }
}
