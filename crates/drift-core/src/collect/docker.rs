//! Docker collector.
//!
//! Speaks the Docker Engine HTTP API over the UNIX socket. The collector
//! is silently disabled when the socket does not exist; individual
//! endpoint failures leave that sub-category empty.
//!
//! One short-lived connection per endpoint with `Connection: close`, so
//! the body is simply everything after the header block (de-chunked when
//! the daemon answers with chunked transfer encoding).

use crate::model::{Container, DockerNetwork, DockerState, Image, Volume};
use chrono::{SecondsFormat, TimeZone, Utc};
use drift_common::{CollectError, Deadline};
use drift_config::DockerConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Collect Docker engine state.
pub fn collect_docker(
    config: &DockerConfig,
    deadline: &Deadline,
) -> (DockerState, Option<CollectError>) {
    let mut state = DockerState::default();

    if !Path::new(&config.socket_path).exists() {
        debug!(socket = %config.socket_path, "docker socket absent, skipping");
        return (state, None);
    }

    if config.containers {
        if let Some(body) = engine_get(&config.socket_path, "/containers/json?all=true") {
            state.containers = parse_containers(&body);
        }
    }
    if deadline.check().is_err() {
        return (state, Some(CollectError::Cancelled));
    }

    if config.images {
        if let Some(body) = engine_get(&config.socket_path, "/images/json") {
            state.images = parse_images(&body);
        }
    }
    if deadline.check().is_err() {
        return (state, Some(CollectError::Cancelled));
    }

    if config.volumes {
        if let Some(body) = engine_get(&config.socket_path, "/volumes") {
            state.volumes = parse_volumes(&body);
        }
    }
    if deadline.check().is_err() {
        return (state, Some(CollectError::Cancelled));
    }

    if config.networks {
        if let Some(body) = engine_get(&config.socket_path, "/networks") {
            state.networks = parse_networks(&body);
        }
    }

    debug!(
        containers = state.containers.len(),
        images = state.images.len(),
        "docker state collected"
    );
    (state, None)
}

// ---------------------------------------------------------------------------
// Minimal HTTP/1.1 GET over the UNIX socket
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn engine_get(socket_path: &str, path: &str) -> Option<String> {
    use std::io::{Read, Write};

    let mut stream = UnixStream::connect(socket_path).ok()?;
    let request = format!(
        "GET {path} HTTP/1.1\r\nHost: docker\r\nAccept: application/json\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).ok()?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).ok()?;
    parse_http_response(&raw)
}

#[cfg(not(unix))]
fn engine_get(_socket_path: &str, _path: &str) -> Option<String> {
    None
}

/// Split a raw HTTP response into its body, de-chunking if needed.
/// Non-200 responses yield `None`.
fn parse_http_response(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let (head, body) = text.split_once("\r\n\r\n")?;

    let status_line = head.lines().next()?;
    let status = status_line.split_whitespace().nth(1)?;
    if status != "200" {
        return None;
    }

    let chunked = head
        .lines()
        .any(|line| line.to_ascii_lowercase() == "transfer-encoding: chunked");

    if chunked {
        Some(decode_chunked(body))
    } else {
        Some(body.to_string())
    }
}

/// Decode a chunked transfer-encoded body.
fn decode_chunked(body: &str) -> String {
    let mut out = String::new();
    let mut rest = body;
    loop {
        let Some((size_line, tail)) = rest.split_once("\r\n") else {
            break;
        };
        let Ok(size) = usize::from_str_radix(size_line.trim(), 16) else {
            break;
        };
        if size == 0 || tail.len() < size {
            break;
        }
        out.push_str(&tail[..size]);
        // skip the CRLF trailing each chunk
        rest = tail.get(size + 2..).unwrap_or("");
    }
    out
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ContainerDto {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "Names", default)]
    names: Vec<String>,
    #[serde(rename = "Image", default)]
    image: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "Created", default)]
    created: i64,
    #[serde(rename = "Ports", default)]
    ports: Vec<PortDto>,
    #[serde(rename = "Labels", default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct PortDto {
    #[serde(rename = "IP", default)]
    ip: Option<String>,
    #[serde(rename = "PublicPort", default)]
    public_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct ImageDto {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "RepoTags", default)]
    repo_tags: Option<Vec<String>>,
    #[serde(rename = "Size", default)]
    size: u64,
    #[serde(rename = "Created", default)]
    created: i64,
    #[serde(rename = "Labels", default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct VolumesDto {
    #[serde(rename = "Volumes", default)]
    volumes: Option<Vec<VolumeDto>>,
}

#[derive(Debug, Deserialize)]
struct VolumeDto {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Driver", default)]
    driver: String,
    #[serde(rename = "Mountpoint", default)]
    mountpoint: String,
}

#[derive(Debug, Deserialize)]
struct NetworkDto {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Driver", default)]
    driver: String,
    #[serde(rename = "Scope", default)]
    scope: String,
    #[serde(rename = "IPAM", default)]
    ipam: Option<IpamDto>,
    #[serde(rename = "Labels", default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct IpamDto {
    #[serde(rename = "Config", default)]
    config: Option<Vec<IpamConfigDto>>,
}

#[derive(Debug, Deserialize)]
struct IpamConfigDto {
    #[serde(rename = "Subnet", default)]
    subnet: Option<String>,
}

fn rfc3339_from_epoch(secs: i64) -> String {
    match Utc.timestamp_opt(secs, 0).single() {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => String::new(),
    }
}

fn parse_containers(body: &str) -> BTreeMap<String, Container> {
    let mut containers = BTreeMap::new();
    let Ok(dtos) = serde_json::from_str::<Vec<ContainerDto>>(body) else {
        return containers;
    };

    for dto in dtos {
        let name = dto
            .names
            .first()
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default();
        let ports = dto
            .ports
            .iter()
            .filter_map(|p| match (&p.ip, p.public_port) {
                (Some(ip), Some(port)) => Some(format!("{ip}:{port}")),
                _ => None,
            })
            .collect();

        containers.insert(
            dto.id.clone(),
            Container {
                id: dto.id,
                name,
                image: dto.image,
                status: dto.status,
                state: dto.state,
                created: rfc3339_from_epoch(dto.created),
                ports,
                labels: dto.labels.unwrap_or_default(),
            },
        );
    }
    containers
}

fn parse_images(body: &str) -> BTreeMap<String, Image> {
    let mut images = BTreeMap::new();
    let Ok(dtos) = serde_json::from_str::<Vec<ImageDto>>(body) else {
        return images;
    };

    for dto in dtos {
        let (name, tag) = match dto.repo_tags.as_ref().and_then(|t| t.first()) {
            Some(repo_tag) => match repo_tag.rsplit_once(':') {
                Some((name, tag)) => (name.to_string(), tag.to_string()),
                None => (repo_tag.clone(), String::new()),
            },
            None => (String::new(), String::new()),
        };

        images.insert(
            dto.id.clone(),
            Image {
                id: dto.id,
                name,
                tag,
                size: dto.size,
                created: rfc3339_from_epoch(dto.created),
                labels: dto.labels.unwrap_or_default(),
            },
        );
    }
    images
}

fn parse_volumes(body: &str) -> BTreeMap<String, Volume> {
    let mut volumes = BTreeMap::new();
    let Ok(dto) = serde_json::from_str::<VolumesDto>(body) else {
        return volumes;
    };

    for vol in dto.volumes.unwrap_or_default() {
        volumes.insert(
            vol.name.clone(),
            Volume {
                name: vol.name,
                driver: vol.driver,
                mountpoint: vol.mountpoint,
            },
        );
    }
    volumes
}

fn parse_networks(body: &str) -> BTreeMap<String, DockerNetwork> {
    let mut networks = BTreeMap::new();
    let Ok(dtos) = serde_json::from_str::<Vec<NetworkDto>>(body) else {
        return networks;
    };

    for dto in dtos {
        let subnet = dto
            .ipam
            .as_ref()
            .and_then(|ipam| ipam.config.as_ref())
            .and_then(|configs| configs.first())
            .and_then(|config| config.subnet.clone())
            .unwrap_or_default();

        networks.insert(
            dto.id.clone(),
            DockerNetwork {
                id: dto.id,
                name: dto.name,
                driver: dto.driver,
                scope: dto.scope,
                subnet,
                labels: dto.labels.unwrap_or_default(),
            },
        );
    }
    networks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_containers() {
        let body = r#"[{
            "Id": "abc123",
            "Names": ["/web-1"],
            "Image": "nginx:1.25",
            "State": "running",
            "Status": "Up 3 hours",
            "Created": 1700000000,
            "Ports": [
                {"IP": "0.0.0.0", "PrivatePort": 80, "PublicPort": 8080, "Type": "tcp"},
                {"PrivatePort": 443, "Type": "tcp"}
            ],
            "Labels": {"env": "prod"}
        }]"#;
        let containers = parse_containers(body);
        let web = &containers["abc123"];
        assert_eq!(web.name, "web-1");
        assert_eq!(web.ports, vec!["0.0.0.0:8080"]);
        assert_eq!(web.labels["env"], "prod");
        assert_eq!(web.created, "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_parse_images_splits_repo_tag() {
        let body = r#"[{
            "Id": "sha256:f00",
            "RepoTags": ["registry.local:5000/app:v2"],
            "Size": 12345,
            "Created": 1700000000
        }, {
            "Id": "sha256:untagged",
            "RepoTags": null,
            "Size": 1,
            "Created": 0
        }]"#;
        let images = parse_images(body);
        let app = &images["sha256:f00"];
        assert_eq!(app.name, "registry.local:5000/app");
        assert_eq!(app.tag, "v2");
        assert!(images["sha256:untagged"].name.is_empty());
    }

    #[test]
    fn test_parse_volumes_and_networks() {
        let volumes = parse_volumes(
            r#"{"Volumes": [{"Name": "data", "Driver": "local", "Mountpoint": "/var/lib/docker/volumes/data"}]}"#,
        );
        assert_eq!(volumes["data"].driver, "local");

        let networks = parse_networks(
            r#"[{
                "Id": "net1",
                "Name": "bridge",
                "Driver": "bridge",
                "Scope": "local",
                "IPAM": {"Config": [{"Subnet": "172.17.0.0/16"}]}
            }]"#,
        );
        assert_eq!(networks["net1"].subnet, "172.17.0.0/16");
    }

    #[test]
    fn test_parse_http_response_plain() {
        let raw =
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n[]";
        assert_eq!(parse_http_response(raw).unwrap(), "[]");
    }

    #[test]
    fn test_parse_http_response_chunked() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\n[{\r\n2\r\n}]\r\n0\r\n\r\n";
        assert_eq!(parse_http_response(raw).unwrap(), "[{}]");
    }

    #[test]
    fn test_parse_http_response_error_status() {
        let raw = b"HTTP/1.1 500 Internal Server Error\r\n\r\nboom";
        assert_eq!(parse_http_response(raw), None);
    }

    #[test]
    fn test_absent_socket_disables_collector() {
        let config = DockerConfig {
            socket_path: "/nonexistent/docker.sock".to_string(),
            ..Default::default()
        };
        let (state, error) = collect_docker(&config, &Deadline::none());
        assert!(state.containers.is_empty());
        assert!(error.is_none());
    }
}
