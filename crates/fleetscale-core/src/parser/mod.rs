//! KDL parser
//!
//! Parses fleet.kdl into a [`Project`]. Each node type lives in its own module.

mod fleet;
mod network;

use fleet::parse_fleet;
use network::parse_network;

use crate::error::{ProvisionError, Result};
use crate::model::Project;
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::fs;
use std::path::{Path, PathBuf};

/// Parse a KDL file. Relative paths inside it resolve against its directory.
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<Project> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ProvisionError::io(path, e))?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut project = parse_kdl_string(&content, base_dir)?;
    if project.name.is_empty() {
        project.name = project
            .base_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();
    }
    Ok(project)
}

/// Parse a KDL string
pub fn parse_kdl_string(content: &str, base_dir: impl Into<PathBuf>) -> Result<Project> {
    let doc: KdlDocument = content.parse()?;

    let mut project = Project {
        base_dir: base_dir.into(),
        ..Default::default()
    };

    for node in doc.nodes() {
        match node.name().value() {
            "project" => {
                if let Some(name) = string_arg(node) {
                    project.name = name.to_string();
                }
            }
            "region" => {
                project.region = string_arg(node).map(|s| s.to_string());
            }
            "network" => {
                let network = parse_network(node)?;
                if project.networks.contains_key(&network.id) {
                    return Err(ProvisionError::InvalidConfig(format!(
                        "network {} is declared twice",
                        network.id
                    )));
                }
                project.networks.insert(network.id.clone(), network);
            }
            "fleet" => {
                let fleet = parse_fleet(node)?;
                if project.fleet(&fleet.id).is_some() {
                    return Err(ProvisionError::InvalidConfig(format!(
                        "fleet {} is declared twice",
                        fleet.id
                    )));
                }
                project.fleets.push(fleet);
            }
            other => {
                tracing::warn!("Ignoring unknown node: {}", other);
            }
        }
    }

    Ok(project)
}

/// Positional arguments of a node, properties excluded
fn args(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

fn string_arg(node: &KdlNode) -> Option<&str> {
    args(node).next().and_then(|v| v.as_string())
}

/// First argument as a string, or an error naming the node
fn required_string_arg<'a>(node: &'a KdlNode, what: &str) -> Result<&'a str> {
    string_arg(node).ok_or_else(|| {
        ProvisionError::InvalidConfig(format!(
            "{} requires {}",
            node.name().value(),
            what
        ))
    })
}

fn integer_arg(node: &KdlNode) -> Result<Option<i64>> {
    args(node)
        .next()
        .map(|v| to_i64(node, "value", v))
        .transpose()
}

fn bool_arg(node: &KdlNode) -> Option<bool> {
    args(node).next().and_then(|v| v.as_bool())
}

fn string_prop<'a>(node: &'a KdlNode, key: &str) -> Option<&'a str> {
    node.get(key).and_then(|v| v.as_string())
}

fn integer_prop(node: &KdlNode, key: &str) -> Result<Option<i64>> {
    node.get(key).map(|v| to_i64(node, key, v)).transpose()
}

fn to_i64(node: &KdlNode, key: &str, value: &KdlValue) -> Result<i64> {
    value
        .as_integer()
        .and_then(|i| i64::try_from(i).ok())
        .ok_or_else(|| {
            ProvisionError::InvalidConfig(format!(
                "{} {} must be an integer, got {}",
                node.name().value(),
                key,
                value
            ))
        })
}
