//! Provisioning-service client inventory
//! (`ignite client list -m xml -l details`).

use regex::Regex;
use serde::Serialize;

use super::host::parse_number;
use crate::{AppError, Result};

/// What kind of machine an inventory entry describes.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    /// Physical partition hosting vPars.
    Node,
    /// Virtual partition.
    Partition,
    /// Anything else registered with the provisioning service.
    Other,
}

impl ClientKind {
    /// Classify by model string.
    #[must_use]
    pub fn from_model(model: &str) -> Self {
        if model.contains("nPar") {
            Self::Node
        } else if model.contains("Virtual Partition") {
            Self::Partition
        } else {
            Self::Other
        }
    }
}

/// One `iux:client` record.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InventoryClient {
    /// Client name.
    pub name: String,
    /// Hardware model string.
    pub model: String,
    /// `ipaddress` attribute.
    pub address: String,
    /// `hostname` attribute.
    pub hostname: Option<String>,
    /// `memory` attribute, converted from KB to MB.
    pub memory_mb: Option<u64>,
    /// `cpus` attribute.
    pub cpus: Option<u32>,
}

impl InventoryClient {
    /// Classification of this client.
    #[must_use]
    pub fn kind(&self) -> ClientKind {
        ClientKind::from_model(&self.model)
    }
}

/// Pre-compiled patterns for the inventory XML.
#[derive(Debug, Clone)]
pub struct InventoryParser {
    client: Regex,
    attr: Regex,
}

impl InventoryParser {
    /// Compile the inventory patterns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|err| AppError::Config(format!("inventory pattern: {err}")))
        };
        Ok(Self {
            client: compile(r#"(?s)<iux:client\b[^>]*?\bname="([^"]*)"[^>]*>(.*?)</iux:client>"#)?,
            attr: compile(r#"(?s)<iux:attr\b[^>]*?\bname="([^"]*)"[^>]*>(.*?)</iux:attr>"#)?,
        })
    }

    /// Parse every client record in `xml`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RemoteCommand` if a numeric attribute is not an
    /// integer.
    pub fn parse(&self, xml: &str) -> Result<Vec<InventoryClient>> {
        let mut clients = Vec::new();
        for captures in self.client.captures_iter(xml) {
            let mut client = InventoryClient {
                name: unescape(&captures[1]),
                model: String::new(),
                address: String::new(),
                hostname: None,
                memory_mb: None,
                cpus: None,
            };

            for attr in self.attr.captures_iter(&captures[2]) {
                let value = unescape(attr[2].trim());
                match &attr[1] {
                    "model" => client.model = value,
                    "ipaddress" => client.address = value,
                    "hostname" => client.hostname = Some(value),
                    "memory" => {
                        let kb: u64 = parse_number(&value, "memory")?;
                        client.memory_mb = Some(kb / 1024);
                    }
                    "cpus" => client.cpus = Some(parse_number(&value, "cpus")?),
                    _ => {}
                }
            }

            clients.push(client);
        }
        Ok(clients)
    }
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
