use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// MAC vendor prefixes for the pxelinux boot entries. Releases after the 4.5
// artifact cutover (live installer images) use a different family than 4.5
// and older (metal installer images), so both generations can coexist on one
// boot network.
const MAC_FAMILY_LIVE: &str = "00:17:a4";
const MAC_FAMILY_LEGACY: &str = "10:17:a4";

const LIVE_CUTOVER: ReleaseVersion = ReleaseVersion { major: 4, minor: 5 };

/// OpenShift release in `major.minor` form. Ordered field-wise, so
/// 4.10 > 4.6 > 4.5 (a plain decimal compare would get this wrong).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReleaseVersion {
    pub major: u32,
    pub minor: u32,
}

impl ReleaseVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Error, Debug)]
#[error("Invalid release version `{0}`, expected MAJOR.MINOR (e.g. 4.6)")]
pub struct ReleaseVersionParseError(String);

impl FromStr for ReleaseVersion {
    type Err = ReleaseVersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| ReleaseVersionParseError(s.to_string()))?;
        let major = major
            .parse()
            .map_err(|_| ReleaseVersionParseError(s.to_string()))?;
        let minor = minor
            .parse()
            .map_err(|_| ReleaseVersionParseError(s.to_string()))?;
        Ok(Self { major, minor })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Bootstrap,
    Master,
    Worker,
}

impl NodeRole {
    pub fn tag(&self) -> &'static str {
        match self {
            NodeRole::Bootstrap => "bs",
            NodeRole::Master => "m",
            NodeRole::Worker => "w",
        }
    }
}

/// One provisioning unit in the cluster topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub role: NodeRole,
    /// 1-based ordinal within the role; the bootstrap node carries none.
    pub index: Option<u32>,
    pub name: String,
    /// 0-based position across the whole node set, bootstrap first.
    pub sequence: u32,
}

impl Node {
    fn new(prefix: &str, role: NodeRole, index: Option<u32>, sequence: u32) -> Self {
        let name = match index {
            Some(i) => format!("{}{}{}", prefix, role.tag(), i),
            None => format!("{}{}", prefix, role.tag()),
        };
        Self {
            role,
            index,
            name,
            sequence,
        }
    }

    pub fn identity(&self, version: ReleaseVersion) -> NetworkIdentity {
        NetworkIdentity::derive(self.sequence, version)
    }
}

/// MAC address plus the pxelinux config file name bound to it. The file name
/// is a pure function of the MAC, never chosen independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub mac_address: String,
    pub boot_file: String,
}

impl NetworkIdentity {
    pub fn derive(sequence: u32, version: ReleaseVersion) -> Self {
        let family = if version > LIVE_CUTOVER {
            MAC_FAMILY_LIVE
        } else {
            MAC_FAMILY_LEGACY
        };
        let mac_address = format!("{}:77:{:02}:45", family, sequence);
        let boot_file = format!("01-{}", mac_address.replace(':', "-"));
        Self {
            mac_address,
            boot_file,
        }
    }
}

/// Enumerates the full topology in provisioning order: bootstrap, then
/// masters 1..=N, then workers 1..=M.
pub fn node_set(prefix: &str, masters: u32, workers: u32) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(1 + masters as usize + workers as usize);
    let mut sequence = 0;

    nodes.push(Node::new(prefix, NodeRole::Bootstrap, None, sequence));
    sequence += 1;

    for index in 1..=masters {
        nodes.push(Node::new(prefix, NodeRole::Master, Some(index), sequence));
        sequence += 1;
    }
    for index in 1..=workers {
        nodes.push(Node::new(prefix, NodeRole::Worker, Some(index), sequence));
        sequence += 1;
    }

    nodes
}
