//! Syntax checks for engagement targets.

use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{SafetyError, SafetyResult};

/// A target that passed [`validate_target`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A single address.
    Ip(IpAddr),
    /// An address range in CIDR notation.
    Network {
        /// Base address.
        addr: IpAddr,
        /// Prefix length.
        prefix: u8,
    },
    /// A domain name or URL.
    Url(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(addr) => write!(f, "{addr}"),
            Self::Network { addr, prefix } => write!(f, "{addr}/{prefix}"),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Whether `text` is an IPv4 or IPv6 address.
#[must_use]
pub fn is_valid_ip(text: &str) -> bool {
    text.parse::<IpAddr>().is_ok()
}

/// Whether `text` looks like a domain name or URL: optional `http(s)://`,
/// a dotted name ending in an alphabetic TLD, optional port and path.
#[must_use]
pub fn is_valid_url(text: &str) -> bool {
    static URL: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(https?://)?(www\.)?[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}(:\d{1,5})?(/\S*)?$")
            .expect("invalid regex")
    });
    URL.is_match(text)
}

fn parse_network(text: &str) -> Option<Target> {
    let (addr, prefix) = text.split_once('/')?;
    let addr: IpAddr = addr.parse().ok()?;
    let prefix: u8 = prefix.parse().ok()?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    (prefix <= max).then_some(Target::Network { addr, prefix })
}

/// Check that `text` names an address, a CIDR range or a URL.
///
/// # Errors
///
/// Returns [`SafetyError::InvalidTarget`] for anything else, including
/// blank input and text carrying whitespace or shell metacharacters.
pub fn validate_target(text: &str) -> SafetyResult<Target> {
    let text = text.trim();
    if let Ok(addr) = text.parse::<IpAddr>() {
        return Ok(Target::Ip(addr));
    }
    if let Some(network) = parse_network(text) {
        return Ok(network);
    }
    if is_valid_url(text) {
        return Ok(Target::Url(text.to_string()));
    }
    Err(SafetyError::InvalidTarget(text.to_string()))
}
