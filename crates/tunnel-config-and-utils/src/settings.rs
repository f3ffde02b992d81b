//! Typed tunnel settings rendered into the engine's YAML config.
//!
//! The engine reads its configuration from a file. Callers that do not ship a
//! file build a [`TunnelSettings`] and hand the rendered YAML to the bridge as
//! inline text.

use crate::{CoreError, CoreResult};
use serde::Serialize;

pub const DEFAULT_SOCKS5_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_SOCKS5_PORT: u16 = 1080;
pub const DEFAULT_TUN_NAME: &str = "tun0";
pub const DEFAULT_TUN_MTU: u32 = 8500;
pub const DEFAULT_MULTI_QUEUE: u32 = 4;
pub const DEFAULT_DNS_SERVERS: [&str; 2] = ["8.8.8.8", "8.8.4.4"];

const MIN_MTU: u32 = 1280;
const MAX_MTU: u32 = 65535;

/// Validated tunnel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSettings {
    socks5_address: String,
    socks5_port: u16,
    socks5_username: Option<String>,
    socks5_password: Option<String>,
    tun_name: String,
    tun_mtu: u32,
    tun_ipv4: Option<AddressPair>,
    tun_ipv6: Option<AddressPair>,
    dns_servers: Vec<String>,
    multi_queue: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct AddressPair {
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway: Option<String>,
}

#[derive(Serialize)]
struct Document<'a> {
    tunnel: TunnelSection<'a>,
    socks5: Socks5Section<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    misc: Option<MiscSection<'a>>,
}

#[derive(Serialize)]
struct TunnelSection<'a> {
    name: &'a str,
    mtu: u32,
    #[serde(rename = "multi-queue")]
    multi_queue: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv4: Option<&'a AddressPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv6: Option<&'a AddressPair>,
}

#[derive(Serialize)]
struct Socks5Section<'a> {
    address: &'a str,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Serialize)]
struct MiscSection<'a> {
    dns: &'a [String],
}

impl TunnelSettings {
    pub fn builder() -> TunnelSettingsBuilder {
        TunnelSettingsBuilder::default()
    }

    pub fn socks5_address(&self) -> &str {
        &self.socks5_address
    }

    pub fn socks5_port(&self) -> u16 {
        self.socks5_port
    }

    pub fn tun_name(&self) -> &str {
        &self.tun_name
    }

    pub fn tun_mtu(&self) -> u32 {
        self.tun_mtu
    }

    pub fn dns_servers(&self) -> &[String] {
        &self.dns_servers
    }

    pub fn multi_queue(&self) -> u32 {
        self.multi_queue
    }

    /// Render the engine config document.
    ///
    /// Optional sections (`ipv4`, `ipv6`, credentials, `misc`) are omitted
    /// when unset.
    pub fn to_yaml(&self) -> CoreResult<String> {
        let document = Document {
            tunnel: TunnelSection {
                name: &self.tun_name,
                mtu: self.tun_mtu,
                multi_queue: self.multi_queue,
                ipv4: self.tun_ipv4.as_ref(),
                ipv6: self.tun_ipv6.as_ref(),
            },
            socks5: Socks5Section {
                address: &self.socks5_address,
                port: self.socks5_port,
                username: self.socks5_username.as_deref(),
                password: self.socks5_password.as_deref(),
            },
            misc: if self.dns_servers.is_empty() {
                None
            } else {
                Some(MiscSection {
                    dns: &self.dns_servers,
                })
            },
        };
        Ok(serde_yaml::to_string(&document)?)
    }
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            socks5_address: DEFAULT_SOCKS5_ADDRESS.to_string(),
            socks5_port: DEFAULT_SOCKS5_PORT,
            socks5_username: None,
            socks5_password: None,
            tun_name: DEFAULT_TUN_NAME.to_string(),
            tun_mtu: DEFAULT_TUN_MTU,
            tun_ipv4: Some(AddressPair {
                address: "10.0.0.2".to_string(),
                gateway: Some("10.0.0.1".to_string()),
            }),
            tun_ipv6: Some(AddressPair {
                address: "fc00::2".to_string(),
                gateway: Some("fc00::1".to_string()),
            }),
            dns_servers: DEFAULT_DNS_SERVERS.iter().map(|s| s.to_string()).collect(),
            multi_queue: DEFAULT_MULTI_QUEUE,
        }
    }
}

/// Builder for [`TunnelSettings`]. Range checks run in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct TunnelSettingsBuilder {
    socks5_address: String,
    socks5_port: u32,
    socks5_username: Option<String>,
    socks5_password: Option<String>,
    tun_name: String,
    tun_mtu: u32,
    ipv4_address: Option<String>,
    ipv4_gateway: Option<String>,
    ipv6_address: Option<String>,
    ipv6_gateway: Option<String>,
    dns_servers: Vec<String>,
    multi_queue: u32,
}

impl Default for TunnelSettingsBuilder {
    fn default() -> Self {
        let defaults = TunnelSettings::default();
        let (ipv4_address, ipv4_gateway) = split_pair(defaults.tun_ipv4);
        let (ipv6_address, ipv6_gateway) = split_pair(defaults.tun_ipv6);
        Self {
            socks5_address: defaults.socks5_address,
            socks5_port: u32::from(defaults.socks5_port),
            socks5_username: None,
            socks5_password: None,
            tun_name: defaults.tun_name,
            tun_mtu: defaults.tun_mtu,
            ipv4_address,
            ipv4_gateway,
            ipv6_address,
            ipv6_gateway,
            dns_servers: defaults.dns_servers,
            multi_queue: defaults.multi_queue,
        }
    }
}

fn split_pair(pair: Option<AddressPair>) -> (Option<String>, Option<String>) {
    match pair {
        Some(pair) => (Some(pair.address), pair.gateway),
        None => (None, None),
    }
}

/// Blank strings count as unset, matching how hosts pass optional fields.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TunnelSettingsBuilder {
    pub fn socks5_address(mut self, address: impl Into<String>) -> Self {
        self.socks5_address = address.into();
        self
    }

    pub fn socks5_port(mut self, port: u32) -> Self {
        self.socks5_port = port;
        self
    }

    pub fn socks5_credentials(mut self, username: Option<&str>, password: Option<&str>) -> Self {
        self.socks5_username = username.map(str::to_string);
        self.socks5_password = password.map(str::to_string);
        self
    }

    pub fn tun_name(mut self, name: impl Into<String>) -> Self {
        self.tun_name = name.into();
        self
    }

    pub fn tun_mtu(mut self, mtu: u32) -> Self {
        self.tun_mtu = mtu;
        self
    }

    pub fn tun_ipv4(mut self, address: Option<&str>, gateway: Option<&str>) -> Self {
        self.ipv4_address = address.map(str::to_string);
        self.ipv4_gateway = gateway.map(str::to_string);
        self
    }

    pub fn tun_ipv6(mut self, address: Option<&str>, gateway: Option<&str>) -> Self {
        self.ipv6_address = address.map(str::to_string);
        self.ipv6_gateway = gateway.map(str::to_string);
        self
    }

    /// Replace the DNS server list.
    pub fn dns_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dns_servers = servers.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_dns_server(mut self, server: impl Into<String>) -> Self {
        self.dns_servers.push(server.into());
        self
    }

    pub fn multi_queue(mut self, queues: u32) -> Self {
        self.multi_queue = queues;
        self
    }

    pub fn build(self) -> CoreResult<TunnelSettings> {
        if self.socks5_address.trim().is_empty() {
            return Err(invalid("socks5_address", "SOCKS5 address is required"));
        }
        let socks5_port = u16::try_from(self.socks5_port)
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| invalid("socks5_port", format!("invalid port: {}", self.socks5_port)))?;
        if !(MIN_MTU..=MAX_MTU).contains(&self.tun_mtu) {
            return Err(invalid("tun_mtu", format!("invalid MTU: {}", self.tun_mtu)));
        }
        if self.multi_queue == 0 {
            return Err(invalid("multi_queue", "multi-queue must be positive"));
        }

        let tun_name = if self.tun_name.trim().is_empty() {
            DEFAULT_TUN_NAME.to_string()
        } else {
            self.tun_name
        };

        Ok(TunnelSettings {
            socks5_address: self.socks5_address,
            socks5_port,
            socks5_username: non_blank(self.socks5_username),
            socks5_password: non_blank(self.socks5_password),
            tun_name,
            tun_mtu: self.tun_mtu,
            tun_ipv4: address_pair(self.ipv4_address, self.ipv4_gateway),
            tun_ipv6: address_pair(self.ipv6_address, self.ipv6_gateway),
            dns_servers: self.dns_servers,
            multi_queue: self.multi_queue,
        })
    }
}

/// A gateway without an address is dropped.
fn address_pair(address: Option<String>, gateway: Option<String>) -> Option<AddressPair> {
    non_blank(address).map(|address| AddressPair {
        address,
        gateway: non_blank(gateway),
    })
}

fn invalid(field: &'static str, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidSetting {
        field,
        reason: reason.into(),
    }
}
