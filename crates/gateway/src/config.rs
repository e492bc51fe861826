//! Gateway configuration.
//!
//! Mirrors the adapter options of the emulated network backend: addressing
//! for the virtual link, the masquerade flag consumed by the surrounding NAT
//! code, and the two knobs this crate acts on itself — the proxy URL prefix
//! and the scheme-upgrade flag.

use std::net::Ipv4Addr;

use serde::Deserialize;

/// Immutable per-instance gateway configuration.
///
/// Constructed once and shared for the process lifetime. Loading from a
/// config file is the embedding application's concern; every field has a
/// default so a partial document deserializes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Network identifier distinguishing multiple emulated interfaces.
    pub id: u32,
    /// MAC address presented by the virtual router.
    pub router_mac: [u8; 6],
    /// IPv4 address of the virtual router.
    pub router_ip: Ipv4Addr,
    /// IPv4 address assigned to the guest.
    pub vm_ip: Ipv4Addr,
    /// Whether guest traffic is NAT-translated behind a single external
    /// identity. Consumed by the surrounding networking code.
    pub masquerade: bool,
    /// Proxy URL prefix prepended to every outbound request URL, e.g.
    /// `https://corsproxy.example/?`. The proxy receives the original URL as
    /// a single percent-encoded parameter.
    pub proxy_url: Option<String>,
    /// Upgrade plain `http` targets to `https` before dispatch. Stands in
    /// for the browser mixed-content rule in embeddings that need it.
    pub upgrade_insecure: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            id: 0,
            router_mac: [0x52, 0x54, 0x00, 0x01, 0x02, 0x03],
            router_ip: Ipv4Addr::new(192, 168, 86, 1),
            vm_ip: Ipv4Addr::new(192, 168, 86, 100),
            masquerade: true,
            proxy_url: None,
            upgrade_insecure: false,
        }
    }
}
