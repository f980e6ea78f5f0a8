// src/services/guard.rs

//! Outbound URL guard.
//!
//! Every URL is checked here before the fetcher opens a connection, so that
//! configured sources (or redirects they issue) cannot point the fetcher at
//! cloud metadata endpoints, loopback services or private networks.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

use ipnet::IpNet;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use url::{Host, Url};

use crate::error::GuardError;
use crate::models::GuardConfig;

/// Hostnames refused outright.
const BLOCKED_HOSTS: &[&str] = &[
    "localhost",
    "metadata.google.internal",
    "metadata.internal",
    "metadata.gke.internal",
    "instance-data",
];

/// Private, loopback, link-local and unspecified ranges.
const BLOCKED_RANGES: &[&str] = &[
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "127.0.0.0/8",
    "169.254.0.0/16", // link-local, cloud metadata
    "0.0.0.0/8",
    "::1/128",
    "::/128",
    "fc00::/7",
    "fe80::/10",
];

/// URL validator for SSRF protection.
#[derive(Debug, Clone)]
pub struct UrlGuard {
    blocked_hosts: HashSet<String>,
    blocked_ranges: Vec<IpNet>,
    allowed_hosts: HashSet<String>,
}

impl Default for UrlGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlGuard {
    /// Create a guard with the built-in rules.
    pub fn new() -> Self {
        Self {
            blocked_hosts: BLOCKED_HOSTS.iter().map(|h| h.to_string()).collect(),
            blocked_ranges: BLOCKED_RANGES
                .iter()
                .filter_map(|cidr| cidr.parse().ok())
                .collect(),
            allowed_hosts: HashSet::new(),
        }
    }

    /// Built-in rules plus the configured additions.
    pub fn from_config(config: &GuardConfig) -> Self {
        let guard = config
            .blocked_hosts
            .iter()
            .fold(Self::new(), |guard, host| guard.block_host(host));
        config
            .allowed_hosts
            .iter()
            .fold(guard, |guard, host| guard.allow_host(host))
    }

    /// Exempt a host from every check.
    pub fn allow_host(mut self, host: impl AsRef<str>) -> Self {
        self.allowed_hosts.insert(host.as_ref().to_ascii_lowercase());
        self
    }

    /// Refuse an additional host.
    pub fn block_host(mut self, host: impl AsRef<str>) -> Self {
        self.blocked_hosts.insert(host.as_ref().to_ascii_lowercase());
        self
    }

    /// Validate a URL, resolving its hostname.
    ///
    /// Resolution goes through tokio's resolver so a slow DNS server only
    /// suspends the calling task.
    pub async fn validate(&self, url: &str) -> Result<(), GuardError> {
        let parsed = Url::parse(url).map_err(|e| GuardError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        self.validate_url(&parsed).await
    }

    /// Validate an already parsed URL.
    pub async fn validate_url(&self, url: &Url) -> Result<(), GuardError> {
        let host = self.check_static(url)?;
        let Some(domain) = host else {
            return Ok(());
        };

        let port = url.port_or_known_default().unwrap_or(80);
        let addrs: Vec<IpAddr> = tokio::net::lookup_host((domain.as_str(), port))
            .await
            .map_err(|e| GuardError::DnsResolution {
                host: domain.clone(),
                message: e.to_string(),
            })?
            .map(|addr| addr.ip())
            .collect();

        if addrs.is_empty() {
            return Err(GuardError::DnsResolution {
                host: domain,
                message: "no addresses returned".to_string(),
            });
        }

        for ip in addrs {
            self.check_ip(&domain, ip)?;
        }
        Ok(())
    }

    /// Checks that need no network: scheme, host presence, denylist and
    /// literal addresses.
    ///
    /// Returns the domain that still needs resolving, or `None` when the URL
    /// is already settled (allowed host or safe literal address).
    fn check_static(&self, url: &Url) -> Result<Option<String>, GuardError> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(GuardError::DisallowedScheme(other.to_string())),
        }

        let host = url.host().ok_or(GuardError::NoHost)?;
        let host_str = url.host_str().unwrap_or_default().to_ascii_lowercase();

        if self.allowed_hosts.contains(&host_str) {
            return Ok(None);
        }

        match host {
            Host::Ipv4(ip) => self.check_ip(&host_str, IpAddr::V4(ip)).map(|_| None),
            Host::Ipv6(ip) => self.check_ip(&host_str, IpAddr::V6(ip)).map(|_| None),
            Host::Domain(domain) => {
                let domain = domain.trim_end_matches('.').to_ascii_lowercase();
                if domain.is_empty() {
                    return Err(GuardError::NoHost);
                }
                if self.blocked_hosts.contains(&domain) {
                    return Err(GuardError::BlockedHost(domain));
                }
                Ok(Some(domain))
            }
        }
    }

    fn check_ip(&self, host: &str, ip: IpAddr) -> Result<(), GuardError> {
        if self.is_blocked_ip(ip) {
            return Err(GuardError::BlockedAddress {
                host: host.to_string(),
                ip,
            });
        }
        Ok(())
    }

    /// Whether an address falls inside a blocked range.
    pub fn is_blocked_ip(&self, ip: IpAddr) -> bool {
        // ::ffff:10.0.0.1 reaches the same host as 10.0.0.1
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
            v4 => v4,
        };
        self.blocked_ranges.iter().any(|range| range.contains(&ip))
    }

    /// Whether `host` may be reached at `ip`.
    pub fn admits(&self, host: &str, ip: IpAddr) -> bool {
        self.allowed_hosts.contains(&host.to_ascii_lowercase()) || !self.is_blocked_ip(ip)
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// DNS resolver for the HTTP client that drops blocked addresses.
///
/// `UrlGuard::validate_url` resolves a host before the request, and the
/// client resolves it again to connect. Filtering here means a record that
/// changes between the two lookups still cannot reach a blocked range.
#[derive(Debug, Clone)]
pub struct GuardedResolver {
    guard: UrlGuard,
}

impl GuardedResolver {
    pub fn new(guard: UrlGuard) -> Self {
        Self { guard }
    }
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let guard = self.guard.clone();
        Box::pin(async move {
            let host = name.as_str().to_string();
            let resolved: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .collect();
            let admitted: Vec<SocketAddr> = resolved
                .iter()
                .copied()
                .filter(|addr| guard.admits(&host, addr.ip()))
                .collect();

            if admitted.is_empty() {
                let error = match resolved.first() {
                    Some(addr) => GuardError::BlockedAddress {
                        host,
                        ip: addr.ip(),
                    },
                    None => GuardError::DnsResolution {
                        host,
                        message: "no addresses returned".to_string(),
                    },
                };
                log::warn!("Connection refused by guard: {}", error);
                return Err(error.into());
            }
            let addrs: Addrs = Box::new(admitted.into_iter());
            Ok::<_, BoxError>(addrs)
        })
    }
}
