//! Server address discovery

/// Fallback when no non-loopback address can be found
pub const FALLBACK_SERVER_IP: &str = "localhost";

/// Outward-facing address of this host, as reported to clients in envelopes
pub fn discover_server_ip() -> String {
    match local_ip_address::local_ip() {
        Ok(ip) if !ip.is_loopback() => ip.to_string(),
        Ok(ip) => {
            tracing::debug!(ip = %ip, "Only a loopback address is available");
            FALLBACK_SERVER_IP.to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to get local ip address");
            FALLBACK_SERVER_IP.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovered_ip_is_never_empty() {
        let ip = discover_server_ip();
        assert!(!ip.is_empty());
        assert!(ip == FALLBACK_SERVER_IP || ip.parse::<std::net::IpAddr>().is_ok());
    }
}
