//! Local URL derivation for the development server.

/// URL a browser should use to reach a server bound to `host:port`.
///
/// Wildcard bind addresses are not browsable, so they map to the loopback
/// address. IPv6 literals are bracketed.
pub fn local_url(host: &str, port: u16) -> String {
    let host = host.trim();
    let browsable = match host {
        "" | "0.0.0.0" => "127.0.0.1".to_string(),
        "::" | "[::]" => "[::1]".to_string(),
        h if h.contains(':') && !h.starts_with('[') => format!("[{h}]"),
        h => h.to_string(),
    };
    format!("http://{browsable}:{port}/")
}
