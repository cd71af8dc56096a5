// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::net::IpAddr;
use thiserror::Error;
use tokio::net::lookup_host;
use url::Url;

/// 目标 URL 错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("Target URL is empty")]
    Empty,
    #[error("Target URL cannot be parsed: {0}")]
    Unparseable(String),
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Target URL has no host")]
    MissingHost,
    #[error("SSRF protection: {0}")]
    Forbidden(String),
}

/// 规范化目标 URL
///
/// 去除首尾空白，缺少 scheme 时补 `https://`，只接受带主机名的 http/https 绝对地址。
/// 片段会被丢弃。
pub fn normalize_target(input: &str) -> Result<String, TargetError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TargetError::Empty);
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = Url::parse(&candidate).map_err(|e| TargetError::Unparseable(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(TargetError::UnsupportedScheme(url.scheme().to_string()));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(TargetError::MissingHost),
    }
    url.set_fragment(None);

    Ok(url.to_string())
}

/// 验证 URL 是否安全（防止 SSRF）
///
/// 解析主机名并拒绝私有、环回、链路本地和组播地址
pub async fn validate_url(url_str: &str) -> Result<(), TargetError> {
    let url = Url::parse(url_str).map_err(|e| TargetError::Unparseable(e.to_string()))?;
    let host = url.host_str().ok_or(TargetError::MissingHost)?;

    if host.eq_ignore_ascii_case("localhost") {
        return Err(TargetError::Forbidden("localhost is not allowed".to_string()));
    }

    let port = url.port_or_known_default().unwrap_or(80);
    // IPv6 字面量在 host_str 中带方括号，lookup_host 可以直接解析
    let addrs = lookup_host(format!("{}:{}", host, port))
        .await
        .map_err(|e| TargetError::Unparseable(format!("{}: {}", host, e)))?;

    for addr in addrs {
        if is_private_ip(addr.ip()) {
            return Err(TargetError::Forbidden(format!(
                "address {} is not publicly routable",
                addr.ip()
            )));
        }
    }

    Ok(())
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_unspecified()
                || v4.is_broadcast()
                // 100.64.0.0/10 运营商级 NAT
                || (a == 100 && (64..=127).contains(&b))
        }
        IpAddr::V6(v6) => {
            let head = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || (head & 0xfe00) == 0xfc00
                || (head & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().map(|v4| is_private_ip(IpAddr::V4(v4))).unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefixes_https() {
        assert_eq!(normalize_target("example.com").unwrap(), "https://example.com/");
        assert_eq!(
            normalize_target("  http://example.com/a?b=1#top ").unwrap(),
            "http://example.com/a?b=1"
        );
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(matches!(normalize_target("not a url"), Err(TargetError::Unparseable(_))));
        assert_eq!(normalize_target("   "), Err(TargetError::Empty));
        assert!(matches!(
            normalize_target("ftp://example.com"),
            Err(TargetError::UnsupportedScheme(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_url_blocks_loopback() {
        assert!(validate_url("http://localhost").await.is_err());
        assert!(validate_url("http://127.0.0.1:8080/").await.is_err());
        assert!(validate_url("http://[::1]/").await.is_err());
    }

    #[test]
    fn test_is_private_ip() {
        assert!(is_private_ip("127.0.0.1".parse().unwrap()));
        assert!(is_private_ip("10.0.0.1".parse().unwrap()));
        assert!(is_private_ip("192.168.1.1".parse().unwrap()));
        assert!(is_private_ip("172.16.0.1".parse().unwrap()));
        assert!(is_private_ip("169.254.169.254".parse().unwrap()));
        assert!(is_private_ip("fd00::1".parse().unwrap()));
        assert!(is_private_ip("::ffff:10.0.0.1".parse().unwrap()));
        assert!(!is_private_ip("8.8.8.8".parse().unwrap()));
        assert!(!is_private_ip("2606:4700::1111".parse().unwrap()));
    }
}
