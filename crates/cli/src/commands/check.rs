//! Check command handler.
//!
//! Reports which feature groups are configured and optionally probes the
//! proxy.

use clap::Args;
use std::time::Duration;
use teller_core::{config::AppConfig, AppResult};

/// Proxy probe timeout
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Show which features are configured
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Try to open a TCP connection to the configured proxy
    #[arg(long)]
    pub probe_proxy: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CheckCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing check command");

        let status = config.validate();
        let missing = config.missing_vars();

        let probe = if self.probe_proxy {
            Some(probe_proxy(config).await)
        } else {
            None
        };

        if self.json {
            let output = serde_json::json!({
                "baseConfig": status.base_config,
                "googleApi": status.google_api,
                "proxy": status.proxy,
                "missing": missing,
                "proxyReachable": probe.as_ref().map(|p| p.is_ok()),
                "proxyError": probe.as_ref().and_then(|p| p.as_ref().err()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        let line = |name: &str, ok: bool, group: &str| {
            if ok {
                println!("✅ {}", name);
            } else {
                let vars = missing.get(group).map(|v| v.join(", ")).unwrap_or_default();
                println!("❌ {} (missing: {})", name, vars);
            }
        };
        line("Base configuration", status.base_config, "base");
        line("Google search API", status.google_api, "google");
        line("Proxy", status.proxy, "proxy");

        if status.proxy {
            if let Err(e) = config.proxy.parsed_port() {
                println!("⚠️  {}", e);
            }
        }

        match probe {
            Some(Ok(addr)) => println!("✅ Proxy port open: {}", addr),
            Some(Err(e)) => println!("❌ Proxy probe failed: {}", e),
            None => {}
        }

        Ok(())
    }
}

/// Open and close a TCP connection to the proxy.
async fn probe_proxy(config: &AppConfig) -> Result<String, String> {
    let host = config
        .proxy
        .host
        .as_deref()
        .ok_or_else(|| "PROXY_HOST not set".to_string())?;
    let port = config.proxy.parsed_port()?;
    let addr = format!("{}:{}", host, port);

    tracing::info!("Probing proxy {}", addr);
    match tokio::time::timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect(&addr)).await {
        Ok(Ok(_)) => Ok(addr),
        Ok(Err(e)) => Err(format!("{}: {}", addr, e)),
        Err(_) => Err(format!("{}: timed out after {}s", addr, PROBE_TIMEOUT.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teller_core::config::ProxyConfig;

    fn config_with_proxy(host: Option<&str>, port: Option<&str>) -> AppConfig {
        AppConfig {
            proxy: ProxyConfig {
                host: host.map(str::to_string),
                port: port.map(str::to_string),
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_probe_requires_host() {
        let err = probe_proxy(&config_with_proxy(None, Some("7890"))).await.unwrap_err();
        assert!(err.contains("PROXY_HOST"));
    }

    #[tokio::test]
    async fn test_probe_rejects_bad_port() {
        let err = probe_proxy(&config_with_proxy(Some("127.0.0.1"), Some("70000")))
            .await
            .unwrap_err();
        assert!(err.contains("invalid proxy port"));
    }

    #[tokio::test]
    async fn test_probe_open_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port().to_string();

        let addr = probe_proxy(&config_with_proxy(Some("127.0.0.1"), Some(&port)))
            .await
            .unwrap();
        assert_eq!(addr, format!("127.0.0.1:{}", port));
    }
}
