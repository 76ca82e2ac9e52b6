use chrono_tz::Tz;
use log::info;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use tokio::time::Duration;
use url::Url;

use crate::store::MergePolicy;

// Defaults match the deployed lamp sensor
const DEFAULT_STH_URL: &str = "http://191.235.32.167:8666";
const DEFAULT_ENTITY_TYPE: &str = "Lamp";
const DEFAULT_ENTITY_ID: &str = "urn:ngsi-ld:Lamp:EDGE4";
const DEFAULT_FIWARE_SERVICE: &str = "smart";
const DEFAULT_FIWARE_SERVICEPATH: &str = "/";
const DEFAULT_LAST_N: u32 = 30;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_DISPLAY_TIMEZONE: &str = "America/Sao_Paulo";

/// Where and for whom the history service is queried
#[derive(Debug, Clone)]
pub struct HistoryEndpoint {
    pub base_url: Url,
    pub entity_type: String,
    pub entity_id: String,
    pub service: String,
    pub service_path: String,
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub endpoint: HistoryEndpoint,
    pub last_n: u32,
    pub poll_interval: Duration,
    pub display_zone: Tz,
    pub merge_policy: MergePolicy,
}

impl DashboardConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("STH_URL").unwrap_or_else(|| DEFAULT_STH_URL.to_string());
        let base_url =
            Url::parse(&raw_url).map_err(|e| format!("Invalid STH_URL '{}': {}", raw_url, e))?;
        if base_url.cannot_be_a_base() {
            return Err(format!("STH_URL '{}' cannot carry a path", raw_url).into());
        }

        let endpoint = HistoryEndpoint {
            base_url,
            entity_type: lookup("ENTITY_TYPE").unwrap_or_else(|| DEFAULT_ENTITY_TYPE.to_string()),
            entity_id: lookup("ENTITY_ID").unwrap_or_else(|| DEFAULT_ENTITY_ID.to_string()),
            service: lookup("FIWARE_SERVICE")
                .unwrap_or_else(|| DEFAULT_FIWARE_SERVICE.to_string()),
            service_path: lookup("FIWARE_SERVICEPATH")
                .unwrap_or_else(|| DEFAULT_FIWARE_SERVICEPATH.to_string()),
        };

        let last_n: u32 = parse_var(&lookup, "LAST_N", DEFAULT_LAST_N)?;
        if last_n == 0 {
            return Err("LAST_N must be greater than zero".into());
        }

        let interval_secs: u64 =
            parse_var(&lookup, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err("POLL_INTERVAL_SECS must be greater than zero".into());
        }

        let zone_name =
            lookup("DISPLAY_TIMEZONE").unwrap_or_else(|| DEFAULT_DISPLAY_TIMEZONE.to_string());
        let display_zone: Tz = zone_name
            .parse()
            .map_err(|_| format!("Unknown DISPLAY_TIMEZONE '{}'", zone_name))?;

        let merge_policy = parse_var(&lookup, "MERGE_POLICY", MergePolicy::ReplaceSorted)?;

        info!(
            "Polling {} for {} '{}' every {}s (lastN={}, policy={}, zone={})",
            endpoint.base_url,
            endpoint.entity_type,
            endpoint.entity_id,
            interval_secs,
            last_n,
            merge_policy,
            display_zone.name()
        );

        Ok(DashboardConfig {
            endpoint,
            last_n,
            poll_interval: Duration::from_secs(interval_secs),
            display_zone,
            merge_policy,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid {} '{}': {}", key, raw, e).into()),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<DashboardConfig, Box<dyn std::error::Error>> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DashboardConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_deployment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.endpoint.base_url.as_str(), "http://191.235.32.167:8666/");
        assert_eq!(config.endpoint.entity_type, "Lamp");
        assert_eq!(config.endpoint.entity_id, "urn:ngsi-ld:Lamp:EDGE4");
        assert_eq!(config.endpoint.service, "smart");
        assert_eq!(config.endpoint.service_path, "/");
        assert_eq!(config.last_n, 30);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.display_zone, chrono_tz::America::Sao_Paulo);
        assert_eq!(config.merge_policy, MergePolicy::ReplaceSorted);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("STH_URL", "http://localhost:9000"),
            ("LAST_N", "5"),
            ("POLL_INTERVAL_SECS", "60"),
            ("DISPLAY_TIMEZONE", "Europe/Helsinki"),
            ("MERGE_POLICY", "append-only"),
        ])
        .unwrap();
        assert_eq!(config.endpoint.base_url.as_str(), "http://localhost:9000/");
        assert_eq!(config.last_n, 5);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.display_zone, chrono_tz::Europe::Helsinki);
        assert_eq!(config.merge_policy, MergePolicy::AppendOnly);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[("LAST_N", "0")]).is_err());
        assert!(config_from(&[("LAST_N", "many")]).is_err());
        assert!(config_from(&[("POLL_INTERVAL_SECS", "0")]).is_err());
        assert!(config_from(&[("DISPLAY_TIMEZONE", "Mars/Olympus")]).is_err());
        assert!(config_from(&[("MERGE_POLICY", "newest-wins")]).is_err());
        assert!(config_from(&[("STH_URL", "not a url")]).is_err());
        assert!(config_from(&[("STH_URL", "mailto:ops@example.com")]).is_err());
    }
}
