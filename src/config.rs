use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use crate::autobox::AutoBoxConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub catalog: CatalogConfig,
    pub autobox: AutoBoxSettings,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            store: StoreConfig::from_env(),
            catalog: CatalogConfig::from_env(),
            autobox: AutoBoxSettings::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "MOVE_INVENTORY_API_HOST";
    const PORT_VAR: &'static str = "MOVE_INVENTORY_API_PORT";

    fn from_env() -> Self {
        let host_value = env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                tracing::warn!(
                    var = Self::HOST_VAR,
                    value = %host_value,
                    error = %err,
                    "could not parse host, using {}",
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string(Self::PORT_VAR) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    tracing::warn!(
                        var = Self::PORT_VAR,
                        "port must not be 0, using {}",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    tracing::warn!(
                        var = Self::PORT_VAR,
                        value = %raw,
                        error = %err,
                        "could not parse port, using {}",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Where stop inventories are persisted.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    data_dir: Option<PathBuf>,
}

impl StoreConfig {
    const DATA_DIR_VAR: &'static str = "MOVE_INVENTORY_DATA_DIR";

    fn from_env() -> Self {
        Self {
            data_dir: env_string(Self::DATA_DIR_VAR).map(PathBuf::from),
        }
    }

    /// Directory for JSON files; `None` keeps inventories in memory.
    pub fn data_dir(&self) -> Option<&PathBuf> {
        self.data_dir.as_ref()
    }
}

/// Source of the furniture catalog.
#[derive(Clone, Debug)]
pub struct CatalogConfig {
    path: Option<PathBuf>,
}

impl CatalogConfig {
    const PATH_VAR: &'static str = "MOVE_INVENTORY_CATALOG_PATH";

    fn from_env() -> Self {
        Self {
            path: env_string(Self::PATH_VAR).map(PathBuf::from),
        }
    }

    /// JSON catalog file; `None` uses the built-in catalog.
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Auto-box settings.
#[derive(Clone, Debug)]
pub struct AutoBoxSettings {
    enabled: bool,
    engine: AutoBoxConfig,
}

impl AutoBoxSettings {
    const ENABLED_VAR: &'static str = "MOVE_INVENTORY_AUTOBOX_ENABLED";
    const LBS_VAR: &'static str = "MOVE_INVENTORY_AUTOBOX_LBS_PER_THRESHOLD";
    const BOXES_VAR: &'static str = "MOVE_INVENTORY_AUTOBOX_BOXES_PER_THRESHOLD";

    fn from_env() -> Self {
        let enabled = env_string(Self::ENABLED_VAR)
            .and_then(|raw| parse_bool(&raw, Self::ENABLED_VAR))
            .unwrap_or(true);

        let lbs_per_threshold = load_f64_with_warning(
            Self::LBS_VAR,
            AutoBoxConfig::DEFAULT_LBS_PER_THRESHOLD,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted weight band changes how many boxes are suggested",
        );

        let boxes_per_threshold = load_f64_with_warning(
            Self::BOXES_VAR,
            f64::from(AutoBoxConfig::DEFAULT_BOXES_PER_THRESHOLD),
            valid_boxes_per_threshold,
            "must be a whole number between 1 and 100",
            "Adjusted box batch size changes how many boxes are suggested",
        ) as u32;

        let engine = AutoBoxConfig::builder()
            .lbs_per_threshold(lbs_per_threshold)
            .boxes_per_threshold(boxes_per_threshold)
            .build();

        Self { enabled, engine }
    }

    /// Whether new stops start with auto-box mode on.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the configured AutoBoxConfig.
    pub fn engine_config(&self) -> AutoBoxConfig {
        self.engine.clone()
    }
}

fn valid_boxes_per_threshold(value: f64) -> bool {
    value >= 1.0
        && value.fract() == 0.0
        && value <= f64::from(AutoBoxConfig::MAX_BOXES_PER_THRESHOLD)
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!(var = name, error = %err, "could not read variable, using default value");
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            tracing::warn!(
                var = var_name,
                value = other,
                "could not interpret value as boolean, using default value"
            );
            None
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                if !validator(value) {
                    tracing::warn!(
                        var = var_name,
                        value = %raw,
                        "invalid value: {}, using {}",
                        invalid_hint,
                        default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        tracing::info!(var = var_name, value, "{}", warning);
                    }
                    value
                }
            }
            Err(err) => {
                tracing::warn!(
                    var = var_name,
                    value = %raw,
                    error = %err,
                    "could not parse number, using {}",
                    default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));

        // Test case insensitivity
        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("ON", "TEST_VAR"), Some(true));

        // Test with whitespace
        assert_eq!(parse_bool(" true ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("no", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("n", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("off", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool(" OFF ", "TEST_VAR"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn test_load_f64_falls_back_on_invalid_values() {
        // Unset variables use the default.
        let value = load_f64_with_warning(
            "MOVE_INVENTORY_TEST_UNSET_VARIABLE",
            200.0,
            |v| v > 0.0,
            "must be greater than 0",
            "changed",
        );
        assert_eq!(value, 200.0);
    }

    #[test]
    fn test_boxes_per_threshold_bounds() {
        assert!(valid_boxes_per_threshold(1.0));
        assert!(valid_boxes_per_threshold(3.0));
        assert!(valid_boxes_per_threshold(100.0));

        assert!(!valid_boxes_per_threshold(0.0));
        assert!(!valid_boxes_per_threshold(2.5));
        assert!(!valid_boxes_per_threshold(101.0));
        assert!(!valid_boxes_per_threshold(f64::from(u32::MAX)));
        assert!(!valid_boxes_per_threshold(f64::NAN));
        assert!(!valid_boxes_per_threshold(f64::INFINITY));
    }

    #[test]
    fn test_default_autobox_settings() {
        let settings = AutoBoxSettings {
            enabled: true,
            engine: AutoBoxConfig::default(),
        };
        assert!(settings.enabled());
        assert_eq!(settings.engine_config().lbs_per_threshold, 200.0);
        assert_eq!(settings.engine_config().boxes_per_threshold, 3);
    }
}
