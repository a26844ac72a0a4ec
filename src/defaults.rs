//! Startup defaults provided by the host environment, with a hardcoded
//! fallback so every other component can rely on a well-formed value.

use serde::Deserialize;

pub const FALLBACK_IP: &str = "127.0.0.1";
pub const FALLBACK_PORT: u16 = 8000;

/// Backend-provided default projector address. Immutable for the session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Defaults {
    pub ip: String,
    pub port: u16,
}

impl Defaults {
    fn fallback() -> Self {
        Self {
            ip: FALLBACK_IP.to_string(),
            port: FALLBACK_PORT,
        }
    }
}

/// Parse the defaults JSON handed over at startup (`--defaults` flag or the
/// `BENQCTL_DEFAULTS` environment variable). Absence or any parse failure is
/// recovered silently with the hardcoded fallback; this never errors.
pub fn bootstrap_defaults(raw: Option<&str>) -> Defaults {
    raw.and_then(|text| serde_json::from_str(text).ok())
        .unwrap_or_else(Defaults::fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_defaults() {
        let defaults = bootstrap_defaults(Some(r#"{"ip":"192.168.1.5","port":8000}"#));
        assert_eq!(defaults.ip, "192.168.1.5");
        assert_eq!(defaults.port, 8000);
    }

    #[test]
    fn malformed_json_falls_back() {
        let defaults = bootstrap_defaults(Some("{not json"));
        assert_eq!(defaults.ip, FALLBACK_IP);
        assert_eq!(defaults.port, FALLBACK_PORT);
    }

    #[test]
    fn missing_fields_fall_back() {
        let defaults = bootstrap_defaults(Some(r#"{"ip":"10.0.0.2"}"#));
        assert_eq!(defaults, Defaults::fallback());
    }

    #[test]
    fn absent_input_falls_back() {
        assert_eq!(bootstrap_defaults(None), Defaults::fallback());
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let defaults = bootstrap_defaults(Some(r#"{"ip":"10.0.0.9","port":9000,"theme":"dark"}"#));
        assert_eq!(defaults.ip, "10.0.0.9");
        assert_eq!(defaults.port, 9000);
    }
}
