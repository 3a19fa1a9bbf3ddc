//! Request paths of the OTA control surface.

use crate::error::PreferenceError;
use crate::preferences::Preferences;
use crate::CONFIG_DOMAIN;

/// A configuration pair taken verbatim from `/mod/config/<key>/<value>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

impl ConfigEntry {
    pub fn store(&self, preferences: &mut impl Preferences) -> Result<(), PreferenceError> {
        tracing::info!(key = %self.key, value = %self.value, "storing preference");
        preferences.set(CONFIG_DOMAIN, &self.key, &self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Install,
    Uninstall,
    /// `None` when the path is missing its key or value segment.
    Config(Option<ConfigEntry>),
    Unknown,
}

impl Route {
    pub fn parse(path: &str) -> Self {
        match path {
            "/mod/install" => return Self::Install,
            "/mod/uninstall" => return Self::Uninstall,
            _ => {}
        }

        let Some(rest) = path.strip_prefix("/mod/config") else {
            return Self::Unknown;
        };
        if !rest.is_empty() && !rest.starts_with('/') {
            return Self::Unknown;
        }

        let segments: Vec<&str> = rest.split('/').skip(1).collect();
        let entry = match segments[..] {
            [key, value] if !key.is_empty() && !value.is_empty() => Some(ConfigEntry {
                key: key.to_owned(),
                value: value.to_owned(),
            }),
            _ => None,
        };
        Self::Config(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::MemoryPreferences;

    macro_rules! route_test {
        ($name:ident, $path:expr => $expected:expr) => {
            #[test]
            fn $name() {
                assert_eq!(Route::parse($path), $expected);
            }
        };
    }

    fn entry(key: &str, value: &str) -> Route {
        Route::Config(Some(ConfigEntry {
            key: key.to_owned(),
            value: value.to_owned(),
        }))
    }

    route_test!(install, "/mod/install" => Route::Install);
    route_test!(uninstall, "/mod/uninstall" => Route::Uninstall);
    route_test!(config, "/mod/config/debug/1" => entry("debug", "1"));
    route_test!(config_verbatim, "/mod/config/ssid/my%20net" => entry("ssid", "my%20net"));
    route_test!(config_missing_value, "/mod/config/debug" => Route::Config(None));
    route_test!(config_empty_value, "/mod/config/debug/" => Route::Config(None));
    route_test!(config_bare, "/mod/config" => Route::Config(None));
    route_test!(config_extra_segment, "/mod/config/a/b/c" => Route::Config(None));
    route_test!(config_prefix_only, "/mod/configure/a/b" => Route::Unknown);
    route_test!(unknown, "/index.html" => Route::Unknown);

    #[test]
    fn store_entry_in_config_domain() {
        let mut prefs = MemoryPreferences::default();
        let Route::Config(Some(entry)) = Route::parse("/mod/config/debug/1") else {
            panic!("expected config entry");
        };
        entry.store(&mut prefs).unwrap();
        assert_eq!(prefs.get(CONFIG_DOMAIN, "debug").as_deref(), Some("1"));
    }
}
