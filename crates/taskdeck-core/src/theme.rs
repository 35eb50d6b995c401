use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::kv::{KeyValueStore, THEME_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Reads the saved theme; anything missing or unrecognized is light.
    pub fn load<K: KeyValueStore + ?Sized>(kv: &K) -> Self {
        match kv.get(THEME_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "unknown stored theme; using light");
                Theme::Light
            }),
            Ok(None) => Theme::Light,
            Err(err) => {
                warn!(error = %err, "failed to read theme; using light");
                Theme::Light
            }
        }
    }

    pub fn save<K: KeyValueStore + ?Sized>(self, kv: &mut K) -> anyhow::Result<()> {
        debug!(theme = self.as_str(), "saving theme");
        kv.set(THEME_KEY, self.as_str())
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(anyhow!("invalid theme: {other} (expected light or dark)")),
        }
    }
}
