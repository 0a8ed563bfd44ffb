use anyhow::{Context, Result};
use mini_recon::CsvCodec;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSource {
    pub file: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigExport {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigServer {
    pub port: u16,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(try_from = "RawConfigCsv")]
pub struct ConfigCsv(pub CsvCodec);

impl Default for ConfigCsv {
    fn default() -> Self {
        ConfigCsv(CsvCodec::default())
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfigCsv {
    delimiter: String,
}

impl TryFrom<RawConfigCsv> for ConfigCsv {
    type Error = String;

    fn try_from(raw: RawConfigCsv) -> Result<Self, Self::Error> {
        match raw.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(ConfigCsv(CsvCodec::with_delimiter(*byte))),
            _ => Err(format!(
                "csv delimiter must be a single ASCII character, got '{}'",
                raw.delimiter
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub internal: Option<ConfigSource>,
    pub provider: Option<ConfigSource>,
    pub export: Option<ConfigExport>,
    pub server: Option<ConfigServer>,
    #[serde(default)]
    pub csv: ConfigCsv,
}

impl Config {
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load_from_file(path: &Path) -> Result<(PathBuf, Self)> {
        let base_dir = path.parent().map(ToOwned::to_owned).unwrap_or_default();

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Config::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok((base_dir, config))
    }

    pub fn find_and_load() -> Result<Option<(PathBuf, Self)>> {
        let config_locations = [
            Path::new("mini-recon.toml"),
            Path::new(".mini-recon.toml"),
        ];

        for location in &config_locations {
            if location.exists() {
                tracing::debug!("Using config file {}", location.display());
                return Self::load_from_file(location).map(Some);
            }
        }

        Ok(None)
    }
}
