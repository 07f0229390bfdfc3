//! Typed configuration of one elevation dataset.
//!
//! Datasets are described by INI sections. Every key is optional except the
//! dataset name, cache name, service URL and coordinate system:
//!
//! ```ini
//! [srtm30]
//! provider = wms
//! dataset_name = srtm30
//! cache_name = Earth/SRTM30
//! service_url = https://elevation.example.com/wms
//! coordinate_system = EPSG:4326
//! layer_names = srtm30,bathymetry
//! level_zero_tile_delta = 20,20
//! tile_width = 150
//! tile_height = 150
//! num_levels = 12
//! missing_data_signal = -32768
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use crate::cache::{ByteOrder, RasterFormat};
use crate::coord::Sector;
use crate::level::LevelSetConfig;
use crate::provider::{ProviderKind, UrlBuilderConfig, WmsVersion};
use crate::retrieve::{RetrieverConfig, DEFAULT_MAX_ABSENT_ATTEMPTS, DEFAULT_MIN_ABSENT_CHECK_INTERVAL};

use super::error::ConfigError;

/// Connect timeout for one-shot composite requests.
pub const COMPOSE_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read timeout for one-shot composite requests.
pub const COMPOSE_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration of an elevation dataset and its retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationModelConfig {
    /// Section name the configuration came from, used in error messages.
    pub section: String,

    // Identity and retrieval
    pub provider: ProviderKind,
    pub dataset_name: String,
    pub cache_name: String,
    pub service_url: String,
    pub coordinate_system: String,
    pub layer_names: Vec<String>,
    pub wms_version: WmsVersion,
    /// Root of a local tile tree for the `local` provider.
    pub local_root: Option<PathBuf>,

    // Tile geometry
    /// Level-zero tile size in degrees, (lat, lon).
    pub level_zero_tile_delta: (f64, f64),
    pub tile_width: u32,
    pub tile_height: u32,
    pub num_levels: usize,
    pub num_empty_levels: usize,
    pub empty_levels: Vec<usize>,
    pub sector: Sector,

    // Raster encoding
    /// MIME data format, e.g. `application/bil16`.
    pub data_format: String,
    pub byte_order: ByteOrder,
    pub format_suffix: String,

    // Value policy
    pub missing_data_signal: Option<f64>,
    pub missing_data_replacement: f64,
    pub elevation_min: f64,
    pub elevation_max: f64,
    pub use_bilinear: bool,

    // Retrieval policy
    pub max_absent_attempts: u32,
    pub min_absent_check_interval: Duration,
    /// Unix seconds; cached files older than this are refetched. 0 disables.
    pub expiry_time: u64,
    pub network_retrieval: bool,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,

    // Auxiliary data
    pub extremes_file: Option<PathBuf>,
    pub extremes_level: usize,
    pub geoid_file: Option<PathBuf>,
}

impl Default for ElevationModelConfig {
    fn default() -> Self {
        Self {
            section: "elevation".to_string(),
            provider: ProviderKind::Tiled,
            dataset_name: String::new(),
            cache_name: String::new(),
            service_url: String::new(),
            coordinate_system: String::new(),
            layer_names: Vec::new(),
            wms_version: WmsVersion::V1_3_0,
            local_root: None,
            level_zero_tile_delta: (20.0, 20.0),
            tile_width: 150,
            tile_height: 150,
            num_levels: 12,
            num_empty_levels: 0,
            empty_levels: Vec::new(),
            sector: Sector::FULL_SPHERE,
            data_format: "application/bil16".to_string(),
            byte_order: ByteOrder::LittleEndian,
            format_suffix: ".bil".to_string(),
            missing_data_signal: Some(-32768.0),
            missing_data_replacement: 0.0,
            elevation_min: -11000.0,
            elevation_max: 8850.0,
            use_bilinear: true,
            max_absent_attempts: DEFAULT_MAX_ABSENT_ATTEMPTS,
            min_absent_check_interval: DEFAULT_MIN_ABSENT_CHECK_INTERVAL,
            expiry_time: 0,
            network_retrieval: true,
            connect_timeout: crate::provider::DEFAULT_CONNECT_TIMEOUT,
            read_timeout: crate::provider::DEFAULT_READ_TIMEOUT,
            extremes_file: None,
            extremes_level: 0,
            geoid_file: None,
        }
    }
}

impl ElevationModelConfig {
    /// Create a configuration with the four required values set.
    pub fn new(
        dataset_name: impl Into<String>,
        cache_name: impl Into<String>,
        service_url: impl Into<String>,
        coordinate_system: impl Into<String>,
    ) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            cache_name: cache_name.into(),
            service_url: service_url.into(),
            coordinate_system: coordinate_system.into(),
            ..Default::default()
        }
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer_names.push(layer.into());
        self
    }

    pub fn with_level_zero_tile_delta(mut self, lat: f64, lon: f64) -> Self {
        self.level_zero_tile_delta = (lat, lon);
        self
    }

    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    pub fn with_num_levels(mut self, num_levels: usize) -> Self {
        self.num_levels = num_levels;
        self
    }

    pub fn with_sector(mut self, sector: Sector) -> Self {
        self.sector = sector;
        self
    }

    pub fn with_data_format(mut self, format: impl Into<String>, byte_order: ByteOrder) -> Self {
        self.data_format = format.into();
        self.byte_order = byte_order;
        self
    }

    pub fn with_missing_data(mut self, signal: Option<f64>, replacement: f64) -> Self {
        self.missing_data_signal = signal;
        self.missing_data_replacement = replacement;
        self
    }

    pub fn with_elevation_range(mut self, min: f64, max: f64) -> Self {
        self.elevation_min = min;
        self.elevation_max = max;
        self
    }

    pub fn with_absent_policy(mut self, max_attempts: u32, min_check_interval: Duration) -> Self {
        self.max_absent_attempts = max_attempts;
        self.min_absent_check_interval = min_check_interval;
        self
    }

    pub fn with_bilinear(mut self, use_bilinear: bool) -> Self {
        self.use_bilinear = use_bilinear;
        self
    }

    pub fn with_network_retrieval(mut self, enabled: bool) -> Self {
        self.network_retrieval = enabled;
        self
    }

    pub fn with_expiry_time(mut self, unix_secs: u64) -> Self {
        self.expiry_time = unix_secs;
        self
    }

    pub fn with_extremes_file(mut self, path: PathBuf, level: usize) -> Self {
        self.extremes_file = Some(path);
        self.extremes_level = level;
        self
    }

    pub fn with_geoid_file(mut self, path: PathBuf) -> Self {
        self.geoid_file = Some(path);
        self
    }

    /// Parse a dataset from one INI section and validate it.
    pub fn from_ini_section(section: &str, props: &Properties) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let reader = SectionReader { props };

        let config = Self {
            section: section.to_string(),
            provider: reader.parse("provider", defaults.provider)?,
            dataset_name: reader.string("dataset_name"),
            cache_name: reader.string("cache_name"),
            service_url: reader.string("service_url"),
            coordinate_system: reader.string("coordinate_system"),
            layer_names: reader.list("layer_names"),
            wms_version: reader.parse("wms_version", defaults.wms_version)?,
            local_root: reader.path("local_root"),
            level_zero_tile_delta: reader.pair("level_zero_tile_delta", defaults.level_zero_tile_delta)?,
            tile_width: reader.parse("tile_width", defaults.tile_width)?,
            tile_height: reader.parse("tile_height", defaults.tile_height)?,
            num_levels: reader.parse("num_levels", defaults.num_levels)?,
            num_empty_levels: reader.parse("num_empty_levels", defaults.num_empty_levels)?,
            empty_levels: reader.parsed_list("empty_levels")?,
            sector: reader.sector("sector", defaults.sector)?,
            data_format: reader.string_or("data_format", &defaults.data_format),
            byte_order: reader.parse("byte_order", defaults.byte_order)?,
            format_suffix: reader.string_or("format_suffix", &defaults.format_suffix),
            missing_data_signal: reader.optional_f64("missing_data_signal", defaults.missing_data_signal)?,
            missing_data_replacement: reader
                .parse("missing_data_replacement", defaults.missing_data_replacement)?,
            elevation_min: reader.parse("elevation_min", defaults.elevation_min)?,
            elevation_max: reader.parse("elevation_max", defaults.elevation_max)?,
            use_bilinear: reader.bool("use_bilinear", defaults.use_bilinear)?,
            max_absent_attempts: reader.parse("max_absent_attempts", defaults.max_absent_attempts)?,
            min_absent_check_interval: reader
                .secs("min_absent_check_interval_secs", defaults.min_absent_check_interval)?,
            expiry_time: reader.parse("expiry_time", defaults.expiry_time)?,
            network_retrieval: reader.bool("network_retrieval", defaults.network_retrieval)?,
            connect_timeout: reader.secs("connect_timeout_secs", defaults.connect_timeout)?,
            read_timeout: reader.secs("read_timeout_secs", defaults.read_timeout)?,
            extremes_file: reader.path("extremes_file"),
            extremes_level: reader.parse("extremes_level", defaults.extremes_level)?,
            geoid_file: reader.path("geoid_file"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse every dataset section of an INI document.
    ///
    /// The general section and any section named in `skip` are ignored.
    pub fn all_from_ini(ini: &Ini, skip: &[&str]) -> Result<Vec<Self>, ConfigError> {
        ini.iter()
            .filter_map(|(name, props)| name.map(|n| (n, props)))
            .filter(|(name, _)| !skip.contains(name))
            .map(|(name, props)| Self::from_ini_section(name, props))
            .collect()
    }

    /// Check required values and internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("dataset_name", &self.dataset_name),
            ("cache_name", &self.cache_name),
            ("service_url", &self.service_url),
            ("coordinate_system", &self.coordinate_system),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing {
                    section: self.section.clone(),
                    key,
                });
            }
        }

        let (dlat, dlon) = self.level_zero_tile_delta;
        if !(dlat > 0.0 && dlon > 0.0) {
            return Err(ConfigError::invalid(
                "level_zero_tile_delta",
                format!("{},{}", dlat, dlon),
                "tile deltas must be positive",
            ));
        }
        if self.tile_width < 2 {
            return Err(ConfigError::invalid("tile_width", self.tile_width, "must be at least 2"));
        }
        if self.tile_height < 2 {
            return Err(ConfigError::invalid("tile_height", self.tile_height, "must be at least 2"));
        }
        if self.num_levels == 0 {
            return Err(ConfigError::invalid("num_levels", self.num_levels, "must be at least 1"));
        }
        if self.elevation_min > self.elevation_max {
            return Err(ConfigError::invalid(
                "elevation_min",
                self.elevation_min,
                format!("greater than elevation_max {}", self.elevation_max),
            ));
        }
        if self.extremes_file.is_some() && self.extremes_level >= self.num_levels {
            return Err(ConfigError::invalid(
                "extremes_level",
                self.extremes_level,
                format!("dataset has only {} levels", self.num_levels),
            ));
        }
        self.raster_format()?;
        Ok(())
    }

    pub fn raster_format(&self) -> Result<RasterFormat, ConfigError> {
        RasterFormat::from_mime(&self.data_format, self.byte_order)
            .map_err(|e| ConfigError::invalid("data_format", &self.data_format, e.to_string()))
    }

    pub fn level_set_config(&self) -> LevelSetConfig {
        LevelSetConfig {
            coverage: self.sector,
            level_zero_delta: self.level_zero_tile_delta,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            num_levels: self.num_levels,
            num_empty_levels: self.num_empty_levels,
            empty_levels: self.empty_levels.clone(),
            cache_name: self.cache_name.clone(),
            format_suffix: self.format_suffix.clone(),
            ..LevelSetConfig::default()
        }
    }

    pub fn url_builder_config(&self) -> UrlBuilderConfig {
        UrlBuilderConfig {
            kind: self.provider,
            service_url: self.service_url.clone(),
            dataset_name: self.dataset_name.clone(),
            layer_names: self.layer_names.clone(),
            coordinate_system: self.coordinate_system.clone(),
            wms_version: self.wms_version,
            local_root: self.local_root.clone(),
            format_suffix: self.format_suffix.clone(),
        }
    }

    pub fn retriever_config(&self) -> RetrieverConfig {
        RetrieverConfig {
            format: self.data_format.clone(),
            read_timeout: self.read_timeout,
            network_retrieval: self.network_retrieval,
        }
    }
}

/// Parse a boolean the conventional way: true/false, 1/0, yes/no, on/off.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

struct SectionReader<'a> {
    props: &'a Properties,
}

impl SectionReader<'_> {
    fn raw(&self, key: &str) -> Option<&str> {
        self.props
            .get(key)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn string(&self, key: &str) -> String {
        self.raw(key).unwrap_or_default().to_string()
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or(default).to_string()
    }

    fn path(&self, key: &str) -> Option<PathBuf> {
        self.raw(key).map(PathBuf::from)
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.raw(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.raw(key) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(key, value, e.to_string())),
        }
    }

    fn parsed_list<T>(&self, key: &str) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.list(key)
            .iter()
            .map(|item| {
                item.parse()
                    .map_err(|e: T::Err| ConfigError::invalid(key, item, e.to_string()))
            })
            .collect()
    }

    fn bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.raw(key) {
            None => Ok(default),
            Some(value) => parse_bool(value)
                .ok_or_else(|| ConfigError::invalid(key, value, "expected true/false, yes/no, on/off or 1/0")),
        }
    }

    fn secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let secs: f64 = self.parse(key, default.as_secs_f64())?;
        if !(secs >= 0.0 && secs.is_finite()) {
            return Err(ConfigError::invalid(key, secs, "must be a non-negative number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }

    fn optional_f64(&self, key: &str, default: Option<f64>) -> Result<Option<f64>, ConfigError> {
        match self.raw(key) {
            None => Ok(default),
            Some(value) if value.eq_ignore_ascii_case("none") => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|e: std::num::ParseFloatError| ConfigError::invalid(key, value, e.to_string())),
        }
    }

    fn pair(&self, key: &str, default: (f64, f64)) -> Result<(f64, f64), ConfigError> {
        let values: Vec<f64> = self.parsed_list(key)?;
        match values.as_slice() {
            [] => Ok(default),
            [both] => Ok((*both, *both)),
            [lat, lon] => Ok((*lat, *lon)),
            _ => Err(ConfigError::invalid(
                key,
                self.string(key),
                "expected one value or lat,lon",
            )),
        }
    }

    fn sector(&self, key: &str, default: Sector) -> Result<Sector, ConfigError> {
        let values: Vec<f64> = self.parsed_list(key)?;
        match values.as_slice() {
            [] => Ok(default),
            [min_lat, max_lat, min_lon, max_lon] => Sector::new(*min_lat, *max_lat, *min_lon, *max_lon)
                .map_err(|e| ConfigError::invalid(key, self.string(key), e.to_string())),
            _ => Err(ConfigError::invalid(
                key,
                self.string(key),
                "expected min_lat,max_lat,min_lon,max_lon",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[engine]
cache_root = /tmp/cache

[srtm30]
provider = wms
dataset_name = srtm30
cache_name = Earth/SRTM30
service_url = https://elevation.example.com/wms
coordinate_system = EPSG:4326
layer_names = srtm30, bathymetry
wms_version = 1.1.1
level_zero_tile_delta = 36,36
tile_width = 150
tile_height = 150
num_levels = 10
empty_levels = 0,1
sector = -60,60,-180,180
data_format = application/bil16
byte_order = BigEndian
missing_data_signal = -32768
missing_data_replacement = -1
use_bilinear = no
network_retrieval = on
min_absent_check_interval_secs = 30
read_timeout_secs = 2.5
"#;

    fn load(text: &str) -> Ini {
        Ini::load_from_str(text).unwrap()
    }

    #[test]
    fn test_parse_section() {
        let ini = load(SAMPLE);
        let config =
            ElevationModelConfig::from_ini_section("srtm30", ini.section(Some("srtm30")).unwrap())
                .unwrap();

        assert_eq!(config.provider, ProviderKind::Wms);
        assert_eq!(config.layer_names, vec!["srtm30", "bathymetry"]);
        assert_eq!(config.wms_version, WmsVersion::V1_1_1);
        assert_eq!(config.level_zero_tile_delta, (36.0, 36.0));
        assert_eq!(config.num_levels, 10);
        assert_eq!(config.empty_levels, vec![0, 1]);
        assert_eq!(config.sector, Sector::new(-60.0, 60.0, -180.0, 180.0).unwrap());
        assert_eq!(config.byte_order, ByteOrder::BigEndian);
        assert_eq!(config.missing_data_signal, Some(-32768.0));
        assert_eq!(config.missing_data_replacement, -1.0);
        assert!(!config.use_bilinear);
        assert!(config.network_retrieval);
        assert_eq!(config.min_absent_check_interval, Duration::from_secs(30));
        assert_eq!(config.read_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_all_from_ini_skips_engine() {
        let ini = load(SAMPLE);
        let configs = ElevationModelConfig::all_from_ini(&ini, &["engine"]).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].section, "srtm30");
    }

    #[test]
    fn test_missing_required_keys() {
        for key in ["dataset_name", "cache_name", "service_url", "coordinate_system"] {
            let text: String = SAMPLE
                .lines()
                .filter(|line| !line.starts_with(key))
                .collect::<Vec<_>>()
                .join("\n");
            let ini = load(&text);
            let result =
                ElevationModelConfig::from_ini_section("srtm30", ini.section(Some("srtm30")).unwrap());
            assert_eq!(
                result,
                Err(ConfigError::Missing {
                    section: "srtm30".to_string(),
                    key
                })
            );
        }
    }

    #[test]
    fn test_invalid_number() {
        let ini = load("[d]\ndataset_name=a\ncache_name=b\nservice_url=c\ncoordinate_system=d\ntile_width=wide\n");
        let result = ElevationModelConfig::from_ini_section("d", ini.section(Some("d")).unwrap());
        assert!(matches!(result, Err(ConfigError::Invalid { key, .. }) if key == "tile_width"));
    }

    #[test]
    fn test_invalid_bool() {
        let ini = load("[d]\ndataset_name=a\ncache_name=b\nservice_url=c\ncoordinate_system=d\nuse_bilinear=maybe\n");
        let result = ElevationModelConfig::from_ini_section("d", ini.section(Some("d")).unwrap());
        assert!(matches!(result, Err(ConfigError::Invalid { key, .. }) if key == "use_bilinear"));
    }

    #[test]
    fn test_inverted_sector_rejected() {
        let ini = load("[d]\ndataset_name=a\ncache_name=b\nservice_url=c\ncoordinate_system=d\nsector=10,0,0,10\n");
        let result = ElevationModelConfig::from_ini_section("d", ini.section(Some("d")).unwrap());
        assert!(matches!(result, Err(ConfigError::Invalid { key, .. }) if key == "sector"));
    }

    #[test]
    fn test_signal_none() {
        let ini = load("[d]\ndataset_name=a\ncache_name=b\nservice_url=c\ncoordinate_system=d\nmissing_data_signal=none\n");
        let config = ElevationModelConfig::from_ini_section("d", ini.section(Some("d")).unwrap()).unwrap();
        assert_eq!(config.missing_data_signal, None);
    }

    #[test]
    fn test_parse_bool() {
        for yes in ["true", "TRUE", "1", "yes", "On"] {
            assert_eq!(parse_bool(yes), Some(true), "{}", yes);
        }
        for no in ["false", "0", "No", "off"] {
            assert_eq!(parse_bool(no), Some(false), "{}", no);
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn test_validate_elevation_range() {
        let config = ElevationModelConfig::new("a", "b", "c", "d").with_elevation_range(10.0, -10.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_derived_configs() {
        let config = ElevationModelConfig::new("srtm", "Earth/SRTM", "http://svc", "EPSG:4326")
            .with_level_zero_tile_delta(36.0, 36.0)
            .with_tile_size(64, 64);
        let levels = config.level_set_config();
        assert_eq!(levels.level_zero_delta, (36.0, 36.0));
        assert_eq!(levels.cache_name, "Earth/SRTM");
        assert_eq!(config.url_builder_config().dataset_name, "srtm");
        assert_eq!(config.retriever_config().format, "application/bil16");
        assert!(config.validate().is_ok());
    }
}
