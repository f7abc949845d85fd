use std::str::FromStr;

pub const DEFAULT_MAX_BUILD_PASSES: usize = 8;
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on build passes per cycle. Each pass that starts async
    /// initializers costs one more.
    pub max_build_passes: usize,
    /// Interval periods below this are clamped.
    pub min_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_build_passes: DEFAULT_MAX_BUILD_PASSES,
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
        }
    }
}

impl EngineConfig {
    /// Reads `BLOCKS_MAX_BUILD_PASSES` and `BLOCKS_MIN_INTERVAL_MS`.
    pub fn from_env() -> Self {
        let max_build_passes =
            parse_positive(std::env::var("BLOCKS_MAX_BUILD_PASSES").ok().as_deref())
                .unwrap_or(DEFAULT_MAX_BUILD_PASSES);
        let min_interval_ms =
            parse_positive(std::env::var("BLOCKS_MIN_INTERVAL_MS").ok().as_deref())
                .unwrap_or(DEFAULT_MIN_INTERVAL_MS);
        Self {
            max_build_passes,
            min_interval_ms,
        }
    }
}

fn parse_positive<T>(raw: Option<&str>) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    raw.and_then(|raw| raw.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
}
