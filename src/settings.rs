use std::time::Duration;

use fieldx::fxstruct;

/// Database configuration.
///
/// ```
/// # use std::time::Duration;
/// # use kv_facade::Settings;
/// let settings = Settings::builder()
///     .cache(1_000)
///     .write_interval(Duration::from_millis(50))
///     .bulk_limit(500)
///     .build()
///     .unwrap();
/// assert_eq!(settings.cache(), 1_000);
/// assert!(settings.json());
/// ```
#[derive(Debug, Clone)]
#[fxstruct(no_new, builder, get(copy))]
pub struct Settings {
    /// Instance name, used to tag log records.
    #[fieldx(get(clone), builder(into), default(String::from("kv-facade")))]
    pub name: String,

    /// Target number of cached records. With 0 nothing is retained beyond what is waiting to be written.
    #[fieldx(default(10_000))]
    pub cache: usize,

    /// Period of write buffer flushes. Zero disables buffering: every write goes straight to the backend.
    #[fieldx(default(Duration::from_millis(100)))]
    pub write_interval: Duration,

    /// Store values as JSON. When off, only string values are accepted.
    #[fieldx(default(true))]
    pub json: bool,

    /// Maximum number of operations sent to the backend by one flush call; 0 for no limit.
    #[fieldx(default(0))]
    pub bulk_limit: usize,
}

impl Settings {
    #[inline]
    pub fn buffering(&self) -> bool {
        !self.write_interval.is_zero()
    }
}
