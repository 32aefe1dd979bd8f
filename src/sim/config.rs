use std::{str::FromStr, time::Duration};

use crate::{
    core::{ConfigError, Ticks},
    scheduler::DEFAULT_QUANTUM,
};

pub const PAGE_SIZE: usize = 4 * 1024;
pub const TOTAL_MEMORY: usize = 128 * 1024;
pub const DEFAULT_BURST: Ticks = 5;
pub const DEFAULT_PAGES: usize = 2;
pub const BUFFER_CAPACITY: usize = 5;
pub const DEFAULT_ITEMS: usize = 5;

/// Settings for one shell session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub total_memory: usize,
    pub page_size: usize,
    pub quantum: Ticks,
    pub default_burst: Ticks,
    pub default_pages: usize,
    pub buffer_capacity: usize,
    pub default_items: usize,
    pub tick_duration: Duration,
    pub item_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_memory: TOTAL_MEMORY,
            page_size: PAGE_SIZE,
            quantum: DEFAULT_QUANTUM,
            default_burst: DEFAULT_BURST,
            default_pages: DEFAULT_PAGES,
            buffer_capacity: BUFFER_CAPACITY,
            default_items: DEFAULT_ITEMS,
            tick_duration: Duration::ZERO,
            item_delay: Duration::ZERO,
        }
    }
}

impl SessionConfig {
    pub fn page_capacity(&self) -> Result<usize, ConfigError> {
        if self.page_size == 0 || self.page_size > self.total_memory {
            return Err(ConfigError::PageSize {
                total_memory: self.total_memory,
                page_size: self.page_size,
            });
        }
        Ok(self.total_memory / self.page_size)
    }

    /// Defaults overridden by `PROCSIM_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = parse(&lookup, "PROCSIM_TOTAL_MEMORY")? {
            config.total_memory = v;
        }
        if let Some(v) = parse(&lookup, "PROCSIM_PAGE_SIZE")? {
            config.page_size = v;
        }
        // Clamped like `set quantum`
        if let Some(v) = parse::<i64>(&lookup, "PROCSIM_QUANTUM")? {
            config.quantum = Ticks::try_from(v).unwrap_or(0).max(1);
        }
        if let Some(v) = parse(&lookup, "PROCSIM_BURST")? {
            config.default_burst = v;
        }
        if let Some(v) = parse(&lookup, "PROCSIM_PAGES")? {
            config.default_pages = v;
        }
        if let Some(v) = parse(&lookup, "PROCSIM_BUFFER")? {
            config.buffer_capacity = v;
        }
        if let Some(v) = parse(&lookup, "PROCSIM_ITEMS")? {
            config.default_items = v;
        }
        if let Some(ms) = parse(&lookup, "PROCSIM_TICK_MS")? {
            config.tick_duration = Duration::from_millis(ms);
        }
        if let Some(ms) = parse(&lookup, "PROCSIM_ITEM_DELAY_MS")? {
            config.item_delay = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacity = self.page_capacity()?;
        if self.default_burst == 0 {
            return Err(ConfigError::Burst(0));
        }
        if self.default_pages > capacity {
            return Err(ConfigError::PageCount {
                requested: i64::try_from(self.default_pages).unwrap_or(i64::MAX),
                capacity,
            });
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::BufferCapacity(0));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { name, value }),
    }
}
