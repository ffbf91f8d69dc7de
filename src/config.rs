use super::errors::ConfigError;
use std::env;
use tokio::time::Duration;


pub const ENV_QUEUE_CAPACITY: &str = "DISPATCH_QUEUE_CAPACITY";
pub const ENV_DEADLINE_MS: &str = "DISPATCH_DEADLINE_MS";
pub const ENV_PROCESS_TIMEOUT_MS: &str = "DISPATCH_PROCESS_TIMEOUT_MS";
pub const ENV_DRAIN_TIMEOUT_MS: &str = "DISPATCH_DRAIN_TIMEOUT_MS";

/// Конфигурация диспетчера
#[derive(Debug, Clone)]
pub struct Config {
    /// Ёмкость канала задач. При заполнении `submit` ждёт места
    pub queue_capacity: usize,
    /// Дедлайн для `submit_default`
    pub default_deadline: Duration,
    /// Жёсткий предел на обработку одной задачи воркером
    pub process_timeout: Option<Duration>,
    /// Сколько ждать дренажа очереди при shutdown. `None` - сколько угодно
    pub drain_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            queue_capacity: num_cpus * 20,
            default_deadline: Duration::from_secs(5),
            process_timeout: None,
            drain_timeout: None,
        }
    }
}

impl Config {
    pub fn low_latency() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            queue_capacity: num_cpus * 4,
            default_deadline: Duration::from_millis(500),
            process_timeout: Some(Duration::from_millis(250)),
            drain_timeout: Some(Duration::from_secs(5)),
        }
    }

    pub fn high_throughput() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            queue_capacity: num_cpus * 256,
            default_deadline: Duration::from_secs(30),
            process_timeout: Some(Duration::from_secs(60)),
            drain_timeout: None,
        }
    }

    /// Читает конфигурацию из переменных окружения, недостающее берёт из `Default`
    ///
    /// - `DISPATCH_QUEUE_CAPACITY`: ёмкость очереди (> 0)
    /// - `DISPATCH_DEADLINE_MS`: дедлайн по умолчанию (> 0)
    /// - `DISPATCH_PROCESS_TIMEOUT_MS`: предел обработки задачи, 0 - без предела
    /// - `DISPATCH_DRAIN_TIMEOUT_MS`: предел дренажа при shutdown, 0 - без предела
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(capacity) = parse_u64(&lookup, ENV_QUEUE_CAPACITY)? {
            if capacity == 0 {
                return Err(ConfigError::Zero { key: ENV_QUEUE_CAPACITY.into() });
            }
            config.queue_capacity = capacity as usize;
        }
        if let Some(ms) = parse_u64(&lookup, ENV_DEADLINE_MS)? {
            if ms == 0 {
                return Err(ConfigError::Zero { key: ENV_DEADLINE_MS.into() });
            }
            config.default_deadline = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, ENV_PROCESS_TIMEOUT_MS)? {
            config.process_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = parse_u64(&lookup, ENV_DRAIN_TIMEOUT_MS)? {
            config.drain_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        Ok(config)
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber {
                key: key.to_string(),
                value: raw,
            }),
    }
}
