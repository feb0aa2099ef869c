//! Simulation configuration module.
//!
//! This module loads the parameters of a run from environment variables.
//!
//! # Environment Variables
//!
//! - `TOYSSD_BUS_LATENCY`: ticks per bus transfer (default: `1`, must be at least 1)
//! - `TOYSSD_BUS_LANES`: transfers the bus carries at once (default: `1`, must be at least 1)
//! - `TOYSSD_DIRECT_LINK`: `true` connects hosts to storage without a bus (default: `false`)
//! - `TOYSSD_STORAGE_CONCURRENCY`: device command slots (default: `1`, must be at least 1)
//! - `TOYSSD_WRITE_DELAY`: device processing ticks per write (default: `0`)
//! - `TOYSSD_READ_DELAY`: device processing ticks per read (default: `0`)
//! - `TOYSSD_HOSTS`: number of hosts (default: `1`, must be at least 1)
//! - `TOYSSD_WRITES_PER_ROUND`: writes per workload round (default: `1`)
//! - `TOYSSD_READS_PER_ROUND`: reads per workload round (default: `1`)
//! - `TOYSSD_ROUNDS`: rounds per host, `0` for unbounded (default: `1`)
//! - `TOYSSD_DURATION`: stop the run at this tick (default: unset)
//! - `TOYSSD_ADDRESS_PATTERN`: `sequential` or `random` (default: `sequential`)
//! - `TOYSSD_ADDRESS_SPAN`: address range of the random pattern (default: `1024`)
//! - `TOYSSD_SEED`: seed of the random pattern (default: `0`)
//! - `TOYSSD_INTERRUPT_AT`: `host@tick`, interrupt that host at that tick (default: unset)
//!
//! # Invariants
//!
//! - Values are never clamped: a zero capacity or latency is an error, not
//!   a silent 1.
//! - A run is always bounded, by a round count, a duration, or both.

use std::str::FromStr;

use crate::workload::{AddressPattern, WorkloadConfig};

/// Bus parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Ticks each transfer holds a lane.
    pub latency: u64,
    /// Transfers in flight at once.
    pub lanes: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            latency: SimConfig::DEFAULT_BUS_LATENCY,
            lanes: SimConfig::DEFAULT_BUS_LANES,
        }
    }
}

/// Storage device parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Commands the device processes at once.
    pub concurrency: usize,
    /// Processing ticks per write.
    pub write_delay: u64,
    /// Processing ticks per read.
    pub read_delay: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            concurrency: SimConfig::DEFAULT_STORAGE_CONCURRENCY,
            write_delay: 0,
            read_delay: 0,
        }
    }
}

/// A scheduled interrupt of one host's process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptAt {
    pub host: usize,
    pub tick: u64,
}

/// Full configuration of a simulated system.
///
/// # Pre-conditions
///
/// When constructed via `from_env()`, every variable that is set must parse.
///
/// # Post-conditions
///
/// A config returned by `from_env()` or `from_lookup()` has passed
/// [`validate`](Self::validate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    pub bus: BusConfig,
    /// Connect hosts to storage directly, with no transfer cost.
    pub direct_link: bool,
    pub storage: StorageConfig,
    pub hosts: usize,
    pub workload: WorkloadConfig,
    /// Stop the run at this tick even if work remains.
    pub duration: Option<u64>,
    pub interrupt: Option<InterruptAt>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            direct_link: false,
            storage: StorageConfig::default(),
            hosts: Self::DEFAULT_HOSTS,
            workload: WorkloadConfig::default(),
            duration: None,
            interrupt: None,
        }
    }
}

/// Error returned when a configuration value is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable has a value that does not parse or is out of range.
    InvalidValue { name: String, message: String },
    /// A resource was given a capacity of zero.
    ZeroCapacity { resource: String },
    /// A transfer medium was given a latency of zero.
    ZeroLatency { resource: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
            Self::ZeroCapacity { resource } => {
                write!(f, "{resource} capacity must be at least 1")
            }
            Self::ZeroLatency { resource } => {
                write!(f, "{resource} latency must be at least 1 tick")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl SimConfig {
    pub const DEFAULT_BUS_LATENCY: u64 = 1;
    pub const DEFAULT_BUS_LANES: usize = 1;
    pub const DEFAULT_STORAGE_CONCURRENCY: usize = 1;
    pub const DEFAULT_HOSTS: usize = 1;
    pub const DEFAULT_WRITES_PER_ROUND: u64 = 1;
    pub const DEFAULT_READS_PER_ROUND: u64 = 1;
    pub const DEFAULT_ROUNDS: u64 = 1;
    pub const DEFAULT_ADDRESS_SPAN: u64 = 1024;

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that does not parse,
    /// or if the resulting configuration fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bus = BusConfig {
            latency: load_number(&lookup, "TOYSSD_BUS_LATENCY", Self::DEFAULT_BUS_LATENCY)?,
            lanes: load_number(&lookup, "TOYSSD_BUS_LANES", Self::DEFAULT_BUS_LANES)?,
        };
        let storage = StorageConfig {
            concurrency: load_number(
                &lookup,
                "TOYSSD_STORAGE_CONCURRENCY",
                Self::DEFAULT_STORAGE_CONCURRENCY,
            )?,
            write_delay: load_number(&lookup, "TOYSSD_WRITE_DELAY", 0)?,
            read_delay: load_number(&lookup, "TOYSSD_READ_DELAY", 0)?,
        };
        let rounds = load_number(&lookup, "TOYSSD_ROUNDS", Self::DEFAULT_ROUNDS)?;
        let workload = WorkloadConfig {
            writes_per_round: load_number(
                &lookup,
                "TOYSSD_WRITES_PER_ROUND",
                Self::DEFAULT_WRITES_PER_ROUND,
            )?,
            reads_per_round: load_number(
                &lookup,
                "TOYSSD_READS_PER_ROUND",
                Self::DEFAULT_READS_PER_ROUND,
            )?,
            rounds: (rounds > 0).then_some(rounds),
            pattern: load_pattern(&lookup)?,
        };

        let config = Self {
            bus,
            direct_link: load_flag(&lookup, "TOYSSD_DIRECT_LINK")?,
            storage,
            hosts: load_number(&lookup, "TOYSSD_HOSTS", Self::DEFAULT_HOSTS)?,
            workload,
            duration: load_optional_number(&lookup, "TOYSSD_DURATION")?,
            interrupt: load_interrupt(&lookup)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration can build a system that terminates.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroLatency`] / [`ConfigError::ZeroCapacity`] for a
    ///   zero bus latency or lane count (unless `direct_link`), a zero
    ///   storage concurrency, or zero hosts.
    /// - [`ConfigError::InvalidValue`] for an unbounded run, an empty random
    ///   address span, or an interrupt aimed at a host that does not exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.direct_link {
            if self.bus.latency == 0 {
                return Err(ConfigError::ZeroLatency {
                    resource: "bus".to_string(),
                });
            }
            if self.bus.lanes == 0 {
                return Err(ConfigError::ZeroCapacity {
                    resource: "bus".to_string(),
                });
            }
        }
        if self.storage.concurrency == 0 {
            return Err(ConfigError::ZeroCapacity {
                resource: "storage".to_string(),
            });
        }
        if self.hosts == 0 {
            return Err(ConfigError::ZeroCapacity {
                resource: "host pool".to_string(),
            });
        }
        if self.workload.rounds.is_none() {
            if self.duration.is_none() {
                return Err(invalid(
                    "TOYSSD_ROUNDS",
                    "unbounded rounds require TOYSSD_DURATION",
                ));
            }
            if self.workload.writes_per_round == 0 && self.workload.reads_per_round == 0 {
                return Err(invalid(
                    "TOYSSD_ROUNDS",
                    "unbounded rounds need at least one operation per round",
                ));
            }
        }
        self.workload.validate()?;
        if let Some(interrupt) = self.interrupt {
            if interrupt.host >= self.hosts {
                return Err(invalid(
                    "TOYSSD_INTERRUPT_AT",
                    &format!(
                        "host {} does not exist ({} configured)",
                        interrupt.host, self.hosts
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn invalid(name: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        message: message.to_string(),
    }
}

/// Load a number, falling back to `default` when the variable is unset.
///
/// # Errors
///
/// Returns an error if the value is set but does not parse.
fn load_number<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    load_optional_number(lookup, name).map(|value| value.unwrap_or(default))
}

fn load_optional_number<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(name, &format!("'{value}' is not a valid number"))),
        None => Ok(None),
    }
}

fn load_flag<F>(lookup: &F, name: &str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).as_deref().map(str::trim) {
        None | Some("" | "0" | "false") => Ok(false),
        Some("1" | "true") => Ok(true),
        Some(other) => Err(invalid(name, &format!("'{other}' is not true or false"))),
    }
}

/// Load the address pattern. The span and seed only matter for `random`.
fn load_pattern<F>(lookup: &F) -> Result<AddressPattern, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let name = "TOYSSD_ADDRESS_PATTERN";
    match lookup(name).as_deref().map(str::trim) {
        None | Some("sequential") => Ok(AddressPattern::Sequential),
        Some("random") => Ok(AddressPattern::Random {
            seed: load_number(lookup, "TOYSSD_SEED", 0)?,
            span: load_number(lookup, "TOYSSD_ADDRESS_SPAN", SimConfig::DEFAULT_ADDRESS_SPAN)?,
        }),
        Some(other) => Err(invalid(
            name,
            &format!("'{other}' is not sequential or random"),
        )),
    }
}

/// Load `host@tick`.
fn load_interrupt<F>(lookup: &F) -> Result<Option<InterruptAt>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let name = "TOYSSD_INTERRUPT_AT";
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    let malformed = || invalid(name, &format!("'{value}' is not of the form host@tick"));
    let (host, tick) = value.trim().split_once('@').ok_or_else(malformed)?;
    Ok(Some(InterruptAt {
        host: host.parse().map_err(|_| malformed())?,
        tick: tick.parse().map_err(|_| malformed())?,
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = SimConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.bus.latency, 1);
        assert_eq!(config.bus.lanes, 1);
        assert_eq!(config.storage.concurrency, 1);
        assert_eq!(config.workload.rounds, Some(1));
        assert_eq!(config.workload.pattern, AddressPattern::Sequential);
    }

    #[test]
    fn test_reads_every_variable() {
        let config = SimConfig::from_lookup(lookup(&[
            ("TOYSSD_BUS_LATENCY", "4"),
            ("TOYSSD_BUS_LANES", "2"),
            ("TOYSSD_STORAGE_CONCURRENCY", "3"),
            ("TOYSSD_WRITE_DELAY", "1"),
            ("TOYSSD_READ_DELAY", "2"),
            ("TOYSSD_HOSTS", "2"),
            ("TOYSSD_WRITES_PER_ROUND", "5"),
            ("TOYSSD_READS_PER_ROUND", "6"),
            ("TOYSSD_ROUNDS", "0"),
            ("TOYSSD_DURATION", "100"),
            ("TOYSSD_ADDRESS_PATTERN", "random"),
            ("TOYSSD_ADDRESS_SPAN", "64"),
            ("TOYSSD_SEED", "99"),
            ("TOYSSD_INTERRUPT_AT", "1@61"),
        ]))
        .unwrap();

        assert_eq!(config.bus, BusConfig { latency: 4, lanes: 2 });
        assert_eq!(
            config.storage,
            StorageConfig {
                concurrency: 3,
                write_delay: 1,
                read_delay: 2,
            }
        );
        assert_eq!(config.hosts, 2);
        assert_eq!(config.workload.writes_per_round, 5);
        assert_eq!(config.workload.reads_per_round, 6);
        assert_eq!(config.workload.rounds, None);
        assert_eq!(config.duration, Some(100));
        assert_eq!(
            config.workload.pattern,
            AddressPattern::Random { seed: 99, span: 64 }
        );
        assert_eq!(config.interrupt, Some(InterruptAt { host: 1, tick: 61 }));
    }

    #[test]
    fn test_zero_latency_is_rejected_not_clamped() {
        let error = SimConfig::from_lookup(lookup(&[("TOYSSD_BUS_LATENCY", "0")])).unwrap_err();
        assert_eq!(
            error,
            ConfigError::ZeroLatency {
                resource: "bus".to_string()
            }
        );
    }

    #[test]
    fn test_direct_link_ignores_bus_settings() {
        let config = SimConfig::from_lookup(lookup(&[
            ("TOYSSD_DIRECT_LINK", "true"),
            ("TOYSSD_BUS_LATENCY", "0"),
        ]))
        .unwrap();
        assert!(config.direct_link);
    }

    #[test]
    fn test_zero_capacities_rejected() {
        for name in ["TOYSSD_BUS_LANES", "TOYSSD_STORAGE_CONCURRENCY", "TOYSSD_HOSTS"] {
            let error = SimConfig::from_lookup(lookup(&[(name, "0")])).unwrap_err();
            assert!(
                matches!(error, ConfigError::ZeroCapacity { .. }),
                "{name}: {error}"
            );
        }
    }

    #[test]
    fn test_unbounded_run_rejected() {
        let error = SimConfig::from_lookup(lookup(&[("TOYSSD_ROUNDS", "0")])).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { ref name, .. } if name == "TOYSSD_ROUNDS"));
    }

    #[test]
    fn test_zero_address_span_rejected() {
        let error = SimConfig::from_lookup(lookup(&[
            ("TOYSSD_ADDRESS_PATTERN", "random"),
            ("TOYSSD_ADDRESS_SPAN", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { ref name, .. } if name == "TOYSSD_ADDRESS_SPAN"));
    }

    #[test]
    fn test_malformed_values() {
        let cases = [
            ("TOYSSD_BUS_LATENCY", "fast"),
            ("TOYSSD_DIRECT_LINK", "maybe"),
            ("TOYSSD_ADDRESS_PATTERN", "zigzag"),
            ("TOYSSD_INTERRUPT_AT", "61"),
            ("TOYSSD_INTERRUPT_AT", "a@b"),
            ("TOYSSD_INTERRUPT_AT", "3@10"),
        ];
        for (name, value) in cases {
            let error = SimConfig::from_lookup(lookup(&[(name, value)])).unwrap_err();
            assert!(
                matches!(error, ConfigError::InvalidValue { name: ref n, .. } if n == name),
                "{name}={value}: {error}"
            );
        }
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::InvalidValue {
            name: "TEST_VAR".to_string(),
            message: "bad value".to_string(),
        };
        assert_eq!(error.to_string(), "invalid value for TEST_VAR: bad value");
        assert_eq!(
            ConfigError::ZeroCapacity {
                resource: "bus".to_string()
            }
            .to_string(),
            "bus capacity must be at least 1"
        );
    }
}
