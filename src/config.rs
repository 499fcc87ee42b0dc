//! TOML configuration for the exchange daemon.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! a working exchange: one `TEST` underlying, built-in role constraints,
//! and a market that is always open in continuous trading.

use chrono::{FixedOffset, NaiveDate, NaiveTime, Weekday};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::instruments::{Instrument, OptionType};
use crate::phase::{ExecutionStyle, Phase, PhaseSchedule, PhaseState, PhaseWindow};
use crate::pipeline::PipelineSettings;
use crate::teams::Role;
use crate::validation::{ConstraintKind, ConstraintRule, ConstraintSet, OrderTypeKind};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read the file
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Not valid TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Structurally valid TOML with an invalid value
    #[error("invalid config value for {field}: {message}")]
    Invalid {
        /// Dotted path of the offending option
        field: String,
        /// What was wrong with it
        message: String,
    },
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Phase manager poll interval in seconds
    pub phase_check_interval: Option<f64>,
    /// Ingress enqueue timeout in seconds before a 503
    pub order_queue_timeout: Option<f64>,
    /// Pending-request table tunables
    pub response_coordinator: CoordinatorConfig,
    /// Phase schedule and timezone
    pub market_phases: MarketPhasesConfig,
    /// Per-role constraint lists; absent roles use the built-ins
    pub roles: HashMap<String, RoleConfig>,
    /// Listed instruments; empty lists the default `TEST` underlying
    pub instruments: Vec<InstrumentConfig>,
}

/// `[response_coordinator]` table.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Seconds a REST caller waits before a 504
    pub default_timeout_seconds: Option<f64>,
    /// Hard cap on concurrently pending requests
    pub max_pending_requests: Option<usize>,
    /// Seconds between sweeps of abandoned records
    pub cleanup_interval_seconds: Option<f64>,
}

/// `[market_phases]` table.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MarketPhasesConfig {
    /// Fixed UTC-offset timezone, e.g. `"UTC"` or `"-05:00"`
    pub timezone: Option<String>,
    /// Per-phase windows keyed by phase name
    pub schedule: HashMap<String, PhaseWindowConfig>,
}

/// One `[market_phases.schedule.<phase>]` window.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PhaseWindowConfig {
    /// Inclusive local start, `"HH:MM"` or `"HH:MM:SS"`
    pub start_time: Option<String>,
    /// Exclusive local end
    pub end_time: Option<String>,
    /// Weekday names; default Monday through Friday
    pub weekdays: Option<Vec<String>>,
    /// Override the phase's default submit gate
    pub submit_allowed: Option<bool>,
    /// Override the phase's default cancel gate
    pub cancel_allowed: Option<bool>,
    /// Override the phase's default matching gate
    pub match_enabled: Option<bool>,
    /// Override the phase's default execution style
    pub execution_style: Option<String>,
}

/// `[roles.<role>]` table.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RoleConfig {
    /// Ordered constraint list for the role
    pub constraints: Vec<ConstraintConfig>,
}

/// One entry of a role's constraint list. Parameters are flat and
/// optional; each constraint type picks the ones it needs.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConstraintConfig {
    /// Constraint type name
    #[serde(rename = "type")]
    pub kind: String,
    /// Stable rejection code
    pub error_code: Option<String>,
    /// Human-readable rejection text
    pub error_message: Option<String>,
    /// position_limit / portfolio_limit bound
    pub max: Option<i64>,
    /// position_limit: bound the absolute value
    pub symmetric: Option<bool>,
    /// instrument_allowed whitelist
    pub instruments: Option<Vec<String>>,
    /// order_rate cap
    pub max_per_second: Option<usize>,
    /// order_type whitelist
    pub allowed_types: Option<Vec<String>>,
    /// price_range band in percent
    pub max_pct_from_mid: Option<f64>,
    /// portfolio_limit bound (alias of `max` for that type)
    pub max_total: Option<i64>,
}

/// One `[[instruments]]` entry.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Trading symbol
    pub symbol: String,
    /// Strike in dollars, options only
    pub strike: Option<f64>,
    /// Expiry date `YYYY-MM-DD`, options only
    pub expiry: Option<String>,
    /// `call`, `put`, or `underlying` (default)
    pub option_type: Option<String>,
    /// Underlying symbol; defaults to the symbol itself
    pub underlying: Option<String>,
}

impl ExchangeConfig {
    /// Load and parse a TOML config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Ingress enqueue timeout.
    pub fn order_queue_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.order_queue_timeout.unwrap_or(1.0))
    }

    /// REST caller timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(
            self.response_coordinator
                .default_timeout_seconds
                .unwrap_or(5.0),
        )
    }

    /// Pending-request table cap.
    pub fn max_pending_requests(&self) -> usize {
        self.response_coordinator.max_pending_requests.unwrap_or(1000)
    }

    /// Everything the pipeline composition root needs.
    pub fn pipeline_settings(&self) -> Result<PipelineSettings, ConfigError> {
        Ok(PipelineSettings {
            queue_capacity: 1024,
            phase_check_interval: Duration::from_secs_f64(
                self.phase_check_interval.unwrap_or(0.1),
            ),
            cleanup_interval: Duration::from_secs_f64(
                self.response_coordinator
                    .cleanup_interval_seconds
                    .unwrap_or(10.0),
            ),
            schedule: self.phase_schedule()?,
        })
    }

    /// Build the weekly phase schedule. An empty schedule table is an
    /// always-open market.
    pub fn phase_schedule(&self) -> Result<PhaseSchedule, ConfigError> {
        let timezone = parse_timezone(self.market_phases.timezone.as_deref().unwrap_or("UTC"))?;
        if self.market_phases.schedule.is_empty() {
            return Ok(PhaseSchedule::always_open());
        }

        // Fixed evaluation order so overlaps resolve deterministically.
        let mut windows = Vec::new();
        for phase in [Phase::PreOpen, Phase::OpeningAuction, Phase::Continuous, Phase::Closed] {
            let name = phase.to_string();
            let Some(window) = self.market_phases.schedule.get(&name) else {
                continue;
            };
            let field = format!("market_phases.schedule.{name}");
            let mut state = PhaseState::for_phase(phase);
            if let Some(submit_allowed) = window.submit_allowed {
                state.submit_allowed = submit_allowed;
            }
            if let Some(cancel_allowed) = window.cancel_allowed {
                state.cancel_allowed = cancel_allowed;
            }
            if let Some(match_enabled) = window.match_enabled {
                state.match_enabled = match_enabled;
            }
            if let Some(style) = window.execution_style.as_deref() {
                state.execution_style = parse_execution_style(style, &field)?;
            }
            windows.push(PhaseWindow {
                state,
                weekdays: parse_weekdays(window.weekdays.as_deref(), &field)?,
                start: parse_time(
                    window.start_time.as_deref().unwrap_or("00:00"),
                    &format!("{field}.start_time"),
                )?,
                end: parse_time(
                    window.end_time.as_deref().unwrap_or("23:59:59"),
                    &format!("{field}.end_time"),
                )?,
            });
        }
        for name in self.market_phases.schedule.keys() {
            if !matches!(
                name.as_str(),
                "pre_open" | "opening_auction" | "continuous" | "closed"
            ) {
                return Err(invalid(
                    "market_phases.schedule",
                    format!("unknown phase {name}"),
                ));
            }
        }
        Ok(PhaseSchedule::new(timezone, windows))
    }

    /// Build the per-role constraint sets. Roles absent from the config
    /// use the built-in defaults.
    pub fn constraint_sets(&self) -> Result<HashMap<Role, ConstraintSet>, ConfigError> {
        for name in self.roles.keys() {
            name.parse::<Role>()
                .map_err(|e| invalid("roles", e.to_string()))?;
        }
        let mut sets = HashMap::new();
        for role in Role::ALL {
            let set = match self.roles.get(role.as_str()) {
                Some(role_config) => {
                    let mut rules = Vec::with_capacity(role_config.constraints.len());
                    for (index, entry) in role_config.constraints.iter().enumerate() {
                        let field = format!("roles.{}.constraints[{index}]", role.as_str());
                        rules.push(build_rule(entry, &field)?);
                    }
                    ConstraintSet::new(rules)
                }
                None => default_constraints(role),
            };
            sets.insert(role, set);
        }
        Ok(sets)
    }

    /// Build the instrument list. An empty list yields one `TEST`
    /// underlying.
    pub fn instrument_list(&self) -> Result<Vec<Instrument>, ConfigError> {
        if self.instruments.is_empty() {
            return Ok(vec![Instrument::underlying("TEST")]);
        }
        let mut instruments = Vec::with_capacity(self.instruments.len());
        for (index, entry) in self.instruments.iter().enumerate() {
            let field = format!("instruments[{index}]");
            if entry.symbol.is_empty() {
                return Err(invalid(&field, "symbol is required"));
            }
            let option_type = match entry.option_type.as_deref().unwrap_or("underlying") {
                "call" => OptionType::Call,
                "put" => OptionType::Put,
                "underlying" => OptionType::Underlying,
                other => return Err(invalid(&field, format!("unknown option_type {other}"))),
            };
            let strike = entry
                .strike
                .map(|dollars| (dollars * 100.0).round() as u64);
            let expiry = entry
                .expiry
                .as_deref()
                .map(|text| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .map_err(|e| invalid(&format!("{field}.expiry"), e.to_string()))
                })
                .transpose()?;
            let underlying = entry.underlying.clone().unwrap_or_else(|| entry.symbol.clone());
            if option_type != OptionType::Underlying && (strike.is_none() || expiry.is_none()) {
                return Err(invalid(&field, "options require strike and expiry"));
            }
            instruments.push(Instrument {
                symbol: entry.symbol.clone(),
                strike,
                expiry,
                option_type,
                underlying,
            });
        }
        Ok(instruments)
    }
}

/// Built-in constraint sets, used when a role has no config entry.
pub fn default_constraints(role: Role) -> ConstraintSet {
    let prefix = match role {
        Role::MarketMaker => "MM",
        Role::HedgeFund => "HF",
        Role::ArbitrageDesk => "ARB",
        Role::Retail => "RETAIL",
    };
    let (position_max, rate_max) = match role {
        Role::MarketMaker => (50, 100),
        Role::HedgeFund => (150, 50),
        Role::ArbitrageDesk => (100, 50),
        Role::Retail => (25, 10),
    };
    let mut rules = vec![
        ConstraintRule::new(
            ConstraintKind::PositionLimit {
                max: position_max,
                symmetric: true,
            },
            format!("{prefix}_POS_LIMIT"),
            format!("position limit of {position_max} exceeded"),
        ),
        ConstraintRule::new(
            ConstraintKind::OrderRate {
                max_per_second: rate_max,
            },
            format!("{prefix}_RATE_LIMIT"),
            format!("order rate limit of {rate_max}/s exceeded"),
        ),
    ];
    if role == Role::Retail {
        rules.push(ConstraintRule::new(
            ConstraintKind::OrderType {
                allowed: vec![OrderTypeKind::Limit, OrderTypeKind::Market],
            },
            "RETAIL_ORDER_TYPE",
            "order type not permitted for retail",
        ));
    }
    ConstraintSet::new(rules)
}

fn build_rule(entry: &ConstraintConfig, field: &str) -> Result<ConstraintRule, ConfigError> {
    let require_i64 = |value: Option<i64>, name: &str| {
        value.ok_or_else(|| invalid(field, format!("{} requires {name}", entry.kind)))
    };
    let kind = match entry.kind.as_str() {
        "position_limit" => ConstraintKind::PositionLimit {
            max: require_i64(entry.max, "max")?,
            symmetric: entry.symmetric.unwrap_or(true),
        },
        "instrument_allowed" => ConstraintKind::InstrumentAllowed {
            whitelist: entry
                .instruments
                .clone()
                .ok_or_else(|| invalid(field, "instrument_allowed requires instruments"))?,
        },
        "order_rate" => ConstraintKind::OrderRate {
            max_per_second: entry
                .max_per_second
                .ok_or_else(|| invalid(field, "order_rate requires max_per_second"))?,
        },
        "order_type" => {
            let names = entry
                .allowed_types
                .as_deref()
                .ok_or_else(|| invalid(field, "order_type requires allowed_types"))?;
            let mut allowed = Vec::with_capacity(names.len());
            for name in names {
                allowed.push(match name.as_str() {
                    "limit" => OrderTypeKind::Limit,
                    "market" => OrderTypeKind::Market,
                    "quote" => OrderTypeKind::Quote,
                    other => return Err(invalid(field, format!("unknown order type {other}"))),
                });
            }
            ConstraintKind::OrderType { allowed }
        }
        "price_range" => ConstraintKind::PriceRange {
            max_pct_from_mid: entry
                .max_pct_from_mid
                .ok_or_else(|| invalid(field, "price_range requires max_pct_from_mid"))?,
        },
        "portfolio_limit" => ConstraintKind::PortfolioLimit {
            max_total: require_i64(entry.max_total.or(entry.max), "max_total")?,
        },
        other => return Err(invalid(field, format!("unknown constraint type {other}"))),
    };
    let default_code = entry.kind.to_uppercase();
    Ok(ConstraintRule::new(
        kind,
        entry.error_code.clone().unwrap_or(default_code),
        entry
            .error_message
            .clone()
            .unwrap_or_else(|| format!("{} constraint violated", entry.kind)),
    ))
}

fn parse_timezone(text: &str) -> Result<FixedOffset, ConfigError> {
    let field = "market_phases.timezone";
    if text.eq_ignore_ascii_case("utc") || text == "Z" || text == "+00:00" {
        return Ok(FixedOffset::east_opt(0).expect("zero offset is valid"));
    }
    let (sign, rest) = if let Some(rest) = text.strip_prefix('+') {
        (1i32, rest)
    } else if let Some(rest) = text.strip_prefix('-') {
        (-1i32, rest)
    } else {
        return Err(invalid(field, format!("expected UTC or +/-HH:MM, got {text}")));
    };
    let mut parts = rest.splitn(2, ':');
    let hours: i32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| invalid(field, format!("bad offset hours in {text}")))?;
    let minutes: i32 = parts
        .next()
        .map(|p| p.parse())
        .transpose()
        .map_err(|_| invalid(field, format!("bad offset minutes in {text}")))?
        .unwrap_or(0);
    if !(0..=14).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(invalid(field, format!("offset out of range: {text}")));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| invalid(field, format!("offset out of range: {text}")))
}

fn parse_time(text: &str, field: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|_| invalid(field, format!("expected HH:MM or HH:MM:SS, got {text}")))
}

fn parse_weekdays(names: Option<&[String]>, field: &str) -> Result<Vec<Weekday>, ConfigError> {
    let Some(names) = names else {
        return Ok(vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ]);
    };
    let mut weekdays = Vec::with_capacity(names.len());
    for name in names {
        weekdays.push(match name.to_ascii_lowercase().as_str() {
            "mon" | "monday" => Weekday::Mon,
            "tue" | "tuesday" => Weekday::Tue,
            "wed" | "wednesday" => Weekday::Wed,
            "thu" | "thursday" => Weekday::Thu,
            "fri" | "friday" => Weekday::Fri,
            "sat" | "saturday" => Weekday::Sat,
            "sun" | "sunday" => Weekday::Sun,
            other => return Err(invalid(field, format!("unknown weekday {other}"))),
        });
    }
    Ok(weekdays)
}

fn parse_execution_style(text: &str, field: &str) -> Result<ExecutionStyle, ConfigError> {
    match text {
        "none" => Ok(ExecutionStyle::None),
        "batch" => Ok(ExecutionStyle::Batch),
        "continuous" => Ok(ExecutionStyle::Continuous),
        other => Err(invalid(field, format!("unknown execution style {other}"))),
    }
}
