//! Team registry: roles, API-key issuance, and authentication.

use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::fees::FeeSchedule;

/// Opaque team identifier (a UUID string issued at registration).
pub type TeamId = String;

/// Trading roles recognized by the exchange. Each role carries a fee
/// schedule and, via configuration, a constraint set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Obligated liquidity provider; earns the largest maker rebate
    MarketMaker,
    /// Directional desk
    HedgeFund,
    /// Cross-instrument arbitrageur
    ArbitrageDesk,
    /// Simulated retail flow; pays fees on both sides
    Retail,
}

impl Role {
    /// The built-in fee schedule for this role, in cents per contract.
    /// Positive maker rates are rebates; negative taker rates are charges.
    #[must_use]
    pub fn fee_schedule(&self) -> FeeSchedule {
        match self {
            Role::MarketMaker => FeeSchedule::new(2, -1),
            Role::HedgeFund => FeeSchedule::new(1, -2),
            Role::ArbitrageDesk => FeeSchedule::new(1, -2),
            Role::Retail => FeeSchedule::new(-1, -3),
        }
    }

    /// All roles, in registry order.
    pub const ALL: [Role; 4] = [
        Role::MarketMaker,
        Role::HedgeFund,
        Role::ArbitrageDesk,
        Role::Retail,
    ];

    /// Stable lowercase name, matching the wire and config spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::MarketMaker => "market_maker",
            Role::HedgeFund => "hedge_fund",
            Role::ArbitrageDesk => "arbitrage_desk",
            Role::Retail => "retail",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market_maker" => Ok(Role::MarketMaker),
            "hedge_fund" => Ok(Role::HedgeFund),
            "arbitrage_desk" => Ok(Role::ArbitrageDesk),
            "retail" => Ok(Role::Retail),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Error for an unrecognized role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// A registered trading team.
#[derive(Debug, Clone, Serialize)]
pub struct Team {
    /// Stable team identifier
    pub team_id: TeamId,
    /// Display name provided at registration
    pub team_name: String,
    /// Trading role, fixed at registration
    pub role: Role,
    /// Opaque API key; never logged
    #[serde(skip_serializing)]
    pub api_key: String,
}

/// In-memory team store with lookup by API key and by team id.
///
/// Read-mostly: registration happens rarely, authentication on every
/// request, so the maps are concurrent and lock-free to readers.
#[derive(Debug, Default)]
pub struct TeamRegistry {
    by_key: DashMap<String, Arc<Team>>,
    by_id: DashMap<TeamId, Arc<Team>>,
}

impl TeamRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new team and issue its API key.
    pub fn register(&self, team_name: &str, role: Role) -> Arc<Team> {
        let team = Arc::new(Team {
            team_id: Uuid::new_v4().to_string(),
            team_name: team_name.to_string(),
            role,
            api_key: generate_api_key(),
        });
        self.by_key.insert(team.api_key.clone(), Arc::clone(&team));
        self.by_id.insert(team.team_id.clone(), Arc::clone(&team));
        info!("registered team {} ({}) as {}", team.team_name, team.team_id, role);
        team
    }

    /// Look up a team by its API key.
    pub fn authenticate(&self, api_key: &str) -> Option<Arc<Team>> {
        self.by_key.get(api_key).map(|entry| Arc::clone(&entry))
    }

    /// Look up a team by its team id.
    pub fn get(&self, team_id: &str) -> Option<Arc<Team>> {
        self.by_id.get(team_id).map(|entry| Arc::clone(&entry))
    }

    /// Number of registered teams.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether no teams are registered yet.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn generate_api_key() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("ox_{suffix}")
}
