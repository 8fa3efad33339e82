//! YAML run configuration
//!
//! Every section is optional and falls back to the stock crowdsale setup.
//! Large amounts are written as strings (underscores allowed) or numbers.
//!
//! ## Example
//!
//! ```yaml
//! accounts:
//!   users: ["owner", "beneficiary", "admin", "user2", "user3"]
//!   owner: "owner"
//!   beneficiary: "beneficiary"
//!   token_admin: "admin"
//! token:
//!   total_supply: "1_000_000_000_000_000_000_000_000_000"
//!   crowdsale_allowance: "650_000_000_000_000_000_000_000_000"
//!   admin_allowance: "350_000_000_000_000_000_000_000_000"
//! sale:
//!   funding_goal_ether: 10
//!   funding_cap_ether: 20
//!   min_contribution_wei: "100_000_000_000_000_000"
//!   start_time: 1000000
//!   duration_minutes: 60
//!   rate: 5000
//!   low_rate: 5000
//!   high_rate: 10000
//! run:
//!   steps: 25
//!   seed: "0xa3f5c8e1b2d94706"
//!   only: ["setRate", "contribute"]
//!   max_redraws: 1000
//!   redeploy:
//!     after_steps: 10
//!     sale:
//!       rate: 6000
//! ```

use crate::amount::ETHER;
use crate::catalog::{parse_operations, Operation};
use crate::model::{Accounts, SaleParams, TokenParams};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Complete generator configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzConfig {
    /// Accounts and roles
    pub accounts: Accounts,
    /// Initial token ledger
    pub token: TokenParams,
    /// First sale contract
    pub sale: SaleParams,
    /// Generation controls
    pub run: RunConfig,
}

/// Generation controls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of steps to generate
    pub steps: usize,
    /// Replay seed; drawn (and logged) when absent
    #[serde(with = "seed_hex", skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Restrict drawing to these operations; empty means all
    pub only: Vec<String>,
    /// Consecutive empty-domain draws tolerated before aborting
    pub max_redraws: usize,
    /// Deploy a successor sale part-way through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeploy: Option<RedeploySchedule>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            steps: 20,
            seed: None,
            only: Vec::new(),
            max_redraws: 1_000,
            redeploy: None,
        }
    }
}

/// When and how the successor sale is deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeploySchedule {
    /// Number of steps emitted before the redeploy step
    pub after_steps: usize,
    /// Constructor arguments of the successor
    #[serde(default)]
    pub sale: SaleParams,
}

impl FuzzConfig {
    /// Operations the generator may draw
    pub fn operations(&self) -> Result<Vec<Operation>> {
        Ok(parse_operations(&self.run.only)?)
    }
}

/// Seeds as hex strings, numbers accepted on input
mod seed_hex {
    use serde::{de, Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(seed) => serializer.collect_str(&format_args!("0x{:016x}", seed)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SeedVisitor;

        impl<'de> de::Visitor<'de> for SeedVisitor {
            type Value = Option<u64>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a seed as hex string or number")
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(None)
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(None)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Some(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(value)
                    .map(Some)
                    .map_err(|_| de::Error::custom(format!("negative seed: {}", value)))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                crate::orchestrator::rng::parse_seed(value)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid hex seed `{}`", value)))
            }
        }

        deserializer.deserialize_any(SeedVisitor)
    }
}

/// Parse a YAML configuration; an empty document yields the defaults
pub fn parse_config(yaml: &str) -> Result<FuzzConfig> {
    let config: FuzzConfig = if yaml.trim().is_empty() {
        FuzzConfig::default()
    } else {
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")?
    };

    validate_config(&config)?;

    Ok(config)
}

/// Read and parse a YAML configuration file
pub async fn load_config(path: impl AsRef<Path>) -> Result<FuzzConfig> {
    let path = path.as_ref();
    let yaml = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    parse_config(&yaml).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Validate configuration structure
pub fn validate_config(config: &FuzzConfig) -> Result<()> {
    validate_accounts(&config.accounts)?;
    validate_token(&config.token)?;
    validate_sale(&config.sale).context("Invalid sale section")?;

    anyhow::ensure!(config.run.max_redraws > 0, "max_redraws must be positive");
    config.operations().context("Invalid operation filter")?;

    if let Some(redeploy) = &config.run.redeploy {
        validate_sale(&redeploy.sale).context("Invalid redeploy sale section")?;
        anyhow::ensure!(
            redeploy.after_steps < config.run.steps,
            "Redeploy after {} steps never fires in a run of {} steps",
            redeploy.after_steps,
            config.run.steps
        );
    }

    Ok(())
}

fn validate_accounts(accounts: &Accounts) -> Result<()> {
    anyhow::ensure!(!accounts.users.is_empty(), "At least one user is required");

    let mut names = HashSet::new();
    for user in &accounts.users {
        anyhow::ensure!(!user.is_empty(), "User name cannot be empty");
        anyhow::ensure!(names.insert(user), "Duplicate user name: {}", user);
    }

    for (role, name) in [
        ("owner", &accounts.owner),
        ("beneficiary", &accounts.beneficiary),
        ("token_admin", &accounts.token_admin),
    ] {
        anyhow::ensure!(
            names.contains(name),
            "{} `{}` must be listed in users",
            role,
            name
        );
    }

    Ok(())
}

fn validate_token(token: &TokenParams) -> Result<()> {
    let reserved = token
        .crowdsale_allowance
        .checked_add(token.admin_allowance)
        .context("Token allowances overflow")?;
    anyhow::ensure!(
        reserved <= token.total_supply,
        "Allowances ({}) exceed total supply ({})",
        reserved,
        token.total_supply
    );
    Ok(())
}

fn validate_sale(sale: &SaleParams) -> Result<()> {
    anyhow::ensure!(
        sale.funding_cap_ether >= sale.funding_goal_ether,
        "Funding cap ({}) is below the funding goal ({})",
        sale.funding_cap_ether,
        sale.funding_goal_ether
    );
    anyhow::ensure!(
        sale.funding_cap_ether.checked_mul(ETHER).is_some(),
        "Funding cap overflows when converted to wei"
    );
    anyhow::ensure!(
        sale.min_contribution_wei <= ETHER,
        "Minimum contribution cannot exceed one ether"
    );
    anyhow::ensure!(sale.duration_minutes > 0, "Sale duration must be positive");
    anyhow::ensure!(
        sale.start_time.checked_add(sale.duration_minutes.saturating_mul(120)).is_some(),
        "Sale window overflows the clock"
    );
    anyhow::ensure!(
        sale.low_rate <= sale.rate && sale.rate <= sale.high_rate,
        "Rate {} outside bounds [{}, {}]",
        sale.rate,
        sale.low_rate,
        sale.high_rate
    );
    anyhow::ensure!(
        ETHER.checked_mul(sale.high_rate).is_some(),
        "High rate {} overflows token arithmetic",
        sale.high_rate
    );
    Ok(())
}
