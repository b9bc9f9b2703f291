use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::engine::{LedgerSettings, MonetaryPolicy, RateConfig, StarterLoanTerms};
use crate::model::credits::{Credits, FeeRate};
use crate::safety::{BreakerConfig, FundConfig};

/// Runtime configuration for the `serve` command.
///
/// Everything comes from the environment. `UBL_DATABASE` points at the
/// sqlite file; leave it unset (or set to `:memory:`) for an in-memory
/// store, which is the right choice for development only — nothing
/// survives a restart.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub database: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub realm_id: Option<String>,
    pub health_interval_secs: u64,
    pub settings: LedgerSettings,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            database: None,
            host: "127.0.0.1".to_string(),
            port: 8420,
            realm_id: None,
            health_interval_secs: 30,
            settings: LedgerSettings::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = LedgerConfig::default();

        if let Ok(db) = std::env::var("UBL_DATABASE") {
            if !db.is_empty() && db != ":memory:" {
                config.database = Some(PathBuf::from(db));
            }
        }
        if let Ok(host) = std::env::var("UBL_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_env::<u16>("UBL_PORT")? {
            config.port = port;
        }
        if let Ok(realm) = std::env::var("UBL_REALM_ID") {
            config.realm_id = Some(realm);
        }
        if let Some(interval) = parse_env::<u64>("UBL_HEALTH_INTERVAL_SECS")? {
            config.health_interval_secs = interval;
        }

        // Monetary policy
        if let Some(rate) = parse_env::<f64>("UBL_FEE_RATE")? {
            if !(0.0..1.0).contains(&rate) {
                bail!("UBL_FEE_RATE must be a fraction in [0, 1), got {rate}");
            }
            config.settings.policy = MonetaryPolicy {
                fee_rate: FeeRate::from_fraction(rate),
                ..config.settings.policy
            };
        }
        if let Some(rate) = parse_env::<f64>("UBL_BASE_INTEREST_RATE")? {
            config.settings.policy.base_interest_rate = rate;
            config.settings.rates = RateConfig {
                normal_rate: rate,
                ..config.settings.rates
            };
        }

        // Circuit breaker thresholds
        config.settings.breaker = BreakerConfig {
            max_inflation: parse_env::<f64>("UBL_MAX_INFLATION")?
                .unwrap_or(config.settings.breaker.max_inflation),
            max_supply_change: parse_env::<f64>("UBL_MAX_SUPPLY_CHANGE")?
                .unwrap_or(config.settings.breaker.max_supply_change),
            max_default_rate: parse_env::<f64>("UBL_MAX_DEFAULT_RATE")?
                .unwrap_or(config.settings.breaker.max_default_rate),
            max_gini: parse_env::<f64>("UBL_MAX_GINI")?
                .unwrap_or(config.settings.breaker.max_gini),
            anomaly_threshold: parse_env::<u32>("UBL_ANOMALY_THRESHOLD")?
                .unwrap_or(config.settings.breaker.anomaly_threshold),
        };

        // Starter loans
        config.settings.starter_loan = StarterLoanTerms {
            principal: parse_env::<i64>("UBL_STARTER_LOAN_PRINCIPAL")?
                .map(Credits::from_ubl)
                .unwrap_or(config.settings.starter_loan.principal),
            interest_rate: parse_env::<f64>("UBL_STARTER_LOAN_INTEREST_RATE")?
                .unwrap_or(config.settings.policy.base_interest_rate),
            repayment_rate: parse_env::<f64>("UBL_STARTER_LOAN_REPAYMENT_RATE")?
                .unwrap_or(config.settings.starter_loan.repayment_rate),
            grace_period_days: parse_env::<i64>("UBL_STARTER_LOAN_GRACE_DAYS")?
                .unwrap_or(config.settings.starter_loan.grace_period_days),
        };

        // Guarantee fund
        config.settings.fund = FundConfig {
            coverage_bps: parse_env::<u32>("UBL_FUND_COVERAGE_BPS")?
                .unwrap_or(config.settings.fund.coverage_bps),
            max_coverage_per_entity: parse_env::<i64>("UBL_FUND_MAX_COVERAGE_UBL")?
                .map(Credits::from_ubl)
                .unwrap_or(config.settings.fund.max_coverage_per_entity),
            min_fund_balance: parse_env::<i64>("UBL_FUND_MIN_BALANCE_UBL")?
                .map(Credits::from_ubl)
                .unwrap_or(config.settings.fund.min_fund_balance),
        };

        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => match raw.parse::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(_) => bail!("{key} has unparseable value `{raw}`"),
        },
        _ => Ok(None),
    }
}
