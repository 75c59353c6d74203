use std::{env, time::Duration as StdDuration};

use activation_engine::{
    commission::{BoostRates, CommissionSchedule},
    db_types::PlanTier,
    engine_objects::{CheckoutConfig, PlanAllowances, SweepConfig},
};
use checkout_processor::ProcessorConfig;
use chrono::Duration;
use log::*;
use tae_common::{parse_duration_secs, Secret};

const DEFAULT_TAE_HOST: &str = "127.0.0.1";
const DEFAULT_TAE_PORT: u16 = 8360;
const DEFAULT_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(300);
const DEFAULT_ACTIVATION_INTERVAL: StdDuration = StdDuration::from_secs(60);
const PLAN_TIERS: [PlanTier; 3] = [PlanTier::Basic, PlanTier::Pro, PlanTier::Premium];

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Bearer token for the `/admin` scope. The admin endpoints refuse every request while this is unset.
    pub admin_token: Secret<String>,
    /// Engine events are POSTed here. Notifications are disabled if unset.
    pub notification_url: Option<String>,
    pub sweep_interval: StdDuration,
    pub activation_interval: StdDuration,
    pub checkout: CheckoutConfig,
    pub sweep: SweepConfig,
    pub commission: CommissionSchedule,
    pub boost_rates: BoostRates,
    pub allowances: PlanAllowances,
    pub processor: ProcessorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TAE_HOST.to_string(),
            port: DEFAULT_TAE_PORT,
            database_url: String::default(),
            admin_token: Secret::default(),
            notification_url: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            activation_interval: DEFAULT_ACTIVATION_INTERVAL,
            checkout: CheckoutConfig::default(),
            sweep: SweepConfig::default(),
            commission: CommissionSchedule::default(),
            boost_rates: BoostRates::default(),
            allowances: PlanAllowances::default(),
            processor: ProcessorConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let host = env::var("TAE_HOST").ok().unwrap_or_else(|| DEFAULT_TAE_HOST.into());
        let port = env::var("TAE_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for TAE_PORT. {e} Using the default, {DEFAULT_TAE_PORT}, instead."
                    );
                    DEFAULT_TAE_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_TAE_PORT);
        let database_url = env::var("TAE_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TAE_DATABASE_URL is not set. Please set it to the URL for the engine database.");
            String::default()
        });
        let admin_token = Secret::new(env::var("TAE_ADMIN_TOKEN").ok().unwrap_or_else(|| {
            warn!("🪛️ TAE_ADMIN_TOKEN is not set. The admin endpoints will reject every request.");
            String::default()
        }));
        let notification_url = env::var("TAE_NOTIFICATION_URL").ok().filter(|s| !s.trim().is_empty());
        if notification_url.is_none() {
            info!("🪛️ TAE_NOTIFICATION_URL is not set. Engine events will not be forwarded.");
        }
        let sweep_interval = duration_from_env("TAE_SWEEP_INTERVAL", defaults.sweep_interval);
        let activation_interval = duration_from_env("TAE_ACTIVATION_INTERVAL", defaults.activation_interval);
        let checkout = configure_checkout(defaults.checkout);
        let sweep = configure_sweep(defaults.sweep);
        let commission = configure_commission(defaults.commission);
        let boost_rates = env::var("TAE_BOOST_DAILY_RATES")
            .ok()
            .and_then(|s| {
                defaults
                    .boost_rates
                    .parse_overrides(&s)
                    .map_err(|e| error!("🪛️ Invalid TAE_BOOST_DAILY_RATES. {e}. Using the default rates."))
                    .ok()
            })
            .unwrap_or(defaults.boost_rates);
        let allowances = configure_allowances(defaults.allowances);
        let processor = ProcessorConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            admin_token,
            notification_url,
            sweep_interval,
            activation_interval,
            checkout,
            sweep,
            commission,
            boost_rates,
            allowances,
            processor,
        }
    }
}

fn duration_from_env(key: &str, default: StdDuration) -> StdDuration {
    match env::var(key) {
        Ok(s) => parse_duration_secs(&s).unwrap_or_else(|| {
            warn!("🪛️ Invalid configuration value for {key}: {s}. Using the default of {}s.", default.as_secs());
            default
        }),
        Err(_) => default,
    }
}

fn chrono_from_env(key: &str, default: Duration) -> Duration {
    let std_default = default.to_std().unwrap_or_default();
    Duration::from_std(duration_from_env(key, std_default)).unwrap_or(default)
}

fn configure_checkout(defaults: CheckoutConfig) -> CheckoutConfig {
    let currency = env::var("TAE_CURRENCY").map(|s| s.to_lowercase()).unwrap_or_else(|_| {
        info!("🪛️ TAE_CURRENCY is not set. Using {}", defaults.currency);
        defaults.currency.clone()
    });
    let success_url = env::var("TAE_SUCCESS_URL").unwrap_or_else(|_| {
        warn!("🪛️ TAE_SUCCESS_URL is not set. Payers will be returned to {}", defaults.success_url);
        defaults.success_url.clone()
    });
    let cancel_url = env::var("TAE_CANCEL_URL").unwrap_or_else(|_| defaults.cancel_url.clone());
    let session_timeout = duration_from_env("TAE_SESSION_TIMEOUT", defaults.session_timeout);
    let session_lifetime = chrono_from_env("TAE_SESSION_LIFETIME", defaults.session_lifetime);
    CheckoutConfig { currency, success_url, cancel_url, session_timeout, session_lifetime }
}

fn configure_sweep(defaults: SweepConfig) -> SweepConfig {
    let min_age = chrono_from_env("TAE_SWEEP_MIN_AGE", defaults.min_age);
    let max_age = chrono_from_env("TAE_SWEEP_MAX_AGE", defaults.max_age);
    let lookup_timeout = duration_from_env("TAE_SWEEP_LOOKUP_TIMEOUT", defaults.lookup_timeout);
    if max_age <= min_age {
        error!(
            "🪛️ TAE_SWEEP_MAX_AGE ({}s) must be longer than TAE_SWEEP_MIN_AGE ({}s). Using the default sweep window.",
            max_age.num_seconds(),
            min_age.num_seconds()
        );
        return defaults;
    }
    SweepConfig { min_age, max_age, lookup_timeout }
}

fn configure_commission(mut schedule: CommissionSchedule) -> CommissionSchedule {
    for plan in PLAN_TIERS {
        let key = format!("TAE_COMMISSION_{}", plan.to_string().to_uppercase());
        let Ok(s) = env::var(&key) else { continue };
        match schedule.tier(plan).parse_overrides(&s) {
            Ok(rates) => {
                info!("🪛️ Commission for the {plan} plan: {rates:?}");
                *schedule.tier_mut(plan) = rates;
            },
            Err(e) => error!("🪛️ Invalid {key}. {e}. Keeping the default rates for the {plan} plan."),
        }
    }
    schedule
}

fn configure_allowances(mut allowances: PlanAllowances) -> PlanAllowances {
    for plan in PLAN_TIERS {
        let key = format!("TAE_PLAN_ALLOWANCES_{}", plan.to_string().to_uppercase());
        let Ok(s) = env::var(&key) else { continue };
        match PlanAllowances::parse_allowance(allowances.for_plan(plan), &s) {
            Ok(a) => *allowances.for_plan_mut(plan) = a,
            Err(e) => error!("🪛️ Invalid {key}. {e}. Keeping the default allowance for the {plan} plan."),
        }
    }
    allowances
}
