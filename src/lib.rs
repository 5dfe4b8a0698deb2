extern crate chrono;
extern crate config as config_crate;
#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate failure;
extern crate futures;
extern crate futures_cpupool;
extern crate hex;
extern crate hmac;
#[macro_use]
extern crate log;
extern crate postgres;
extern crate r2d2;
extern crate r2d2_postgres;
extern crate rand;
extern crate regex;
extern crate serde;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;
extern crate sha2;

pub mod clients;
pub mod config;
pub mod controller;
pub mod errors;
pub mod migrations;
pub mod models;
pub mod repos;
pub mod services;
pub mod types;
pub mod util;

use std::sync::Arc;
use std::time::Duration;

use failure::Error as FailureError;
use futures::prelude::*;
use futures_cpupool::CpuPool;

use clients::*;
use config::Config;
use controller::*;
use repos::PgPool;
use services::ServiceContext;

/// Connects to the store, brings the schema up to date and wires every service behind a controller.
///
/// No payment provider is linked here: the controller answers 502 to every webhook payment and
/// subscription call. Embedders with a provider build the controller themselves through
/// `ServiceFactory::new`, passing their own `PaymentGateway`.
pub fn start(config: Config) -> Result<ControllerImpl, FailureError> {
    let db_pool = PgPool::new(&config.db.dsn, config.db.pool_size)?;
    migrations::run(&db_pool)?;

    let cpu_pool = CpuPool::new(config.pool.threads);
    let ctx = ServiceContext::new(Arc::new(db_pool), cpu_pool, Arc::new(LogNotifier));

    warn!("No payment gateway configured, payment and subscription calls will fail");
    let gateway = Arc::new(RetryingGateway::new(
        UnconfiguredGateway,
        config.payments.retry_attempts,
        Duration::from_millis(config.payments.retry_backoff_ms),
    ));
    let verifier = WebhookVerifier::new(config.payments.webhook_secret.clone(), config.payments.webhook_tolerance_secs);

    let controller = ControllerImpl::new(ServiceFactory::new(ctx, gateway, verifier))?;

    let health = controller.call(Request::new(Method::Get, "/healthcheck")).wait()?;
    info!("Orders service is ready: {}", health.body.message);

    Ok(controller)
}
