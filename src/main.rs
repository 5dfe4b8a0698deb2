extern crate env_logger;
#[macro_use]
extern crate log;
extern crate mealkit_orders_lib as lib;

use std::process::exit;

fn main() {
    env_logger::init();

    let config = lib::config::Config::new().unwrap_or_else(|e| {
        error!("Failed to load service configuration, please check your 'config' folder: {}", e);
        exit(1);
    });

    if let Err(e) = lib::start(config) {
        error!("Orders service failed to start: {}", e);
        exit(1);
    }
}
