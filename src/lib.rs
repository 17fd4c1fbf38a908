#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use std::sync::Arc;

use rocket::{figment::Figment, Build, Rocket};

use crate::{
    config::{ConfigFairing, DatabaseFairing},
    logging::LoggerFairing,
    model::store::{Store, StoreHandle},
};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

/// Build the server from `Rocket.toml` and the environment, backed by MongoDB.
pub fn build() -> Rocket<Build> {
    mount(rocket::build())
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
}

/// Build the server over an existing store instead of connecting to MongoDB.
pub fn rocket_for_store(figment: Figment, store: Arc<dyn Store>) -> Rocket<Build> {
    mount(rocket::custom(figment))
        .manage(StoreHandle::new(store))
        .attach(ConfigFairing)
}

fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(LoggerFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// Rocket's defaults plus the application config every test needs.
#[cfg(test)]
pub(crate) fn test_figment() -> Figment {
    rocket::Config::figment()
        .merge(("token_symmetric_key", "a test key that is at least 32 bytes"))
        .merge(("access_token_ttl", 900))
        .merge(("log_level", "off"))
}
