use std::sync::Arc;

use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    api::auth::hash_password,
    common::{NationalId, Permission},
    db::Voter,
    mongodb::{
        ensure_candidate_id_counter_exists, ensure_election_property_exists, ensure_indexes_exist,
        Coll, MongoStore,
    },
    store::{Store, StoreError, StoreHandle},
    token::TokenAuthority,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    access_token_ttl: u32,
    admin_national_id: Option<String>,
    // secrets
    token_symmetric_key: String,
    admin_password: Option<String>,
}

impl Config {
    /// Valid lifetime of access tokens.
    pub fn access_token_ttl(&self) -> Duration {
        Duration::seconds(self.access_token_ttl.into())
    }

    /// Pre-shared key that access tokens are encrypted under.
    pub fn token_symmetric_key(&self) -> &[u8] {
        self.token_symmetric_key.as_bytes()
    }

    /// The authority that issues and verifies access tokens under the
    /// configured key.
    pub fn token_authority(&self) -> crate::error::Result<TokenAuthority> {
        Ok(TokenAuthority::new(self.token_symmetric_key())?)
    }

    /// The administrator to create at launch, if configured.
    pub fn admin(&self) -> Option<(NationalId, &str)> {
        match (&self.admin_national_id, &self.admin_password) {
            (Some(national_id), Some(password)) => {
                Some((national_id.parse().ok()?, password.as_str()))
            }
            _ => None,
        }
    }
}

/// A fairing that loads the application config, builds the token authority
/// from it, and puts both in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // The key is validated exactly once, here.
        let authority = match config.token_authority() {
            Ok(authority) => authority,
            Err(e) => {
                error!("Invalid `token_symmetric_key`: {e}");
                return Err(rocket);
            }
        };
        if let Some(national_id) = &config.admin_national_id {
            if let Err(e) = national_id.parse::<NationalId>() {
                error!("Invalid `admin_national_id`: {e}");
                return Err(rocket);
            }
        }
        if config.admin_national_id.is_some() != config.admin_password.is_some() {
            warn!("Only one of `admin_national_id` and `admin_password` is set, ignoring both");
        }

        // Manage the state.
        rocket = rocket.manage(config).manage(authority);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    db_name: String,
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places the store into managed state.
///
/// Skipped if a store is already managed.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        if rocket.state::<StoreHandle>().is_some() {
            return Ok(rocket);
        }

        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes, the candidate ID counter and the
        // election flag exist.
        let setup = async {
            ensure_indexes_exist(&db).await?;
            ensure_candidate_id_counter_exists(&Coll::from_db(&db)).await?;
            ensure_election_property_exists(&Coll::from_db(&db)).await
        };
        if let Err(e) = setup.await {
            error!("Failed to set up database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        let store = MongoStore::new(client, &db);
        if let Some(config) = rocket.state::<Config>() {
            if let Err(e) = ensure_admin_exists(&store, config).await {
                error!("Failed to create administrator: {e}");
                return Err(rocket);
            }
        }

        // Manage the state.
        rocket = rocket.manage(StoreHandle::new(Arc::new(store)));
        Ok(rocket)
    }
}

/// Ensure the configured administrator exists, creating them if absent.
/// An existing voter with that ID is left untouched.
///
/// This operation is idempotent.
pub async fn ensure_admin_exists(store: &dyn Store, config: &Config) -> Result<(), StoreError> {
    let Some((national_id, password)) = config.admin() else {
        return Ok(());
    };
    if store.find_voter(&national_id).await?.is_some() {
        return Ok(());
    }

    let now = chrono::Utc::now();
    let admin = Voter {
        national_id,
        password_hash: hash_password(password),
        full_name: "Administrator".to_string(),
        email: String::new(),
        permissions: vec![Permission::Vote, Permission::Admin],
        has_voted: false,
        password_changed_at: now,
        created_at: now,
    };
    match store.insert_voter(admin).await {
        Ok(_) => {
            info!("Created administrator account");
            Ok(())
        }
        // Another instance won the race.
        Err(StoreError::Duplicate(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
