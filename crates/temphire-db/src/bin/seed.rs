//! # Seed Data Generator
//!
//! Populates the database with lookups and sample staffing resources for
//! development.
//!
//! ## Usage
//! ```bash
//! # Generate 25 staffing resources (default)
//! cargo run -p temphire-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p temphire-db --bin seed -- --count 200
//!
//! # Specify database path (otherwise TEMPHIRE_DB_PATH or ./temphire.db)
//! cargo run -p temphire-db --bin seed -- --db ./data/temphire.db
//! ```
//!
//! ## Generated Data
//! - Lookups: states, address types, phone number types
//! - Staffing resources with one primary address and one primary phone
//!   number each
//!
//! Everything is added through one resource management unit of work and
//! committed as a single batch.

use std::env;

use temphire_core::{
    Address, AddressType, Entity, PhoneNumber, PhoneNumberType, Predicate, StaffingResource,
    StaffingResourceConfig, State,
};
use temphire_db::{Database, DbConfig, ResourceMgtUnitOfWork};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const STATES: &[(&str, &str)] = &[
    ("CA", "California"),
    ("NY", "New York"),
    ("OR", "Oregon"),
    ("TX", "Texas"),
    ("WA", "Washington"),
];

const ADDRESS_TYPES: &[(&str, &str)] = &[("Home", "Home Address"), ("Work", "Work Address")];

const PHONE_NUMBER_TYPES: &[&str] = &["Home", "Work", "Mobile"];

const FIRST_NAMES: &[&str] = &[
    "Jane", "John", "Maria", "Wei", "Aisha", "Lucas", "Priya", "Tomas", "Hana", "Omar",
];

const MIDDLE_NAMES: &[&str] = &["", "A", "", "Lee", "", "M"];

const LAST_NAMES: &[&str] = &[
    "Smith", "Garcia", "Chen", "Okafor", "Novak", "Silva", "Patel", "Kowalski", "Sato", "Haddad",
    "Schmidt", "Nguyen",
];

const CITIES: &[&str] = &["Springfield", "Riverside", "Fairview", "Madison", "Georgetown"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 25;
    let mut db_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(25);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("TempHire Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of staffing resources to generate (default: 25)");
                println!("  -d, --db <PATH>    Database file path (default: $TEMPHIRE_DB_PATH or ./temphire.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = match db_path {
        Some(path) => DbConfig::new(path),
        None => DbConfig::from_env(),
    };

    println!("TempHire Seed Data Generator");
    println!("============================");
    println!("Database:  {}", config.database_path.display());
    println!("Resources: {}", count);
    println!();

    let db = Database::new(config).await?;
    let data_service = db.data_service();

    let existing = data_service.count(StaffingResource::TYPE_NAME).await?;
    if existing > 0 {
        println!("Database already has {} staffing resources", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let provider = db.entity_manager_provider();
    let uow = ResourceMgtUnitOfWork::from_provider(&provider);
    let session = uow.unit_of_work();

    // Lookups
    let states: Vec<State> = STATES
        .iter()
        .map(|(short_name, name)| State {
            id: short_name.to_lowercase(),
            short_name: short_name.to_string(),
            name: name.to_string(),
        })
        .collect();
    for state in &states {
        session.add(state)?;
    }

    let address_types: Vec<AddressType> = ADDRESS_TYPES
        .iter()
        .enumerate()
        .map(|(idx, (name, display_name))| AddressType {
            id: name.to_lowercase(),
            name: name.to_string(),
            display_name: display_name.to_string(),
            default: idx == 0,
        })
        .collect();
    for address_type in &address_types {
        session.add(address_type)?;
    }

    let phone_number_types: Vec<PhoneNumberType> = PHONE_NUMBER_TYPES
        .iter()
        .enumerate()
        .map(|(idx, name)| PhoneNumberType {
            id: name.to_lowercase(),
            name: name.to_string(),
            default: idx == 0,
        })
        .collect();
    for phone_number_type in &phone_number_types {
        session.add(phone_number_type)?;
    }

    // Staffing resources
    let factory = uow.staffing_resource_factory();
    for seed in 0..count {
        let config = StaffingResourceConfig {
            first_name: FIRST_NAMES[seed % FIRST_NAMES.len()].to_string(),
            middle_name: MIDDLE_NAMES[seed % MIDDLE_NAMES.len()].to_string(),
            last_name: LAST_NAMES[(seed * 7) % LAST_NAMES.len()].to_string(),
        };
        let resource = factory.create(&config)?;

        session.add(&Address {
            id: Uuid::new_v4().to_string(),
            staffing_resource_id: resource.id.clone(),
            address_type_id: address_types[seed % address_types.len()].id.clone(),
            address1: format!("{} Main Street", 100 + seed),
            address2: String::new(),
            city: CITIES[seed % CITIES.len()].to_string(),
            state_id: states[seed % states.len()].id.clone(),
            zipcode: format!("{:05}", 10000 + seed * 37),
            primary: true,
        })?;

        session.add(&PhoneNumber {
            id: Uuid::new_v4().to_string(),
            staffing_resource_id: resource.id.clone(),
            phone_number_type_id: phone_number_types[seed % phone_number_types.len()].id.clone(),
            area_code: format!("{:03}", 200 + (seed * 13) % 700),
            number: format!("555-{:04}", seed % 10000),
            primary: true,
        })?;
    }

    let start = std::time::Instant::now();
    let saved = uow.commit().await?;
    let elapsed = start.elapsed();

    info!(saved, ?elapsed, "Seed committed");
    println!("Committed {} entities in {:?}", saved, elapsed);

    // Verify through a fresh provider, the way a new session would see it
    println!();
    println!("Verifying...");
    let provider = db.entity_manager_provider();
    let lookups = provider.prepare().await?;
    println!("  Lookups loaded: {}", lookups);

    let uow = ResourceMgtUnitOfWork::from_provider(&provider);
    let smiths = uow
        .staffing_resources()
        .where_(Predicate::eq("lastName", "Smith"))
        .await?;
    println!("  Resources named Smith: {}", smiths.len());

    println!();
    println!("Seed complete!");

    db.close().await;
    Ok(())
}

/// Initializes logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - Default: INFO, debug for temphire crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,temphire_db=debug,temphire_core=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
