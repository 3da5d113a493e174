//! Reference data loaded into empty tables on start-up.
//!
//! Each table is seeded only while it is empty, and a row that collides with
//! an existing natural key is skipped, so running the seeder again is a no-op.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use crate::attributes::{AttributeSchema, AttributeValue};
use crate::auth::hash_password;
use crate::models::{
    default_condition, default_permissions, default_vat_rate, AttributeDefinition, Brand, Product,
    Role, Session, Task, Transaction, User, Vehicle,
};
use crate::storage::{Record, RecordReader, Storage, StoreError, WriteScope};

const USERS: &str = "users.json";
const ATTRIBUTES: &str = "attributes.json";
const BRANDS: &str = "brands.json";
const PRODUCTS: &str = "products.json";
const VEHICLES: &str = "vehicles.json";
const TASKS: &str = "tasks.json";
const TRANSACTIONS: &str = "transactions.json";

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed seed file {file}: {source}")]
    Parse {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to hash seed password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Where seed files come from.
#[derive(Debug, Clone, Default)]
pub enum SeedSource {
    /// Data compiled into the binary.
    #[default]
    Bundled,
    /// A directory of JSON files; a missing file leaves its table alone.
    Directory(PathBuf),
}

impl SeedSource {
    pub fn from_dir(dir: Option<PathBuf>) -> Self {
        dir.map_or(Self::Bundled, Self::Directory)
    }

    fn read(&self, file: &'static str) -> Result<Option<String>, SeedError> {
        match self {
            Self::Bundled => Ok(bundled(file).map(str::to_owned)),
            Self::Directory(dir) => {
                let path = dir.join(file);
                if !path.exists() {
                    return Ok(None);
                }
                std::fs::read_to_string(&path)
                    .map(Some)
                    .map_err(|source| SeedError::Io { path, source })
            }
        }
    }

    fn rows<R: DeserializeOwned>(&self, file: &'static str) -> Result<Option<Vec<R>>, SeedError> {
        let Some(raw) = self.read(file)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| SeedError::Parse { file, source })
    }
}

fn bundled(file: &str) -> Option<&'static str> {
    Some(match file {
        USERS => include_str!("../data/seed/users.json"),
        ATTRIBUTES => include_str!("../data/seed/attributes.json"),
        BRANDS => include_str!("../data/seed/brands.json"),
        PRODUCTS => include_str!("../data/seed/products.json"),
        VEHICLES => include_str!("../data/seed/vehicles.json"),
        TASKS => include_str!("../data/seed/tasks.json"),
        TRANSACTIONS => include_str!("../data/seed/transactions.json"),
        _ => return None,
    })
}

/// Rows inserted per table by one seeding run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: BTreeMap<&'static str, usize>,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.inserted.values().sum()
    }
}

#[derive(Deserialize)]
struct SeedUser {
    username: String,
    password: String,
    #[serde(default)]
    role: Role,
    #[serde(default = "default_permissions")]
    permissions: Vec<String>,
}

impl SeedUser {
    fn into_user(self, bcrypt_cost: u32) -> Result<User, SeedError> {
        Ok(User {
            id: 0,
            password_hash: hash_password(&self.password, bcrypt_cost)?,
            username: self.username,
            role: self.role,
            permissions: self.permissions,
        })
    }
}

#[derive(Deserialize)]
struct SeedProduct {
    name: String,
    sku: String,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default = "default_condition")]
    condition: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    images: Vec<String>,
    price: f64,
    #[serde(default)]
    stock_quantity: i64,
    #[serde(default = "default_vat_rate")]
    vat_rate: f64,
}

/// Seed every empty table. Order matters: products are validated against the
/// attribute definitions seeded just before them.
pub fn run(storage: &Storage, source: &SeedSource, bcrypt_cost: u32) -> Result<SeedReport, SeedError> {
    let scope = storage.write();
    let mut report = SeedReport::default();

    let users = seed_table(&scope, source, USERS, |row: SeedUser| {
        row.into_user(bcrypt_cost).map(Some)
    })?;
    report.inserted.insert(User::TABLE, users);

    let attributes = seed_table(&scope, source, ATTRIBUTES, |row: AttributeDefinition| Ok(Some(row)))?;
    report.inserted.insert(AttributeDefinition::TABLE, attributes);

    let brands = seed_table(&scope, source, BRANDS, |row: Brand| Ok(Some(row)))?;
    report.inserted.insert(Brand::TABLE, brands);

    let schema = AttributeSchema::new(scope.list()?);
    let products = seed_table(&scope, source, PRODUCTS, |row: SeedProduct| {
        let attributes = match schema.encode(row.attributes) {
            Ok(attributes) => attributes,
            Err(err) => {
                warn!(sku = %row.sku, %err, "skipping seed product");
                return Ok(None);
            }
        };
        Ok(Some(Product {
            id: 0,
            name: row.name,
            sku: row.sku,
            brand: row.brand,
            category: row.category,
            condition: row.condition,
            description: row.description,
            price: row.price,
            stock_quantity: row.stock_quantity,
            vat_rate: row.vat_rate,
            attributes,
            images: row.images,
        }))
    })?;
    report.inserted.insert(Product::TABLE, products);

    let vehicles = seed_table(&scope, source, VEHICLES, |row: Vehicle| Ok(Some(row)))?;
    report.inserted.insert(Vehicle::TABLE, vehicles);

    let tasks = seed_table(&scope, source, TASKS, |row: Task| Ok(Some(row)))?;
    report.inserted.insert(Task::TABLE, tasks);

    let transactions = seed_table(&scope, source, TRANSACTIONS, |row: Transaction| Ok(Some(row)))?;
    report.inserted.insert(Transaction::TABLE, transactions);

    Ok(report)
}

/// Replace all users with the seed users. Every session is revoked.
pub fn reseed_users(storage: &Storage, source: &SeedSource, bcrypt_cost: u32) -> Result<usize, SeedError> {
    let scope = storage.write();
    scope.clear::<Session>()?;
    scope.clear::<User>()?;
    let inserted = seed_table(&scope, source, USERS, |row: SeedUser| {
        row.into_user(bcrypt_cost).map(Some)
    })?;
    info!(inserted, "users re-seeded");
    Ok(inserted)
}

fn seed_table<T, R>(
    scope: &WriteScope<'_>,
    source: &SeedSource,
    file: &'static str,
    mut convert: impl FnMut(R) -> Result<Option<T>, SeedError>,
) -> Result<usize, SeedError>
where
    T: Record,
    R: DeserializeOwned,
{
    if scope.count::<T>()? > 0 {
        return Ok(0);
    }
    let Some(rows) = source.rows::<R>(file)? else {
        return Ok(0);
    };

    let mut inserted = 0;
    for row in rows {
        let Some(record) = convert(row)? else {
            continue;
        };
        match scope.insert(record) {
            Ok(_) => inserted += 1,
            Err(StoreError::Conflict { key, .. }) => {
                warn!(table = T::TABLE, %key, "seed row ignored, key already taken");
            }
            Err(err) => return Err(err.into()),
        }
    }
    if inserted > 0 {
        info!(table = T::TABLE, file, inserted, "table seeded");
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use std::fs;

    #[test]
    fn test_bundled_data_seeds_every_table_once() {
        let storage = Storage::temporary().unwrap();
        let report = run(&storage, &SeedSource::Bundled, 4).unwrap();

        assert_eq!(report.inserted["users"], 3);
        assert_eq!(report.inserted["attribute_definitions"], 5);
        assert_eq!(report.inserted["brands"], 6);
        // Every bundled product must pass attribute validation.
        assert_eq!(report.inserted["products"], 7);
        assert_eq!(report.inserted["vehicles"], 2);
        assert_eq!(report.inserted["tasks"], 5);
        assert_eq!(report.inserted["transactions"], 8);

        let again = run(&storage, &SeedSource::Bundled, 4).unwrap();
        assert_eq!(again.total(), 0);
        assert_eq!(storage.count::<Product>().unwrap(), 7);
    }

    #[test]
    fn test_seeded_users_have_hashed_passwords() {
        let storage = Storage::temporary().unwrap();
        run(&storage, &SeedSource::Bundled, 4).unwrap();

        let admin = storage.find_by_key::<User>("admin").unwrap().unwrap();
        assert!(admin.is_admin());
        assert_ne!(admin.password_hash, "admin123");
        assert!(verify_password("admin123", &admin.password_hash).unwrap());
    }

    #[test]
    fn test_seed_products_carry_typed_attributes() {
        let storage = Storage::temporary().unwrap();
        run(&storage, &SeedSource::Bundled, 4).unwrap();

        let schema = AttributeSchema::new(storage.list().unwrap());
        let laptop = storage.find_by_key::<Product>("APL-MBA13-M2").unwrap().unwrap();
        let named = schema.decode(&laptop.attributes);
        assert_eq!(named["screen_size"], AttributeValue::Number("13.6".parse().unwrap()));
        assert_eq!(named["processor"], AttributeValue::Text("Apple M2".to_string()));
        assert_eq!(laptop.images.len(), 2);
    }

    #[test]
    fn test_directory_source_ignores_conflicts_and_missing_files() {
        let dir = std::env::temp_dir().join("techfix_test_seed_dir");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(BRANDS),
            r#"[{"name": "Acer"}, {"name": "Acer", "description": "duplicate"}, {"name": "HP"}]"#,
        )
        .unwrap();

        let storage = Storage::temporary().unwrap();
        let report = run(&storage, &SeedSource::Directory(dir.clone()), 4).unwrap();
        assert_eq!(report.inserted["brands"], 2);
        assert_eq!(report.total(), 2);
        assert_eq!(storage.count::<User>().unwrap(), 0);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_reseed_users_replaces_accounts_and_sessions() {
        let storage = Storage::temporary().unwrap();
        run(&storage, &SeedSource::Bundled, 4).unwrap();
        let before = storage.find_by_key::<User>("admin").unwrap().unwrap();

        let inserted = reseed_users(&storage, &SeedSource::Bundled, 4).unwrap();
        assert_eq!(inserted, 3);
        let after = storage.find_by_key::<User>("admin").unwrap().unwrap();
        assert_ne!(before.id, after.id);
        assert_eq!(storage.count::<User>().unwrap(), 3);
    }
}
