use serde::{Deserialize, Serialize};

/// Connection settings for a MongoDB-backed store.
///
/// Deserializable so it can be embedded in an application's own configuration file.
///
/// ```ignore
/// let config: MongoDbConfig = serde_json::from_str(r#"{
///     "dsn": "mongodb://localhost:27017",
///     "database": "app",
///     "collection": "users"
/// }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoDbConfig {
    /// MongoDB connection string.
    pub dsn: String,
    /// Database holding the collection.
    pub database: String,
    /// Collection the store is bound to.
    pub collection: String,
}

impl MongoDbConfig {
    pub fn new(dsn: impl Into<String>, database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            database: database.into(),
            collection: collection.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_from_json() {
        let config: MongoDbConfig = serde_json::from_str(
            r#"{ "dsn": "mongodb://localhost:27017", "database": "app", "collection": "users" }"#,
        )
        .unwrap();

        assert_eq!(config, MongoDbConfig::new("mongodb://localhost:27017", "app", "users"));
    }

    #[test]
    fn test_missing_collection_is_rejected() {
        let result = serde_json::from_str::<MongoDbConfig>(
            r#"{ "dsn": "mongodb://localhost:27017", "database": "app" }"#,
        );

        assert!(result.is_err());
    }
}
