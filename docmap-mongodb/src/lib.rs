//! # docmap-mongodb
//!
//! MongoDB driver for docmap.
//!
//! This crate provides:
//! - Connection settings and a client bound to a default database
//! - A [`docmap::Driver`] implementation whose cursors map onto server-side cursors
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use docmap::prelude::*;
//! use docmap_mongodb::{MongoClient, MongoDriver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MongoClient::builder()
//!         .uri("mongodb://localhost:27017")
//!         .database("app")
//!         .build()
//!         .await?;
//!
//!     let registry = ModelRegistry::builder().register(User::zero())?.build();
//!     let odm = Odm::new(Arc::new(MongoDriver::new(client)), registry);
//!
//!     let users = odm.collection::<User>()?;
//!     let count = users.find_all().await?.count().await?;
//!     println!("{count} users");
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod driver;
pub mod error;

pub use client::{MongoClient, MongoClientBuilder};
pub use config::{MongoConfig, MongoConfigBuilder};
pub use driver::{MongoCursor, MongoDriver};
pub use error::{MongoError, MongoResult};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::{MongoClient, MongoClientBuilder};
    pub use crate::config::{MongoConfig, MongoConfigBuilder};
    pub use crate::driver::MongoDriver;
    pub use crate::error::{MongoError, MongoResult};
}
