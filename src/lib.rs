//! # docmap
//!
//! A typed object-document mapper with change tracking.
//!
//! docmap provides:
//! - `#[derive(Record)]` to map structs to and from BSON documents, with
//!   renamed, skipped, inlined, optional, zero-omitted and list fields
//! - Change tracking against a snapshot of the last persisted state, producing minimal
//!   `$set`/`$unset` updates
//! - Result sets over forward-only driver cursors with either repeatable random
//!   access or single-pass streaming
//! - A small driver contract, implemented in memory here and for MongoDB by
//!   `docmap-mongodb`
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use docmap::prelude::*;
//! use docmap::bson::oid::ObjectId;
//! use docmap::memory::MemoryDriver;
//!
//! #[derive(Debug, Clone, PartialEq, Record)]
//! pub struct User {
//!     #[docmap(id)]
//!     pub id: ObjectId,
//!     pub email: String,
//!     pub nickname: Option<String>,
//!     #[docmap(inline)]
//!     pub timestamps: Timestamps,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> OdmResult<()> {
//! let registry = ModelRegistry::builder().register(User::zero())?.build();
//! let odm = Odm::new(Arc::new(MemoryDriver::new()), registry);
//! let users = odm.collection::<User>()?;
//!
//! let mut user = users.new_record()?;
//! user.email = "ada@example.com".into();
//! user.timestamps.stamp_created();
//! users.save(&mut user).await?;
//!
//! let loaded = users.find([user.id]).await?.one_and_close().await?;
//! assert_eq!(loaded.email, "ada@example.com");
//! assert!(!loaded.is_changed()?);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

extern crate self as docmap;

pub mod collection;
pub mod config;
pub mod context;
pub mod diff;
pub mod driver;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod memory;
pub mod model;
pub mod naming;
pub mod record;
pub mod result;
pub mod timestamps;
pub mod tracked;
pub mod value;

pub use bson;

// Re-export proc macros
pub use docmap_codegen::Record;

pub use collection::{Collection, Odm};
pub use config::OdmConfig;
pub use context::{CancelHandle, QueryContext};
pub use driver::{Driver, ForwardCursor, Namespace};
pub use error::{ErrorKind, OdmError, OdmResult};
pub use model::{Model, ModelRegistry};
pub use record::Record;
pub use result::{ResultSet, ResultState};
pub use timestamps::Timestamps;
pub use tracked::Tracked;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::value::{FieldValue, Scalar, ZeroValue};
    pub use crate::{
        CancelHandle, Collection, Odm, OdmConfig, OdmError, OdmResult, ModelRegistry,
        QueryContext, Record, ResultSet, Timestamps, Tracked,
    };
}
