//! Loading, verification and Parquet caching of the INSEE commune datasets
//! (employment, housing, median income) that feed the commune dashboard.

pub mod cache;
pub mod communes;
pub mod config;
pub mod dataset;
pub mod error;
pub mod load;
pub mod metadata;
pub mod table;
pub mod verify;

pub use config::Config;
pub use dataset::DatasetKind;
pub use error::{LoadError, RowCountMismatch};
pub use load::{LoadReport, LoadSource, Loaded, Loader};
pub use table::CommuneTable;
