pub mod db;
pub mod models;
pub mod records;
pub mod vector;

mod error;

pub use error::Error;
pub use models::{Profile, RecordId};

use std::{future::Future, pin::Pin};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
