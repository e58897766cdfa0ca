pub mod brief;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod io;
pub mod layout;
pub mod metadata;
pub mod paths;
pub mod reconcile;
pub mod resolver;
pub mod template;
pub mod templates;
pub mod vcs;

pub use error::{FailureClass, PersistencyError, Result};
