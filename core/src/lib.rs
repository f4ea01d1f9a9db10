//! engine-verify core - installation check for a local DataFusion engine
//!
//! Starts a local session, loads a three row table, validates its row count
//! and contents, and stops the session, reporting the verdict as an exit
//! status.

pub mod context;
pub mod dataframe;
pub mod dataset;
pub mod logging;
pub mod outcome;
pub mod traits;
pub mod verifier;

pub use context::{DataFusionProvider, LocalSession, SessionBuilder};
pub use dataframe::LocalDataFrame;
pub use dataset::{NameId, Record};
pub use outcome::Outcome;
pub use traits::{EngineSession, EngineTable, SessionProvider};
pub use verifier::{Verifier, run_installation_check};
