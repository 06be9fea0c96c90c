//! IntentRoute Common Types
//!
//! Shared types for the IntentRoute core: identifiers, the network catalog,
//! token references and amounts, operation parameters, quotes, transaction
//! descriptors, the result record returned to callers and the error taxonomy.

pub mod amount;
pub mod error;
pub mod identifiers;
pub mod network;
pub mod operation;
pub mod outcome;
pub mod quote;
pub mod time;
pub mod token;
pub mod token_table;

pub use amount::*;
pub use error::*;
pub use identifiers::*;
pub use network::*;
pub use operation::*;
pub use outcome::*;
pub use quote::*;
pub use time::*;
pub use token::*;
pub use token_table::*;
