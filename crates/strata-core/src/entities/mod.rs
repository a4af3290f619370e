//! Entity structs for the Strata domain.
//!
//! Each entity maps to a table in the libSQL database. All structs derive
//! `Serialize`, `Deserialize`, and `JsonSchema`.

mod car;
mod human_being;
mod import_operation;

pub use car::{Car, NewCar};
pub use human_being::{Coordinates, HumanBeing};
pub use import_operation::ImportOperation;
