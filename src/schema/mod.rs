//! Schema layer
//!
//! Declarative definitions of every domain record and form. Each type
//! implements [`Schema`], turning an untrusted JSON record into a typed,
//! normalized value or a list of field-level errors.

pub mod enums;
pub mod filters;
pub mod forms;
pub mod models;
pub mod validate;

pub use enums::*;
pub use filters::{ProjectFilter, TaskFilter, UserFilter};
pub use forms::*;
pub use models::*;
pub use validate::{revalidate, validate_array, FieldError, Schema, ValidationErrors};
