//! RM-Bridge model library, the target requirements model the compiler
//! reconciles against.
//!
//! - [`element`]: model objects and their kind-specific data
//! - [`model`]: the in-memory arena and the [`ModelQuery`] read interface
//! - [`store`]: YAML load / atomic save
//! - [`html`]: rich-text normalisation shared with the compiler
//! - [`apply`]: interpreter for change sets

pub mod apply;
pub mod element;
pub mod error;
pub mod html;
pub mod model;
pub mod store;

pub use apply::{apply, ApplyReport};
pub use element::{Element, ElementData, ElementKind};
pub use error::{ApplyError, ModelError};
pub use html::repair_html;
pub use model::{Model, ModelQuery};
pub use store::{load_model_at, save_model_at};
