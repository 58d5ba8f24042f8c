//! # Design Module
//!
//! The declaration graph: attributes and their types, media types with their
//! views, and resources with their actions. Everything here is built once at
//! startup, checked against the graph invariants, and then shared read-only.
//!
//! Declarations come from either the builder API or definition files:
//!
//! ```rust
//! use mediaroute::design::{Action, ApiDefinition, Attribute, MediaType, Resource, ResponseSpec};
//!
//! # fn main() -> Result<(), mediaroute::error::DefinitionError> {
//! let greeting = MediaType::builder("application/vnd.hello")
//!     .attribute(Attribute::integer("id").required())
//!     .attribute(Attribute::string("text").min_length(1))
//!     .view("default", ["id", "text"])
//!     .build()?;
//!
//! let hello = Resource::builder("hello")
//!     .prefix("/hello")
//!     .media_type("application/vnd.hello")
//!     .action(
//!         Action::builder("show")
//!             .get("/{id}")
//!             .param(Attribute::integer("id").required())
//!             .response("ok", ResponseSpec::ok())
//!             .response("notFound", ResponseSpec::not_found()),
//!     )
//!     .build()?;
//!
//! let api = ApiDefinition::builder("hello")
//!     .media_type(greeting)
//!     .resource(hello)
//!     .build()?;
//! assert_eq!(api.routes().len(), 1);
//! # Ok(())
//! # }
//! ```

mod action;
mod api;
mod attribute;
pub mod load;
mod media_type;
mod resource;
mod route;
mod types;

pub use action::{Action, ActionBuilder, HeaderTemplate, ResponseSpec};
pub use api::{ApiBuilder, ApiDefinition, MediaTypes, RouteEntry};
pub use attribute::{Attribute, Constraints, Pattern};
pub use load::{load_dir, load_documents};
pub use media_type::{MediaType, MediaTypeBuilder, View, ViewField, DEFAULT_VIEW};
pub use resource::{Resource, ResourceBuilder};
pub use route::{QueryCapture, RouteTemplate, Segment};
pub use types::{AttributeType, Primitive};

pub(crate) use action::placeholders_in;
pub(crate) use route::join_path;
