//! Policy-driven duplication of object graphs.
//!
//! `replica` deep-copies graphs of [`Shared`] nodes that may contain cycles
//! and objects reachable through several paths. What happens to each field is
//! declared once per field or per type with `#[derive(Duplicate)]`:
//!
//! ```rust,ignore
//! use replica::{Duplicate, Shared};
//!
//! #[derive(Duplicate)]
//! #[duplicate(policy = MapOrDuplicate)]
//! struct Tag {
//!     label: String,
//! }
//!
//! #[derive(Duplicate)]
//! struct Material {
//!     name: String,
//!     tag: Option<Shared<Tag>>,
//!     #[duplicate(skip)]
//!     cache: Vec<f64>,
//! }
//!
//! let mut session = replica::Session::new();
//! let copies = session.duplicate_all([&steel, &concrete])?;
//! // Both copies point at one duplicate of the shared tag.
//! ```
//!
//! # Modules
//!
//! * [`policy`] - the [`Policy`] vocabulary and field policy resolution
//! * [`descriptor`] - per-type descriptor tables emitted by the derive
//! * [`identity`] - identity keys and stable ids
//! * [`session`] - the identity map shared across root calls
//! * [`duplicator`] - the recursive graph duplicator
//! * [`container`] - element-wise population of containers
//! * [`registry`] - inventory of derived types and policy audit

extern crate self as replica;

pub mod config;
pub mod container;
pub mod descriptor;
pub mod duplicator;
mod error;
mod hook;
pub mod identity;
pub mod policy;
pub mod registry;
pub mod session;
mod shared;
pub mod transform;

pub use config::DuplicateConfig;
pub use descriptor::{ContainerKind, FieldDescriptor, TypeDescriptor, ValueKind};
pub use duplicator::{Duplicate, Duplicator, duplicate, target_mut};
pub use error::{ConfigError, DuplicateError};
pub use identity::{AsStableId, IdentityKey, StableId};
pub use policy::{ElementPolicy, Elements, FieldPolicy, Policy, PolicyDecl, resolve_field_policy};
/// Derives [`Duplicate`] and registers the type's descriptor table.
pub use replica_macros::Duplicate;
pub use session::{Session, SessionStats};
pub use shared::Shared;
pub use transform::{Blank, Transform};

#[doc(hidden)]
pub use inventory;
