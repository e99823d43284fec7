//! # Element Model
//!
//! Clean DTOs shared by the relationship graph, the remote index cache and
//! the sync orchestrator.
//!
//! Design rule: this module is pure data with no I/O or async.

pub mod element_id;
pub mod element_type;
pub mod element;
pub mod relationship;
pub mod path;

pub use element_id::{ElementId, ElementIdError, normalize_name};
pub use element_type::ElementType;
pub use element::IndexedElement;
pub use relationship::{
    Relationship, RelationshipType, ParsedRelationship,
    DEFAULT_STRENGTH, INVERSE_MARKER,
};
pub use path::{RelationshipPath, Hop};
