//! Domain entities - Core business objects with identity

mod experience;
mod narrative_element;
mod representation;
mod story;

pub use experience::Experience;
pub use narrative_element::{ElementBody, Link, LinkKind, NarrativeElement};
pub use representation::{
    Representation, RepresentationChoice, RepresentationCollection,
    PLACEHOLDER_REPRESENTATION_TYPE,
};
pub use story::{Beginning, Story, VariableDeclaration, VariableRange, VariableType};
