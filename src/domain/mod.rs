//! Domain layer - Core story model with no I/O
//!
//! This layer contains:
//! - Entities: Story, NarrativeElement, Representation collections
//! - Value Objects: ids, rule expressions, variable snapshots, path history
//! - Domain Events: what a reasoning step reports

pub mod entities;
pub mod events;
pub mod value_objects;
