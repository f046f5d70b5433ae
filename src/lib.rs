//! Narrative Player - Reasoning engine for branching object-based stories
//!
//! The engine decides which narrative element plays next:
//! - Evaluates authored rules over story variables
//! - Walks nested sub-stories transparently
//! - Jumps, steps back and resumes from recorded path history
//! - Picks the representation each element is shown with

pub mod application;
pub mod domain;
pub mod infrastructure;
