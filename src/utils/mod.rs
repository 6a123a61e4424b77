//! Small shared helpers.

pub mod exec;
pub mod html;
pub mod plural;
pub mod size;
