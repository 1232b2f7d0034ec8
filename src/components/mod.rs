//! UI components.

pub mod flow_field;
