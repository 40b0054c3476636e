//! Buffered element trees for the `graft` binding engine.
//!
//! The engine walks documents through a deliberately small contract: an
//! element exposes its name, attributes and text value, hands out its
//! children one at a time in document order, and can be extended with new
//! children and attributes when writing. [`Element`] implements both sides
//! of that contract with a single buffered tree node.
//!
//! ## Menu
//!
//! - [`Element`]: a tree node, readable (consuming) and writable.
//! - [`Position`]: where a node sat in its source document.
//!
//! Reading is pull-style and forward-only: [`Element::next`] *takes* the
//! next unread child, so a fully read element ends up empty. A child that
//! has been taken cannot be revisited.

// -----------------------------------------------------------------------------
// Modules

mod element;
mod position;
mod render;

// -----------------------------------------------------------------------------
// Exports

pub use element::Element;
pub use position::Position;
