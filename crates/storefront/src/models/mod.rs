//! Storefront-side models that are not part of the order aggregate.
//!
//! The order and payment types live in `qmart-core`. These are the read-only
//! views of data owned by other parts of the shop, and the projections built
//! from them for listings and emails.

pub mod directory;
pub mod order_view;

pub use directory::{ProductDisplay, UserContact};
pub use order_view::OrderView;
