//! The order model and related value objects.

pub mod model;
pub mod value_objects;

pub use model::{MAX_ITEM_QUANTITY, Order};
pub use value_objects::{CustomerId, DishId, Money, OrderItem};
