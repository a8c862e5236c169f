//! Durable domain layer for the order fulfillment system.
//!
//! This crate provides:
//! - The Order model with its validation rules
//! - The restaurant and dish catalog
//! - OrderStore trait with in-memory and PostgreSQL implementations,
//!   including the atomic status compare-and-set used by the orchestrator

pub mod catalog;
pub mod error;
pub mod order;
pub mod store;

pub use catalog::{Dish, Restaurant};
pub use error::DomainError;
pub use order::{CustomerId, DishId, MAX_ITEM_QUANTITY, Money, Order, OrderItem};
pub use store::{OrderStore, StoreError, memory::InMemoryOrderStore, postgres::PostgresOrderStore};
