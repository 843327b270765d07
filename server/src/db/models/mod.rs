//! Database Models

// Serde helpers
pub mod serde_helpers;

// Catalog Domain
pub mod ingredient;
pub mod pizza;

// Orders
pub mod order;

// Re-exports
pub use ingredient::{Ingredient, IngredientCreate, IngredientKind, IngredientUpdate};
pub use pizza::{Pizza, PizzaCreate, PizzaUpdate};
pub use order::{
    Order, OrderCreate, OrderItem, OrderStatus, OrderStatusUpdate,
    PaymentFailure, PaymentInfo, PaymentMethod, PaymentStatus,
};
