// Order workflow
pub mod cart;
pub mod orders;

// Simple status helpers that work directly with entities
pub mod order_status;

// Inventory and catalog
pub mod catalog;
pub mod homologation;
pub mod inventory;

// Schools and accounts
pub mod registry;

// Financial services
pub mod commission;
