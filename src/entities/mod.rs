//! Database entities.

pub mod access_code;
pub mod administrator;
pub mod cart_line;
pub mod commission_statement;
pub mod guardian;
pub mod homologation;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_approval;
pub mod product_variant;
pub mod school;
pub mod school_manager;
pub mod student;
pub mod supplier;
