pub mod catalog;
pub mod inventory;
pub mod ncml;

pub use catalog::{CatalogArgs, catalog_command};
pub use inventory::{InventoryArgs, inventory_command};
pub use ncml::{NcmlArgs, ncml_command};
