pub mod audit_logs;
pub mod cart_items;
pub mod inventory_transactions;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod stalls;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use inventory_transactions::Entity as InventoryTransactions;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use stalls::Entity as Stalls;
pub use users::Entity as Users;
