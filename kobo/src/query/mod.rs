mod get_account_details;
mod get_customer_details;
mod get_customers;
mod get_transaction_history;

pub use get_account_details::*;
pub use get_customer_details::*;
pub use get_customers::*;
pub use get_transaction_history::*;
