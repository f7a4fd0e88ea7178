mod create_account;
mod create_customer;
mod deposit_money;
mod transfer_money;
mod withdraw_money;

pub use create_account::*;
pub use create_customer::*;
pub use deposit_money::*;
pub use transfer_money::*;
pub use withdraw_money::*;
