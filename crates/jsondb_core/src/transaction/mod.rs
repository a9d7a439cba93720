//! Transaction management.
//!
//! JsonDB provides transactions with:
//! - **Atomicity**: all-or-nothing commits
//! - **Isolation**: readers see a committed snapshot as of their start
//! - **Durability**: committed transactions are in the WAL before commit
//!   returns
//! - **Serial writes**: one write transaction at a time, one global commit
//!   order

mod manager;
mod scope;
mod state;

pub use manager::TransactionManager;
pub use scope::{ReadTransaction, WriteTransaction};
pub use state::{PendingWrite, TransactionState, WriteSet};
