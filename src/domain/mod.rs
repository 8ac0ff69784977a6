mod commission;
mod hold;
mod ledger;
mod money;
mod wallet;

pub use commission::*;
pub use hold::*;
pub use ledger::*;
pub use money::*;
pub use wallet::*;
