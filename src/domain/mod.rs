mod account;
mod application;
mod auth;
mod branch;
mod ledger;
mod locker;
mod money;
mod policy;
mod user;

pub use account::*;
pub use application::*;
pub use auth::*;
pub use branch::*;
pub use ledger::*;
pub use locker::*;
pub use money::*;
pub use policy::*;
pub use user::*;
