pub mod connect;
pub mod creators;
pub mod discount;
pub mod gift;
pub mod idgen;
pub mod models;
pub mod purchase;
pub mod wallet;
