pub mod account;
pub mod app;
pub mod batch;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod fetch;
pub mod humanize;
pub mod ledger;
pub mod lock;
pub mod observability;
pub mod report;
pub mod sheet;
pub mod storage;
