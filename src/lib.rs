pub mod changelog;
pub mod dataset;
pub mod export;
pub mod model;
pub mod remote;
pub mod store;
pub mod sync;
pub mod upload;
pub mod worker;
