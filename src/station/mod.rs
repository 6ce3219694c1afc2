pub mod audit;
pub mod aux_meta;
pub mod batch;
pub mod builder;
pub mod config;
pub mod dates;
pub mod paths;
pub mod resolve;
pub mod sac;
pub mod sanitize;
pub mod topology;
pub mod util;
pub mod warn;
