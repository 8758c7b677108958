pub mod acquisition;
pub mod configuration;
pub mod error_handling;
pub mod records;
pub mod session_management;
pub mod storage;
