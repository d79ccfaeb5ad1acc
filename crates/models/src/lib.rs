pub mod errors;
pub mod db;
pub mod branch;
pub mod bay;
pub mod service_type;
pub mod booking;
pub mod slot;
pub mod queue_entry;
pub mod draft;
pub mod draft_service;
