pub mod alert_cache;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod event_mapper;
pub mod google_calendar_client;
pub mod link_opener;
pub mod oauth_client;
pub mod presenter;
pub mod run_lock;
pub mod snooze_store;
pub mod storage;
