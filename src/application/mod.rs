pub mod bootstrap;
pub mod commands;
pub mod dispatcher;
pub mod oauth;
pub mod run_controller;
pub mod snooze_gate;
