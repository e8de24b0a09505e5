//! C7: the chat ingress adapter. `spec.md` §4.6 and §6.
//!
//! Translates the three recognized Telegram commands and valid image
//! uploads into `capture-db` calls. The adapter is deliberately stateless —
//! see [`adapter`] for the transport-agnostic core, and [`bot`] for the
//! `teloxide` wiring around it.

pub mod adapter;
pub mod bot;
pub mod command;
pub mod config;
