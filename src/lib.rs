//! Telekinesis gameplay core
//!
//! Lift, hold and throw props with a physics-driven state machine, sweep
//! lightweight mini props along with the held prop, and target props from a
//! holder's viewpoint. Physics runs on Rapier.

pub mod config;
pub mod game;
