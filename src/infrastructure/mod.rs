//! Infrastructure layer - interpreter, adapters and wiring

pub mod device;
pub mod logging;
pub mod notification;
pub mod run;
pub mod services;
pub mod workflow;
