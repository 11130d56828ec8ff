//! Domain model: payments, risk scoring, fee arithmetic, settlement and the
//! ports the pipeline talks to.

pub mod fees;
pub mod money;
pub mod outcome;
pub mod payment;
pub mod ports;
pub mod risk;
pub mod settlement;
