//! End-to-end tests for the e-board VESC simulator.
//!
//! The scenarios in `tests/` assemble the full simulator (kinematic loop,
//! motor controller, command processor) over an in-memory transport and
//! drive it the way a rider-facing client would.
