//! End-to-end tests for bridge sessions
//!
//! Each test opens its own session on a uniquely named Guest module and,
//! where it can, closes it at the end: a clean close proves every Guest
//! reference taken during the test was released.

mod harness;
mod classes;
mod conversion;
mod invoke;
mod lifecycle;
mod proxies;
