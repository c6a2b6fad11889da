// Library root
// -----------
// The binary (`main.rs`) wires these modules together; keeping them in a
// library lets the API logic, the rule engine and the sorting loop be tested
// without a terminal or a network.
//
// Module responsibilities:
// - `config`: environment-driven settings and file locations.
// - `oauth`, `auth`, `credentials`: request signing, the one-time xAuth
//   exchange and the stored token pair.
// - `api`: the signed, rate-limit-aware Instapaper client.
// - `model`, `rules`: folders/bookmarks and the domain rule matcher + store.
// - `input`, `ui`: single-keystroke commands and the interactive loop.
pub mod api;
pub mod auth;
pub mod config;
pub mod credentials;
mod error;
pub mod input;
pub mod model;
pub mod oauth;
pub mod rules;
mod storage;
pub mod ui;

pub use error::{Error, Result};
