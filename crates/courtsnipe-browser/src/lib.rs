//! Browser runtime for courtsnipe.
//!
//! Implements the booking pipeline's `RemoteUi` against the real portal by
//! running a small Node.js program that holds one Playwright browser context.
//! It provides:
//! - Runtime probing for node, the playwright package and Chromium
//! - The portal's selector vocabulary, overridable from config
//! - A persistent bridge driver speaking JSON lines
//! - A one-shot sign-in job that stores the authenticated session

pub mod driver;
pub mod login;
pub mod protocol;
pub mod runtime;
mod script;
pub mod selectors;

pub use driver::{LaunchOptions, PlaywrightDriver};
pub use login::{SignInOutcome, SignInRequest, sign_in};
pub use runtime::{RuntimeProbe, ensure_probe_ready, probe_runtime};
pub use selectors::{SiteSelectors, WidgetRef};
