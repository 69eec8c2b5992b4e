//! Client for the Homebridge UI REST API.
//!
//! Logs in with the bridge credentials, keeps a snapshot of the bridge's
//! accessories and toggles power outlets.
//!
//! ```no_run
//! # async fn run() -> homebridge_outlets::Result<()> {
//! use homebridge_outlets::{Config, HomebridgeClient};
//!
//! let mut client = HomebridgeClient::connect(Config::from_env()?).await?;
//! for outlet in client.outlets() {
//!     if let Some(id) = outlet.unique_id.as_deref() {
//!         let ok = client.toggle_outlet(id, &outlet.toggle_payload()).await?;
//!         println!("{}: toggled = {ok}", outlet.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod accessory;
pub mod client;
pub mod config;
pub mod error;
pub mod session;

pub use accessory::{Accessory, AccessoryInformation, AccessoryRecord, TogglePayload};
pub use client::HomebridgeClient;
pub use config::Config;
pub use error::{HomebridgeError, Result};
pub use session::{ApiResponse, RequestOptions, Session};
