pub mod agent;
pub mod api;
pub mod bus;
pub mod config;
pub mod coordinator;
pub mod cycle;
pub mod model;
pub mod output;
pub mod popup;
pub mod protocol;

pub use agent::{AgentRegistry, PageAgent};
pub use api::{HttpScanApi, ScanApi};
pub use config::Config;
pub use coordinator::Coordinator;
pub use model::{RateLimitInfo, ScanMode, ScanResult, ThreatLevel};
pub use popup::Popup;
pub use protocol::{Message, Reply};
