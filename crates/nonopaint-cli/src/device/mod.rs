//! Everything that talks to the phone.

pub mod agent;
pub mod bridge;
pub mod paths;
pub mod session;

pub use agent::{AgentConfig, ScrcpyLauncher};
pub use bridge::AdbBridge;
pub use paths::ArtifactPaths;
pub use session::{ConnectPolicy, TouchSession};
