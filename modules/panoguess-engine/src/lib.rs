pub mod camera;
pub mod catalog;
pub mod controller;
pub mod reconciler;
pub mod sampler;
pub mod session;
pub mod sim;
pub mod store;
pub mod timer;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use catalog::RegionCatalog;
pub use controller::{GameDeps, LocalSettings, RoundController, RoundPhase, RoundSnapshot};
pub use reconciler::{SessionReconciler, SharedLocation};
pub use sampler::{LocationSampler, SampleAttempt, SearchOutcome, SearchTrace};
pub use session::GameSession;
