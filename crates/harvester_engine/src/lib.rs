//! Harvester engine: attempt driver, retry tiers and the IO around them.
mod automation;
mod driver;
mod global;
mod local;
mod output;
mod persist;
mod progress;
mod registry;
mod replay;
mod run;
mod settings;
mod types;

pub use automation::{AuthStatus, AutomationError, Browser, BrowserPage, BrowserSession};
pub use driver::AttemptDriver;
pub use global::{GlobalRetryController, HarvestError};
pub use local::LocalRetryController;
pub use output::{OperationStatus, OutputStore, SubjectStatus, Timestamp};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use progress::{LogProgressSink, NullProgressSink, ProgressSink};
pub use registry::{ProblemRegistry, RegistryError};
pub use replay::{
    ReplayError, ReplayLog, ReplayScript, ScriptedBrowser, ScriptedResponse, VisitScript,
};
pub use run::{run_subjects, RunSummary};
pub use settings::HarvestSettings;
pub use types::{
    AttemptFailure, AttemptOutcome, AttemptPhase, AttemptStatus, EngineEvent, Escalation,
    RetryTier, SubjectOutcome,
};
