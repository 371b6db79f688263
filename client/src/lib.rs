pub mod config;
pub mod machine;
pub mod presenter;
pub mod render;
pub mod session;
pub mod transport;
pub mod validator;

pub use config::Config;
pub use machine::{AnalysisMachine, AnalysisState, AttemptId, Command, Msg};
pub use session::Session;
pub use transport::{HttpTransport, Transport, TransportError};
pub use validator::{Limits, UploadCandidate, ValidationRejection, ValidationReport, Verdict};
