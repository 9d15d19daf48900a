//! Delete pipeline: resolve, filter, authorize, execute, report.
//!
//! `DeleteSession` is the only entrypoint. Each stage works on a
//! `DeletePlan` that lives for one request; nothing is written to the
//! store until the plan is settled and authorized.

mod cancel;
mod error;
mod executor;
mod gate;
mod options;
mod plan;
mod report;
mod request;
mod resolve;
mod session;


pub use cancel::CancelToken;
pub use error::{DeleteError, DeleteWarning, RootFailure};
pub use plan::{ActionCause, DeletePlan, NodeRole, PlanAction, PlanNode};
pub use report::{DeleteReport, DeleteState, NodeOutcome, RootStatus};
pub use request::{ChildOption, DeleteRequest};
pub use session::DeleteSession;
