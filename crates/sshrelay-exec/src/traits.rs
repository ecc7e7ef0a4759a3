//! Remote executor trait

use async_trait::async_trait;

use crate::destination::Target;
use crate::outcome::ExecutionOutcome;

/// Runs one command on a resolved target
///
/// Implementations never fail: every failure is folded into the returned
/// [`ExecutionOutcome`].
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Execute `cmd` on `target` and classify the result
    async fn execute(&self, target: &Target, cmd: &str) -> ExecutionOutcome;

    /// Short name for logging
    fn executor_type(&self) -> &'static str;
}
