//! sshrelay-exec: destination resolution and remote execution
//!
//! Turns a destination string into an SSH target with loaded credentials and
//! runs a single command on it, classifying the result into an
//! [`ExecutionOutcome`].

pub mod destination;
pub mod error;
pub mod keys;
pub mod outcome;
pub mod ssh;
pub mod traits;

pub use destination::{DEFAULT_PORT, Destination, Target, resolve};
pub use error::{DestinationError, ExecError};
pub use keys::{DIAL_TIMEOUT, HostKeyPolicy, SshCredentials, key_path, load_private_key};
pub use outcome::{ExecutionOutcome, TRANSPORT_FAILURE_STATUS, exit_reason};
pub use ssh::SshExecutor;
pub use traits::RemoteExecutor;
