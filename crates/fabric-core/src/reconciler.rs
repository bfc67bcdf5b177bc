//! Reconciliation engine
//!
//! One call runs resolve → fetch → diff → submit → report, strictly in order.
//! The engine holds no mutable state; one instance can serve any number of
//! concurrent calls over a shared transport.

use crate::config::EngineConfig;
use crate::error::ReconcileResult;
use crate::fetch::fetch;
use crate::report::{report, OperationResult, ReportInput};
use crate::submit::{submit, Mutation, Submission};
use crate::transport::Transport;
use fabric_address::{Address, AddressError};
use fabric_state::{diff, DesiredConfig};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Requested end state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Object exists with the desired attributes
    Present,
    /// Object does not exist
    Absent,
    /// Read only
    Query,
}

impl Mode {
    /// Mode name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Query => "query",
        }
    }

    /// Check if mode addresses a single instance
    #[inline]
    #[must_use]
    pub fn requires_instance(self) -> bool {
        !matches!(self, Self::Query)
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "query" => Ok(Self::Query),
            other => Err(format!("unknown state '{other}', expected present, absent or query")),
        }
    }
}

/// What to do at the address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Converge the leaf object to this configuration
    Present(DesiredConfig),
    /// Remove the leaf object
    Absent,
    /// Report what exists
    Query,
}

impl Operation {
    /// Mode of this operation
    #[inline]
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self {
            Self::Present(_) => Mode::Present,
            Self::Absent => Mode::Absent,
            Self::Query => Mode::Query,
        }
    }

    /// Desired configuration, in present mode
    #[inline]
    #[must_use]
    pub fn desired(&self) -> Option<&DesiredConfig> {
        match self {
            Self::Present(desired) => Some(desired),
            Self::Absent | Self::Query => None,
        }
    }
}

/// One reconciliation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    pub address: Address,
    pub operation: Operation,
    pub dry_run: bool,
}

impl ReconcileRequest {
    /// Converge `address` to `desired`
    #[inline]
    #[must_use]
    pub fn present(address: Address, desired: DesiredConfig) -> Self {
        Self {
            address,
            operation: Operation::Present(desired),
            dry_run: false,
        }
    }

    /// Remove the object at `address`
    #[inline]
    #[must_use]
    pub fn absent(address: Address) -> Self {
        Self {
            address,
            operation: Operation::Absent,
            dry_run: false,
        }
    }

    /// Read what exists at `address`
    #[inline]
    #[must_use]
    pub fn query(address: Address) -> Self {
        Self {
            address,
            operation: Operation::Query,
            dry_run: false,
        }
    }

    /// With dry-run mode
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Generic reconciliation client over a [`Transport`]
#[derive(Debug, Clone)]
pub struct Reconciler<T> {
    transport: T,
    config: EngineConfig,
}

impl<T: Transport> Reconciler<T> {
    /// Create engine
    #[inline]
    #[must_use]
    pub fn new(transport: T, config: EngineConfig) -> Self {
        Self { transport, config }
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying transport
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Reconcile one address
    ///
    /// # Workflow
    /// 1. Resolve the address (local; nothing is sent on failure)
    /// 2. Fetch existing state
    /// 3. Compute the diff (present mode)
    /// 4. Submit at most one mutation
    /// 5. Report
    ///
    /// # Errors
    /// Any member of [`ReconcileError`](crate::ReconcileError). No mutation is
    /// attempted unless the read succeeded and was unambiguous.
    pub async fn reconcile(&self, request: ReconcileRequest) -> ReconcileResult<OperationResult> {
        let ReconcileRequest {
            address,
            operation,
            dry_run,
        } = request;
        let mode = operation.mode();
        let dry_run = dry_run || self.config.dry_run;

        tracing::info!("Reconciling {} ({})", address, mode);

        let path = address.resolve()?;
        if mode.requires_instance() {
            path.require_instance()?;
        }
        if let Some(desired) = operation.desired() {
            if desired.class_name() != path.leaf_class() {
                return Err(AddressError::ClassMismatch {
                    expected: path.leaf_class().to_string(),
                    actual: desired.class_name().to_string(),
                }
                .into());
            }
        }
        tracing::debug!("Resolved path: {}", path);

        let child_classes = operation
            .desired()
            .map(DesiredConfig::child_classes)
            .unwrap_or_default();
        let snapshot = fetch(&self.transport, &path, &self.config, &child_classes).await?;

        let timeout = self.config.request_timeout();
        let (change, submission) = match &operation {
            Operation::Present(desired) => {
                let change = diff(desired, &snapshot.existing());
                tracing::debug!("Computed diff: {:?}", change.attributes());
                let submission = submit(&self.transport, Mutation::Upsert(&change), &path, dry_run, timeout).await?;
                (Some(change), submission)
            }
            Operation::Absent => {
                let mutation = Mutation::Delete {
                    exists: !snapshot.is_empty(),
                };
                let submission = submit(&self.transport, mutation, &path, dry_run, timeout).await?;
                (None, submission)
            }
            Operation::Query => (None, Submission::unchanged()),
        };

        let result = report(ReportInput {
            mode,
            path: &path,
            snapshot,
            desired: operation.desired(),
            diff: change,
            submission,
            dry_run,
        });

        tracing::info!(
            "Reconciled {}: changed={} dry_run={}",
            result.url,
            result.changed,
            result.dry_run
        );
        Ok(result)
    }
}
