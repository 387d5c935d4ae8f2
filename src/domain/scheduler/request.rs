use std::path::PathBuf;

use crate::domain::cluster::node_range::NodeRange;
use crate::domain::reservation::reservation::BootSpec;
use crate::domain::utils::id::{ReservationName, UserName};
use crate::error::{Error, Result};

/// Per-user caps applied to non-privileged callers. A value of 0 disables
/// the corresponding cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limits {
    pub node_limit: usize,

    /// In minutes.
    pub time_limit: i64,
}

impl Limits {
    pub fn check_nodes(&self, node_count: usize) -> Result<()> {
        if self.node_limit > 0 && node_count > self.node_limit {
            return Err(Error::PolicyLimitExceeded(format!(
                "{} nodes requested, at most {} are allowed",
                node_count, self.node_limit
            )));
        }
        Ok(())
    }

    pub fn check_duration(&self, duration_minutes: i64) -> Result<()> {
        if self.time_limit > 0 && duration_minutes > self.time_limit {
            return Err(Error::PolicyLimitExceeded(format!(
                "{} minutes requested, at most {} are allowed",
                duration_minutes, self.time_limit
            )));
        }
        Ok(())
    }
}

/// Which nodes a request wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSpec {
    /// Any `n` nodes of the cluster.
    Count(usize),

    /// Exactly the nodes of a node-range expression such as `host[1-4,7]`.
    Named(String),
}

impl NodeSpec {
    /// Builds a node spec from the two mutually exclusive command line flags.
    pub fn from_flags(count: Option<usize>, nodes: Option<String>) -> Result<Self> {
        match (count, nodes) {
            (Some(_), Some(_)) => Err(Error::InvalidRequest("give either a node count or a node list, not both".to_string())),
            (None, Some(nodes)) => Ok(NodeSpec::Named(nodes)),
            (Some(count), None) => Ok(NodeSpec::Count(count)),
            (None, None) => Err(Error::InvalidRequest("a node count or a node list is required".to_string())),
        }
    }
}

/// Resolved form of a `NodeSpec`: grid columns plus whether every one of
/// them is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeSelection {
    Any(usize),
    Exactly(Vec<usize>),
}

impl NodeSelection {
    pub(crate) fn resolve(spec: &NodeSpec, nodes: &NodeRange) -> Result<Self> {
        match spec {
            NodeSpec::Count(0) => Err(Error::InvalidRequest("node count must be at least 1".to_string())),
            NodeSpec::Count(count) => Ok(NodeSelection::Any(*count)),
            NodeSpec::Named(expression) => {
                let names = nodes.split_range(expression)?;
                Ok(NodeSelection::Exactly(nodes.indices_of(&names)?))
            }
        }
    }

    pub(crate) fn node_count(&self) -> usize {
        match self {
            NodeSelection::Any(count) => *count,
            NodeSelection::Exactly(columns) => columns.len(),
        }
    }
}

/// Boot options exactly as the caller gave them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootRequest {
    pub kernel: Option<PathBuf>,
    pub initrd: Option<PathBuf>,
    pub profile: Option<String>,
}

impl BootRequest {
    pub fn kernel_initrd(kernel: impl Into<PathBuf>, initrd: impl Into<PathBuf>) -> Self {
        BootRequest { kernel: Some(kernel.into()), initrd: Some(initrd.into()), profile: None }
    }

    pub fn profile(name: impl Into<String>) -> Self {
        BootRequest { kernel: None, initrd: None, profile: Some(name.into()) }
    }

    /// Turns the raw options into a `BootSpec`. Profiles are only accepted
    /// when the cluster boots through Cobbler.
    pub fn validate(&self, use_cobbler: bool) -> Result<BootSpec> {
        match (&self.kernel, &self.initrd, &self.profile) {
            (None, None, Some(profile)) => {
                if !use_cobbler {
                    return Err(Error::InvalidBootSpec("profiles need cobbler, which is not enabled".to_string()));
                }
                if profile.trim().is_empty() {
                    return Err(Error::InvalidBootSpec("profile name is empty".to_string()));
                }
                Ok(BootSpec::Profile { name: profile.clone() })
            }
            (Some(kernel), Some(initrd), None) => Ok(BootSpec::KernelInitrd { kernel: kernel.clone(), initrd: initrd.clone() }),
            (_, _, Some(_)) => Err(Error::InvalidBootSpec("give either a profile or a kernel and initrd, not both".to_string())),
            (None, None, None) => Err(Error::InvalidBootSpec("a kernel and initrd or a profile is required".to_string())),
            _ => Err(Error::InvalidBootSpec("kernel and initrd must be given together".to_string())),
        }
    }
}

/// Reservation names become file names under the TFTP root, so they must be
/// a single plain path component.
pub(crate) fn check_name(name: &ReservationName) -> Result<()> {
    let name = name.as_str();

    if name.is_empty() {
        return Err(Error::InvalidRequest("reservation name is empty".to_string()));
    }

    if name.contains(['/', '\\']) || name.contains("..") || name.chars().any(char::is_control) {
        return Err(Error::InvalidRequest(format!("reservation name {:?} may not contain '/', '\\', '..' or control characters", name)));
    }

    Ok(())
}

/// Everything needed to create a reservation.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub name: ReservationName,
    pub owner: UserName,
    pub duration_minutes: i64,
    pub nodes: NodeSpec,
    pub boot: BootRequest,
    pub kernel_args: String,

    /// Unix seconds. `None` means as soon as possible.
    pub earliest_start: Option<i64>,

    /// Overrides the configured limits for this request.
    pub limits: Option<Limits>,
}

impl CreateRequest {
    pub fn new(name: impl Into<String>, owner: impl Into<String>, duration_minutes: i64, nodes: NodeSpec, boot: BootRequest) -> Self {
        CreateRequest {
            name: ReservationName::new(name),
            owner: UserName::new(owner),
            duration_minutes,
            nodes,
            boot,
            kernel_args: String::new(),
            earliest_start: None,
            limits: None,
        }
    }

    pub fn with_kernel_args(mut self, kernel_args: impl Into<String>) -> Self {
        self.kernel_args = kernel_args.into();
        self
    }

    pub fn with_earliest_start(mut self, earliest_start: i64) -> Self {
        self.earliest_start = Some(earliest_start);
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }
}
