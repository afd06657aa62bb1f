//! Cluster endpoint binding.
//!
//! A cluster is addressed as `host:port`. Each endpoint is bound to an embedded
//! substrate directory: the one configured under `[[coordination.clusters]]`,
//! or `$XDG_DATA_HOME/casecoord/clusters/<host>_<port>`.

use super::{xdg, CoordinationConfig};
use crate::coordination::SledCoordinationService;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

/// Configured data directory of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterBinding {
    /// `host:port`
    pub endpoint: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterEndpoint {
    pub host: String,
    pub port: u16,
}

impl ClusterEndpoint {
    /// Endpoint from separate host and port arguments.
    pub fn from_parts(host: &str, port: &str) -> Result<Self, ApiError> {
        let host = host.trim();
        let port = port.trim();
        if host.is_empty() || port.is_empty() {
            return Err(ApiError::InvalidArgument(
                "cluster host and port must not be empty".to_string(),
            ));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| ApiError::InvalidArgument(format!("invalid port number {:?}", port)))?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Data directory bound to this endpoint.
    pub fn resolve_path(&self, config: &CoordinationConfig) -> Result<PathBuf, ApiError> {
        for binding in &config.clusters {
            let bound: ClusterEndpoint = binding.endpoint.parse()?;
            if bound.host.eq_ignore_ascii_case(&self.host) && bound.port == self.port {
                return Ok(binding.path.clone());
            }
        }
        xdg::cluster_data_dir(&self.host, self.port)
    }

    /// Open the substrate bound to this endpoint.
    pub fn open(&self, config: &CoordinationConfig) -> Result<SledCoordinationService, ApiError> {
        let path = self.resolve_path(config)?;
        debug!(endpoint = %self, path = %path.display(), "Opening cluster substrate");
        Ok(SledCoordinationService::open(&path, &config.namespace_root)?)
    }

    /// Open the substrate bound to this endpoint only if it already exists.
    pub fn open_existing(
        &self,
        config: &CoordinationConfig,
    ) -> Result<SledCoordinationService, ApiError> {
        let path = self.resolve_path(config)?;
        if !path.is_dir() {
            return Err(ApiError::ClusterUnavailable {
                endpoint: self.to_string(),
                path: path.display().to_string(),
            });
        }
        self.open(config)
    }
}

impl FromStr for ClusterEndpoint {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or_else(|| {
            ApiError::InvalidArgument(format!("cluster endpoint {:?} is not host:port", s))
        })?;
        Self::from_parts(host, port)
    }
}

impl fmt::Display for ClusterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
