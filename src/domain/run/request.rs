//! Execution request

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::device::DeviceId;
use crate::domain::workflow::WorkflowId;

/// The only input accepted to start a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub workflow_id: WorkflowId,
    pub device_id: DeviceId,

    #[serde(default)]
    pub dynamic_params: BTreeMap<String, String>,
}

impl ExecutionRequest {
    pub fn new(workflow_id: WorkflowId, device_id: impl Into<DeviceId>) -> Self {
        Self {
            workflow_id,
            device_id: device_id.into(),
            dynamic_params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dynamic_params.insert(name.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.dynamic_params.extend(params);
        self
    }
}
