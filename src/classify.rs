//! Classification of captured calls by device file and escape code
//!
//! The category mirrors where a compatibility layer branches:
//! - `Frontend` / `Uvm`: the subcategory is the request's command number
//! - `Control`: `NV_ESC_RM_CONTROL`, the subcategory is the control command
//! - `Alloc`: `NV_ESC_RM_ALLOC`, the subcategory is the allocated class
//! - `Unknown`: a device file nobody handles, keyed by command number

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::ioctl::command_number;
use crate::nvgpu::{
    Nvos54Parameters, RmAllocParameters, NV_ESC_RM_ALLOC, NV_ESC_RM_CONTROL,
    SIZEOF_NVOS21_PARAMETERS, SIZEOF_NVOS54_PARAMETERS, SIZEOF_NVOS64_PARAMETERS,
};
use crate::record::CallRecord;

pub const UVM_DEVICE_PATH: &str = "/dev/nvidia-uvm";
pub const CONTROL_DEVICE_PATH: &str = "/dev/nvidiactl";
/// Numbered GPU device files, `/dev/nvidia0` and up.
///
/// Unanchored: any path containing a numbered device name matches, so
/// `/dev/nvidia0-foo` is still a frontend device.
pub const GPU_DEVICE_PATTERN: &str = r"/dev/nvidia[0-9]+";

/// Top-level classification bucket
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Category {
    Frontend,
    #[serde(rename = "UVM")]
    Uvm,
    Control,
    Alloc,
    Unknown,
}

impl Category {
    /// Canonical report order
    pub const ALL: [Category; 5] = [
        Category::Frontend,
        Category::Uvm,
        Category::Control,
        Category::Alloc,
        Category::Unknown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Frontend => "Frontend",
            Category::Uvm => "UVM",
            Category::Control => "Control",
            Category::Alloc => "Alloc",
            Category::Unknown => "Unknown",
        }
    }

    /// Categories reached only through a frontend escape code
    pub fn is_escape(&self) -> bool {
        matches!(self, Category::Control | Category::Alloc)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of classifying one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Classification {
    pub category: Category,
    pub subcategory: u32,
    /// Status reported by the driver; only meaningful for `Control` and `Alloc`
    pub status: u32,
}

impl Classification {
    pub fn new(category: Category, subcategory: u32) -> Self {
        Self {
            category,
            subcategory,
            status: 0,
        }
    }

    pub fn with_status(mut self, status: u32) -> Self {
        self.status = status;
        self
    }

    /// Pair with the originating record for a one-line log summary
    pub fn describe<'a>(&'a self, record: &'a CallRecord) -> CallSummary<'a> {
        CallSummary {
            record,
            classification: self,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("unexpected number of bytes for {layout}: got {actual}, expected one of {expected:?}")]
    SizeMismatch {
        layout: &'static str,
        expected: &'static [usize],
        actual: usize,
    },
}

/// Maps call records to [`Classification`]s
#[derive(Debug, Clone)]
pub struct Classifier {
    gpu_device: Regex,
}

impl Classifier {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            gpu_device: Regex::new(GPU_DEVICE_PATTERN)?,
        })
    }

    /// `/dev/nvidiactl` or a numbered GPU device
    pub fn is_frontend_device(&self, path: &str) -> bool {
        path == CONTROL_DEVICE_PATH || self.gpu_device.is_match(path)
    }

    pub fn classify(&self, record: &CallRecord) -> Result<Classification, ClassifyError> {
        let nr = command_number(record.request_code);
        let path = record.device_path.as_str();

        if path == UVM_DEVICE_PATH {
            return Ok(Classification::new(Category::Uvm, nr));
        }
        if !self.is_frontend_device(path) {
            return Ok(Classification::new(Category::Unknown, nr));
        }

        match nr {
            NV_ESC_RM_CONTROL => classify_control(&record.arg_payload),
            NV_ESC_RM_ALLOC => classify_alloc(&record.arg_payload),
            _ => Ok(Classification::new(Category::Frontend, nr)),
        }
    }
}

fn classify_control(data: &[u8]) -> Result<Classification, ClassifyError> {
    let params = Nvos54Parameters::from_bytes(data).ok_or(ClassifyError::SizeMismatch {
        layout: "NVOS54_PARAMETERS",
        expected: &[SIZEOF_NVOS54_PARAMETERS],
        actual: data.len(),
    })?;
    Ok(Classification::new(Category::Control, params.cmd).with_status(params.status))
}

fn classify_alloc(data: &[u8]) -> Result<Classification, ClassifyError> {
    let params = RmAllocParameters::from_bytes(data).ok_or(ClassifyError::SizeMismatch {
        layout: "RM alloc parameters",
        expected: &[SIZEOF_NVOS21_PARAMETERS, SIZEOF_NVOS64_PARAMETERS],
        actual: data.len(),
    })?;
    trace!("alloc parameters: {}", params);
    Ok(Classification::new(Category::Alloc, params.h_class()).with_status(params.status()))
}

/// One-line description of a classified call
pub struct CallSummary<'a> {
    record: &'a CallRecord,
    classification: &'a Classification,
}

impl fmt::Display for CallSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.classification;
        write!(
            f,
            "{} {:#x} {:#x} {:#x} {:#x} {:#x}",
            c.category,
            self.record.request_code,
            self.record.return_code,
            c.subcategory,
            c.status,
            self.record.arg_payload.len()
        )?;
        if !self.record.params_payload.is_empty() {
            write!(f, " (params {:#x})", self.record.params_payload.len())?;
        }
        Ok(())
    }
}
