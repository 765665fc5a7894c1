//! NVIDIA kernel driver ABI: escape codes, status values and the fixed
//! parameter layouts carried by `NV_ESC_RM_CONTROL` / `NV_ESC_RM_ALLOC`.
//!
//! All layouts are the 64-bit little-endian forms.

use std::fmt;

/// `NV_IOCTL_MAGIC`
pub const NV_IOCTL_MAGIC: u32 = b'F' as u32;

/// Frontend escape for resource manager control calls
pub const NV_ESC_RM_CONTROL: u32 = 0x2a;
/// Frontend escape for resource manager object allocation
pub const NV_ESC_RM_ALLOC: u32 = 0x2b;

/// Control commands with this bit set are legacy GSP pass-through calls
pub const RM_GSS_LEGACY_MASK: u32 = 0x0000_8000;
/// Interface id (high half of the command) of the opaque binary API family
pub const NV2081_BINAPI: u32 = 0x2081;

pub const NV_OK: u32 = 0x0000_0000;
pub const NV_ERR_INVALID_CLASS: u32 = 0x0000_0022;

pub const SIZEOF_NVOS54_PARAMETERS: usize = 32;
pub const SIZEOF_NVOS21_PARAMETERS: usize = 32;
pub const SIZEOF_NVOS64_PARAMETERS: usize = 48;

/// Bounds-checked little-endian field reader over a fixed-size buffer.
///
/// Callers check the total length first, so offsets are always in range.
struct Fields<'a>(&'a [u8]);

impl Fields<'_> {
    fn u32_at(&self, off: usize) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.0[off..off + 4]);
        u32::from_le_bytes(buf)
    }

    fn u64_at(&self, off: usize) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[off..off + 8]);
        u64::from_le_bytes(buf)
    }
}

/// `NVOS54_PARAMETERS`, the argument of `NV_ESC_RM_CONTROL`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Nvos54Parameters {
    pub h_client: u32,
    pub h_object: u32,
    pub cmd: u32,
    pub flags: u32,
    pub params: u64,
    pub params_size: u32,
    pub status: u32,
}

impl Nvos54Parameters {
    /// Decode from exactly [`SIZEOF_NVOS54_PARAMETERS`] bytes
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != SIZEOF_NVOS54_PARAMETERS {
            return None;
        }
        let f = Fields(data);
        Some(Self {
            h_client: f.u32_at(0),
            h_object: f.u32_at(4),
            cmd: f.u32_at(8),
            flags: f.u32_at(12),
            params: f.u64_at(16),
            params_size: f.u32_at(24),
            status: f.u32_at(28),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SIZEOF_NVOS54_PARAMETERS);
        out.extend_from_slice(&self.h_client.to_le_bytes());
        out.extend_from_slice(&self.h_object.to_le_bytes());
        out.extend_from_slice(&self.cmd.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.params.to_le_bytes());
        out.extend_from_slice(&self.params_size.to_le_bytes());
        out.extend_from_slice(&self.status.to_le_bytes());
        out
    }
}

/// `NVOS21_PARAMETERS`, the default argument of `NV_ESC_RM_ALLOC`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Nvos21Parameters {
    pub h_root: u32,
    pub h_object_parent: u32,
    pub h_object_new: u32,
    pub h_class: u32,
    pub p_alloc_parms: u64,
    pub params_size: u32,
    pub status: u32,
}

impl Nvos21Parameters {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != SIZEOF_NVOS21_PARAMETERS {
            return None;
        }
        let f = Fields(data);
        Some(Self {
            h_root: f.u32_at(0),
            h_object_parent: f.u32_at(4),
            h_object_new: f.u32_at(8),
            h_class: f.u32_at(12),
            p_alloc_parms: f.u64_at(16),
            params_size: f.u32_at(24),
            status: f.u32_at(28),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SIZEOF_NVOS21_PARAMETERS);
        out.extend_from_slice(&self.h_root.to_le_bytes());
        out.extend_from_slice(&self.h_object_parent.to_le_bytes());
        out.extend_from_slice(&self.h_object_new.to_le_bytes());
        out.extend_from_slice(&self.h_class.to_le_bytes());
        out.extend_from_slice(&self.p_alloc_parms.to_le_bytes());
        out.extend_from_slice(&self.params_size.to_le_bytes());
        out.extend_from_slice(&self.status.to_le_bytes());
        out
    }
}

/// `NVOS64_PARAMETERS`, the extended argument of `NV_ESC_RM_ALLOC`
/// (adds the rights pointer and flags)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Nvos64Parameters {
    pub h_root: u32,
    pub h_object_parent: u32,
    pub h_object_new: u32,
    pub h_class: u32,
    pub p_alloc_parms: u64,
    pub p_rights_requested: u64,
    pub params_size: u32,
    pub flags: u32,
    pub status: u32,
}

impl Nvos64Parameters {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != SIZEOF_NVOS64_PARAMETERS {
            return None;
        }
        let f = Fields(data);
        Some(Self {
            h_root: f.u32_at(0),
            h_object_parent: f.u32_at(4),
            h_object_new: f.u32_at(8),
            h_class: f.u32_at(12),
            p_alloc_parms: f.u64_at(16),
            p_rights_requested: f.u64_at(24),
            params_size: f.u32_at(32),
            flags: f.u32_at(36),
            status: f.u32_at(40),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SIZEOF_NVOS64_PARAMETERS);
        out.extend_from_slice(&self.h_root.to_le_bytes());
        out.extend_from_slice(&self.h_object_parent.to_le_bytes());
        out.extend_from_slice(&self.h_object_new.to_le_bytes());
        out.extend_from_slice(&self.h_class.to_le_bytes());
        out.extend_from_slice(&self.p_alloc_parms.to_le_bytes());
        out.extend_from_slice(&self.p_rights_requested.to_le_bytes());
        out.extend_from_slice(&self.params_size.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.status.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }
}

/// Either allocation layout, selected by argument size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmAllocParameters {
    Default(Nvos21Parameters),
    Extended(Nvos64Parameters),
}

impl RmAllocParameters {
    /// Pick the layout by exact length; any other length is rejected
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        match data.len() {
            SIZEOF_NVOS21_PARAMETERS => Nvos21Parameters::from_bytes(data).map(Self::Default),
            SIZEOF_NVOS64_PARAMETERS => Nvos64Parameters::from_bytes(data).map(Self::Extended),
            _ => None,
        }
    }

    pub fn h_class(&self) -> u32 {
        match self {
            Self::Default(p) => p.h_class,
            Self::Extended(p) => p.h_class,
        }
    }

    pub fn status(&self) -> u32 {
        match self {
            Self::Default(p) => p.status,
            Self::Extended(p) => p.status,
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self, Self::Extended(_))
    }
}

impl fmt::Display for RmAllocParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = if self.is_extended() { "NVOS64" } else { "NVOS21" };
        write!(
            f,
            "{} hClass={:#x} status={:#x}",
            layout,
            self.h_class(),
            self.status()
        )
    }
}
