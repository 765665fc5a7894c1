//! Linux ioctl request number encoding
//!
//! Generic layout used by x86_64 and arm64:
//!
//! ```text
//!  31 30 29                16 15        8 7          0
//! +-----+--------------------+-----------+------------+
//! | dir |        size        |   type    |     nr     |
//! +-----+--------------------+-----------+------------+
//! ```

pub const IOC_NRBITS: u32 = 8;
pub const IOC_TYPEBITS: u32 = 8;
pub const IOC_SIZEBITS: u32 = 14;
pub const IOC_DIRBITS: u32 = 2;

pub const IOC_NRSHIFT: u32 = 0;
pub const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
pub const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
pub const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_NRMASK: u32 = (1 << IOC_NRBITS) - 1;
const IOC_TYPEMASK: u32 = (1 << IOC_TYPEBITS) - 1;
const IOC_SIZEMASK: u32 = (1 << IOC_SIZEBITS) - 1;
const IOC_DIRMASK: u32 = (1 << IOC_DIRBITS) - 1;

pub const IOC_NONE: u32 = 0;
pub const IOC_WRITE: u32 = 1;
pub const IOC_READ: u32 = 2;

/// Build a request number from its parts (the `_IOC` macro)
pub const fn ioc(dir: u32, ty: u32, nr: u32, size: u32) -> u32 {
    ((dir & IOC_DIRMASK) << IOC_DIRSHIFT)
        | ((ty & IOC_TYPEMASK) << IOC_TYPESHIFT)
        | ((nr & IOC_NRMASK) << IOC_NRSHIFT)
        | ((size & IOC_SIZEMASK) << IOC_SIZESHIFT)
}

/// `_IOWR(ty, nr, size)`
pub const fn iowr(ty: u32, nr: u32, size: u32) -> u32 {
    ioc(IOC_READ | IOC_WRITE, ty, nr, size)
}

/// Command number of a request
pub const fn ioc_nr(request: u32) -> u32 {
    (request >> IOC_NRSHIFT) & IOC_NRMASK
}

/// Type (magic) byte of a request
pub const fn ioc_type(request: u32) -> u32 {
    (request >> IOC_TYPESHIFT) & IOC_TYPEMASK
}

/// Argument size encoded in a request
pub const fn ioc_size(request: u32) -> u32 {
    (request >> IOC_SIZESHIFT) & IOC_SIZEMASK
}

/// Transfer direction bits of a request
pub const fn ioc_dir(request: u32) -> u32 {
    (request >> IOC_DIRSHIFT) & IOC_DIRMASK
}

/// Command number of a word-sized request as captured from userspace.
///
/// Only the low 32 bits carry the encoding; anything above is ignored.
pub fn command_number(request: u64) -> u32 {
    ioc_nr(request as u32)
}
