// Shared helpers for building captured call streams

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use nvsniff::classify::{CONTROL_DEVICE_PATH, UVM_DEVICE_PATH};
use nvsniff::framing::FrameWriter;
use nvsniff::ioctl::iowr;
use nvsniff::nvgpu::{
    Nvos21Parameters, Nvos54Parameters, NV_ESC_RM_ALLOC, NV_ESC_RM_CONTROL, NV_IOCTL_MAGIC,
    SIZEOF_NVOS21_PARAMETERS, SIZEOF_NVOS54_PARAMETERS,
};
use nvsniff::record::{CallRecord, PRE_CALL_RETURN};

/// Request code for a control call on `/dev/nvidiactl`
pub fn control_request() -> u64 {
    iowr(NV_IOCTL_MAGIC, NV_ESC_RM_CONTROL, SIZEOF_NVOS54_PARAMETERS as u32) as u64
}

pub fn alloc_request() -> u64 {
    iowr(NV_IOCTL_MAGIC, NV_ESC_RM_ALLOC, SIZEOF_NVOS21_PARAMETERS as u32) as u64
}

pub fn uvm_call(nr: u32) -> CallRecord {
    CallRecord {
        device_path: UVM_DEVICE_PATH.to_string(),
        request_code: nr as u64,
        return_code: 0,
        ..Default::default()
    }
}

pub fn frontend_call(path: &str, nr: u32) -> CallRecord {
    CallRecord {
        device_path: path.to_string(),
        request_code: iowr(NV_IOCTL_MAGIC, nr, 8) as u64,
        return_code: 0,
        ..Default::default()
    }
}

pub fn control_call(cmd: u32, return_code: i64) -> CallRecord {
    let params = Nvos54Parameters {
        cmd,
        ..Default::default()
    };
    CallRecord {
        device_path: CONTROL_DEVICE_PATH.to_string(),
        request_code: control_request(),
        return_code,
        arg_payload: params.to_bytes(),
        params_payload: Vec::new(),
    }
}

pub fn alloc_call(h_class: u32, status: u32, return_code: i64) -> CallRecord {
    let params = Nvos21Parameters {
        h_class,
        status,
        ..Default::default()
    };
    CallRecord {
        device_path: CONTROL_DEVICE_PATH.to_string(),
        request_code: alloc_request(),
        return_code,
        arg_payload: params.to_bytes(),
        params_payload: Vec::new(),
    }
}

pub fn pre_call(mut record: CallRecord) -> CallRecord {
    record.return_code = PRE_CALL_RETURN;
    record
}

/// Length-prefixed stream of `records`
pub fn stream(records: &[CallRecord]) -> Vec<u8> {
    let mut writer = FrameWriter::new(Vec::new());
    for record in records {
        writer.write_record(record).unwrap();
    }
    writer.into_inner()
}

pub fn write_stream(path: &Path, records: &[CallRecord]) {
    fs::write(path, stream(records)).unwrap();
}
