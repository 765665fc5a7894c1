//! Captured ioctl call records and their wire decoding
//!
//! The hook emits one protobuf `Ioctl` message per call (and a second one
//! after the call returns). Only the decoded [`CallRecord`] is used past
//! this module.

use prost::Message;
use thiserror::Error;

/// Return code the hook writes for a snapshot taken before the call ran
pub const PRE_CALL_RETURN: i64 = -1;

/// Wire form of one captured call
#[derive(Clone, PartialEq, Message)]
pub struct IoctlProto {
    #[prost(string, tag = "1")]
    pub fd_path: String,
    #[prost(uint64, tag = "2")]
    pub request: u64,
    #[prost(int64, tag = "3")]
    pub ret: i64,
    #[prost(bytes = "vec", tag = "4")]
    pub arg_data: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub params_data: Vec<u8>,
    /// Producer-side guess at the subclass; ignored when classifying
    #[prost(uint32, tag = "6")]
    pub subclass: u32,
}

/// One decoded ioctl call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallRecord {
    /// Resolved path of the file descriptor the call was made on
    pub device_path: String,
    /// Raw request number
    pub request_code: u64,
    /// Syscall return value, or [`PRE_CALL_RETURN`]
    pub return_code: i64,
    /// Top-level argument bytes
    pub arg_payload: Vec<u8>,
    /// Second-level parameter bytes the hook chased through the argument's
    /// pointer (empty when there were none)
    pub params_payload: Vec<u8>,
}

impl CallRecord {
    pub fn is_pre_call(&self) -> bool {
        self.return_code == PRE_CALL_RETURN
    }
}

impl From<IoctlProto> for CallRecord {
    fn from(pb: IoctlProto) -> Self {
        Self {
            device_path: pb.fd_path,
            request_code: pb.request,
            return_code: pb.ret,
            arg_payload: pb.arg_data,
            params_payload: pb.params_data,
        }
    }
}

impl From<&CallRecord> for IoctlProto {
    fn from(record: &CallRecord) -> Self {
        Self {
            fd_path: record.device_path.clone(),
            request: record.request_code,
            ret: record.return_code,
            arg_data: record.arg_payload.clone(),
            params_data: record.params_payload.clone(),
            subclass: 0,
        }
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed protobuf record: {0}")]
    Protobuf(#[from] prost::DecodeError),
}

/// Turns one framed payload into a [`CallRecord`]
pub trait RecordDecoder {
    fn decode(&self, payload: &[u8]) -> Result<CallRecord, DecodeError>;
}

/// Decoder for the hook's protobuf output
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtoDecoder;

impl RecordDecoder for ProtoDecoder {
    fn decode(&self, payload: &[u8]) -> Result<CallRecord, DecodeError> {
        Ok(IoctlProto::decode(payload)?.into())
    }
}

/// Encode a record the way the hook does
pub fn encode_record(record: &CallRecord) -> Vec<u8> {
    IoctlProto::from(record).encode_to_vec()
}
