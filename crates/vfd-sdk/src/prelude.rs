//! Prelude 模块
//!
//! ```rust
//! use vfd_sdk::prelude::*;
//! ```

pub use vfd_driver::{
    MachineContext, MachineState, MsgLevel, ReportSink, VfdConfig, VfdSpindle, VfdSpindleBuilder,
};
pub use vfd_protocol::SpindleState;
pub use vfd_transport::RtuTransport;
