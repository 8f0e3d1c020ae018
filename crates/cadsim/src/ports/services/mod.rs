//! Service Ports
//!
//! Abstract interfaces for external services.

mod llm_oracle;

pub use llm_oracle::*;
