//! RPC-layer wire structures (§3, §6): the call header every call opens
//! with, and the response header every responder answers with.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallHeader {
    pub selector: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, rename = "continue")]
    pub r#continue: bool,
}
