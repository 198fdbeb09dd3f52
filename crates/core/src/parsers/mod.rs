pub mod cpuprofile;

use calltree_protocol::ProfileNode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cpuprofile: {0}")]
    CpuProfile(#[from] cpuprofile::CpuProfileParseError),
    #[error("profile tree: {0}")]
    ProfileTree(serde_json::Error),
    #[error("unable to detect format")]
    UnknownFormat,
}

/// Auto-detect the input format and produce the root profile node.
///
/// Two JSON inputs are understood:
/// 1. V8 CPU profiles (`.cpuprofile`): top-level `nodes`, `startTime`, `endTime`.
/// 2. An already aggregated [`ProfileNode`] tree: top-level `callUID`.
pub fn parse_auto(data: &[u8]) -> Result<ProfileNode, ParseError> {
    let value: serde_json::Value =
        serde_json::from_slice(data).map_err(|_| ParseError::UnknownFormat)?;
    let Some(obj) = value.as_object() else {
        return Err(ParseError::UnknownFormat);
    };

    if obj.contains_key("nodes") && obj.contains_key("startTime") && obj.contains_key("endTime") {
        return Ok(cpuprofile::parse_cpuprofile(data)?);
    }

    if obj.contains_key("callUID") {
        return serde_json::from_value(value).map_err(ParseError::ProfileTree);
    }

    Err(ParseError::UnknownFormat)
}
