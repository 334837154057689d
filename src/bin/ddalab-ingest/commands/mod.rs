pub mod validate;
pub mod watch;

use ddalab_ingest::IngestConfig;
use std::path::PathBuf;

/// Environment settings with the stream file taken from `--streams` when given.
pub(crate) fn resolve_config(streams: Option<PathBuf>) -> Result<(IngestConfig, PathBuf), String> {
    let config = IngestConfig::from_env().map_err(|e| e.to_string())?;
    let path = streams
        .or_else(|| config.streams_file.clone())
        .ok_or_else(|| "No stream definitions: pass --streams or set INGEST_STREAMS_FILE".to_string())?;
    Ok((config, path))
}
