//! K7 connectivity traces.
//!
//! A trace is a JSON header line followed by one CSV record per measured
//! link:
//!
//! ```text
//! {"node_count": 3, "channels": [11, 12], "start_date": "2018-01-11 16:32:22", "stop_date": "2018-01-12 16:32:22"}
//! datetime,src,dst,channels,mean_rssi,pdr,tx_count
//! 2018-01-11 16:32:22,0,1,[11;12],-62.5,0.98,100
//! ```
//!
//! The `channels` column holds a single channel or a `[a;b;...]` list. A
//! line starting with `datetime` is a column header and is skipped. Files
//! ending in `.gz` are decompressed on the fly. The first record of a link
//! wins; later ones describe link changes the static matrix does not model.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use flate2::read::GzDecoder;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use sixsim_config::SimSettings;
use sixsim_core::NodeId;

use super::{hopping_channels, ConnectivityMatrix, LinkQuality};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("conn.trace must be set for the K7 connectivity model")]
    MissingPath,

    #[error("failed to read trace {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("trace is empty")]
    Empty,

    #[error("invalid trace header: {0}")]
    Header(#[from] serde_json::Error),

    #[error("invalid trace date '{value}': {source}")]
    Date {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("trace line {line}: {reason}")]
    Record { line: usize, reason: String },

    #[error("trace covers {trace_secs}s but the run lasts {run_secs}s")]
    TooShort { trace_secs: f64, run_secs: f64 },

    #[error("channels {missing:?} are not in the trace (trace has {available:?})")]
    ChannelsNotCovered { missing: Vec<u8>, available: Vec<u8> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceHeader {
    pub node_count: usize,
    pub channels: Vec<u8>,
    pub start_date: String,
    pub stop_date: String,
}

impl TraceHeader {
    /// Covered time span, in seconds.
    pub fn duration_secs(&self) -> Result<f64, TraceError> {
        let start = parse_date(&self.start_date)?;
        let stop = parse_date(&self.stop_date)?;
        Ok((stop - start).num_milliseconds() as f64 / 1000.0)
    }
}

fn parse_date(value: &str) -> Result<NaiveDateTime, TraceError> {
    NaiveDateTime::parse_from_str(value, DATE_FORMAT).map_err(|source| TraceError::Date {
        value: value.to_owned(),
        source,
    })
}

/// Opens and parses the trace at `path`.
#[instrument(skip(settings), fields(path = %path.display()))]
pub fn load(path: &Path, settings: &SimSettings) -> Result<ConnectivityMatrix, TraceError> {
    let io_err = |source| TraceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let reader: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    parse(reader, settings).map_err(|err| match err {
        TraceError::Io { source, .. } => io_err(source),
        other => other,
    })
}

/// Parses a trace and checks it against the run: it must last at least as
/// long as the run and list every channel the run hops on.
pub fn parse(reader: impl BufRead, settings: &SimSettings) -> Result<ConnectivityMatrix, TraceError> {
    let mut lines = reader.lines();
    let header_line = lines.next().ok_or(TraceError::Empty)?.map_err(|source| {
        TraceError::Io {
            path: PathBuf::new(),
            source,
        }
    })?;
    let header: TraceHeader = serde_json::from_str(&header_line)?;
    check_header(&header, settings)?;

    let mut matrix = ConnectivityMatrix::new("K7").with_node_count(header.node_count);
    let mut records = 0usize;
    for (index, line) in lines.enumerate() {
        let line = line.map_err(|source| TraceError::Io {
            path: PathBuf::new(),
            source,
        })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with("datetime") {
            continue;
        }
        // Header is line 1.
        let line_no = index + 2;
        let record = parse_record(line).map_err(|reason| TraceError::Record {
            line: line_no,
            reason,
        })?;
        if record.src as usize >= header.node_count || record.dst as usize >= header.node_count {
            warn!(line = line_no, "link references a node outside node_count, skipped");
            continue;
        }
        for channel in record.channels {
            matrix
                .links
                .entry((record.src, record.dst, channel))
                .or_insert(record.link);
        }
        records += 1;
    }

    debug!(
        nodes = header.node_count,
        records,
        links = matrix.link_count(),
        "trace parsed"
    );
    Ok(matrix)
}

fn check_header(header: &TraceHeader, settings: &SimSettings) -> Result<(), TraceError> {
    let trace_secs = header.duration_secs()?;
    let run_secs = settings.run_length_secs();
    if run_secs > trace_secs {
        return Err(TraceError::TooShort {
            trace_secs,
            run_secs,
        });
    }

    let missing: Vec<u8> = hopping_channels(settings.phy.num_chans)
        .iter()
        .copied()
        .filter(|channel| !header.channels.contains(channel))
        .collect();
    if !missing.is_empty() {
        return Err(TraceError::ChannelsNotCovered {
            missing,
            available: header.channels.clone(),
        });
    }
    Ok(())
}

struct Record {
    src: NodeId,
    dst: NodeId,
    channels: Vec<u8>,
    link: LinkQuality,
}

fn parse_record(line: &str) -> Result<Record, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 6 {
        return Err(format!("expected at least 6 fields, got {}", fields.len()));
    }

    let field = |i: usize, name: &str| -> Result<f64, String> {
        fields[i]
            .parse::<f64>()
            .map_err(|e| format!("{name} '{}': {e}", fields[i]))
    };
    let node = |i: usize, name: &str| -> Result<NodeId, String> {
        fields[i]
            .parse::<NodeId>()
            .map_err(|e| format!("{name} '{}': {e}", fields[i]))
    };

    let src = node(1, "src")?;
    let dst = node(2, "dst")?;
    let channels = parse_channels(fields[3])?;
    let rssi = field(4, "mean_rssi")?;
    let pdr = field(5, "pdr")?;
    if !(0.0..=1.0).contains(&pdr) {
        return Err(format!("pdr {pdr} is outside [0, 1]"));
    }

    Ok(Record {
        src,
        dst,
        channels,
        link: LinkQuality { pdr, rssi },
    })
}

fn parse_channels(field: &str) -> Result<Vec<u8>, String> {
    field
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(';')
        .map(|c| {
            c.trim()
                .parse::<u8>()
                .map_err(|e| format!("channel '{c}': {e}"))
        })
        .collect()
}
