pub use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    collections::BTreeMap,
};
pub use thiserror::Error;
pub use itertools::Itertools;
pub use indexmap::IndexMap;
pub use clap::{Parser, ValueEnum};
pub use tracing::{debug, info, trace, warn};

pub use crate::{Client, Slot, Station, Group, Coordinator,
    client::round_down_pow2,
    classify::*,
    clientset::*,
};

/// A client's deadline slack. Always a power of two once inside the
/// engine; it doubles as the name of the tree level the client lives in.
///
/// Station tree positions are derived from laxities by plain division,
/// so we keep both in the same unsigned type.
pub type Laxity = usize;

/// The unit of logical time. The driver advances it one by one.
pub type Tick = usize;

pub type ClientId = u32;

/// An ordered, validated collection of clients. Order is the order of
/// the trace, and it matters: it decides tie-breaks among events of the
/// same time step.
pub type ClientSet = Vec<Client>;

//---START ERRORS
#[derive(Error, Debug)]
#[error("{message}\n{}", culprit)]
/// Appears while validating the [ClientSet] read from a trace.
pub struct ClientError {
    pub message: String,
    pub culprit: Client,
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("could not read trace: {0}")]
    Io(#[from] io::Error),
    #[error("malformed record at line {line}: {message}")]
    Malformed {
        line:       usize,
        message:    String,
    },
    #[error(transparent)]
    Integrity(#[from] ClientError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaxityError {
    #[error("laxity {0} is not a positive power of two")]
    NotPowerOfTwo(Laxity),
    #[error("class bounds overflow while classifying laxity {0}")]
    Overflow(Laxity),
}

/// Returned by [Station::migrate] when the hole or the subtree it was
/// told to exist cannot be found. Whoever scheduled the migration
/// broke an invariant.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateError {
    #[error("destination hole not found at level {0}")]
    NoDestinationHole(Laxity),
    #[error("origin sibling of hole not found at level {0}")]
    NoOriginSibling(Laxity),
}

/// Which clause of the [Group] invariant does not hold.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("{count} holes at level {level} in class {class}")]
    TooManyHoles {
        level:  Laxity,
        count:  usize,
        class:  LaxityClass,
    },
    #[error("{count} stations hold top-level holes in class {class}")]
    SpreadTopHoles {
        count:  usize,
        class:  LaxityClass,
    },
    #[error("station {index} of class {class} is empty")]
    EmptyStation {
        index:  usize,
        class:  LaxityClass,
    },
}
/// Returned by [TraceSpec::validate](crate::algo::generate::TraceSpec::validate).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenError {
    #[error("at least one client is needed")]
    NoClients,
    #[error("{0} clients do not fit the id space")]
    TooManyClients(usize),
    #[error("maximum laxity {max_laxity} is below {min} for {laxities:?} laxities")]
    LaxityRangeTooSmall {
        laxities:   crate::algo::generate::LaxityDistribution,
        max_laxity: Laxity,
        min:        Laxity,
    },
}
//---END ERRORS

/// Defines the interface for reading clients.
///
/// Two formats are supported out of the box, both the way the
/// trace generator writes them: a column-oriented text file and an
/// XML file. The user can implement their own types as needed.
pub trait TraceGen {
    fn new(path: PathBuf) -> Self;
    fn path(&self) -> &Path;
    /// Turns the contents of a trace into raw (still unvalidated) clients.
    fn parse<R: BufRead>(&self, reader: R) -> Result<Vec<Client>, TraceError>;

    fn read_clients(&self) -> Result<Vec<Client>, TraceError> {
        let fd = File::open(self.path())?;
        self.parse(BufReader::new(fd))
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum TraceFormat {
    /// Whitespace-separated columns: item, id, arrival, laxity, 1/laxity, departure
    Txt,
    /// `<task>` records with `<id>`, `<t_arrive>`, `<size>`, `<w_size>` and `<t_leave>`
    Xml,
}

//---START EXTERNAL INTERFACES
/// Number of header lines a text trace starts with.
pub const TXT_HEADER_LINES: usize = 2;
pub const TXT_FIELDS_NUM: usize = 6;

pub struct TxtTraceParser {
    pub path: PathBuf,
}

impl TraceGen for TxtTraceParser {
    fn new(path: PathBuf) -> Self {
        Self {
            path
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn parse<R: BufRead>(&self, reader: R) -> Result<Vec<Client>, TraceError> {
        let mut res = vec![];
        for (idx, line) in reader.lines()
            .enumerate()
            .skip(TXT_HEADER_LINES) {
            let line = line?;
            let line_num = idx + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() { continue; }
            if fields.len() < TXT_FIELDS_NUM {
                return Err(TraceError::Malformed {
                    line:       line_num,
                    message:    format!("expected {TXT_FIELDS_NUM} fields, found {}", fields.len()),
                });
            }
            // Columns 0 and 4 (item counter and weight) are derived data.
            res.push(shape_client(
                parse_count(fields[1], line_num, "id")?,
                parse_time(fields[2], line_num, "arrival")?,
                parse_time(fields[5], line_num, "departure")?,
                parse_count(fields[3], line_num, "laxity")?,
                line_num,
            )?);
        }

        Ok(res)
    }
}

pub struct XmlTraceParser {
    pub path: PathBuf,
}

impl TraceGen for XmlTraceParser {
    fn new(path: PathBuf) -> Self {
        Self {
            path
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn parse<R: BufRead>(&self, mut reader: R) -> Result<Vec<Client>, TraceError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        let mut res = vec![];
        let (mut line_num, mut scanned) = (1, 0);
        for (start, _) in content.match_indices("<task>") {
            line_num += content[scanned..start].matches('\n').count();
            scanned = start;
            let rest = &content[start..];
            let block = match rest.find("</task>") {
                Some(end)   => &rest[..end],
                None        => {
                    return Err(TraceError::Malformed {
                        line:       line_num,
                        message:    String::from("unterminated <task> record"),
                    });
                }
            };
            // `size` is the raw laxity, `w_size` the one rounded to a
            // power of two. We trust the latter.
            res.push(shape_client(
                parse_count(xml_field(block, "id", line_num)?, line_num, "id")?,
                parse_time(xml_field(block, "t_arrive", line_num)?, line_num, "arrival")?,
                parse_time(xml_field(block, "t_leave", line_num)?, line_num, "departure")?,
                parse_count(xml_field(block, "w_size", line_num)?, line_num, "laxity")?,
                line_num,
            )?);
        }

        Ok(res)
    }
}

fn xml_field<'a>(block: &'a str, tag: &str, line: usize) -> Result<&'a str, TraceError> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    block.find(&open)
        .map(|s| s + open.len())
        .and_then(|s| block[s..].find(&close).map(|e| block[s..s + e].trim()))
        .ok_or_else(|| TraceError::Malformed {
            line,
            message: format!("missing <{tag}> field"),
        })
}

fn parse_count<T: std::str::FromStr>(raw: &str, line: usize, what: &str) -> Result<T, TraceError> {
    raw.parse::<T>()
        .map_err(|_| TraceError::Malformed {
            line,
            message: format!("bad {what} '{raw}'"),
        })
}

/// Times may be written as decimals; the fractional part is dropped.
fn parse_time(raw: &str, line: usize, what: &str) -> Result<Tick, TraceError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v as Tick),
        _ => Err(TraceError::Malformed {
            line,
            message: format!("bad {what} '{raw}'"),
        }),
    }
}

/// Traces number clients from 0, but the engine wants strictly positive
/// ids, so everything is shifted by one.
fn shape_client(
    raw_id:     ClientId,
    arrival:    Tick,
    departure:  Tick,
    raw_laxity: Laxity,
    line:       usize,
) -> Result<Client, TraceError> {
    let id = raw_id.checked_add(1)
        .ok_or_else(|| TraceError::Malformed {
            line,
            message: format!("id {raw_id} out of range"),
        })?;
    let laxity = round_down_pow2(raw_laxity);
    if laxity != raw_laxity {
        warn!(id, raw_laxity, laxity, "laxity rounded down to a power of two");
    }

    Ok(Client::new(id, arrival, departure, laxity))
}
//---END EXTERNAL INTERFACES

/// Reads a trace with parser `T` and puts the result through
/// [`clientset::init`](crate::clientset::init).
pub fn read_from_path<T>(file_path: PathBuf) -> Result<ClientSet, TraceError>
where T: TraceGen {
    let parser = T::new(file_path);
    let clients = parser.read_clients()?;
    let set = crate::clientset::init(clients)?;

    Ok(set)
}

/// Same as [read_from_path], dispatching on a [TraceFormat].
pub fn read_trace(file_path: PathBuf, format: TraceFormat) -> Result<ClientSet, TraceError> {
    match format {
        TraceFormat::Txt => read_from_path::<TxtTraceParser>(file_path),
        TraceFormat::Xml => read_from_path::<XmlTraceParser>(file_path),
    }
}

/// Installs a stderr subscriber for the binaries. Each `-v` raises
/// the default level one step above `warn`; `RUST_LOG` wins if set.
pub fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    // Fails only if a subscriber is already set, which is fine.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXT: &str = "\
========================print out input==========================
it id  Arrive  weight    1/weight     Departure
0   0   3   8   0.125   10
1   1   4.0   6   0.166   9.7
";

    #[test]
    fn txt_records_are_shifted_and_rounded() {
        let p = TxtTraceParser::new(PathBuf::from("unused"));
        let clients = p.parse(TXT.as_bytes()).unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0], Client::new(1, 3, 10, 8));
        // 6 is rounded down to 4, 9.7 truncated to 9.
        assert_eq!(clients[1], Client::new(2, 4, 9, 4));
    }

    #[test]
    fn short_txt_record_is_malformed() {
        let p = TxtTraceParser::new(PathBuf::from("unused"));
        let bad = "h1\nh2\n0 0 3 8\n";
        match p.parse(bad.as_bytes()) {
            Err(TraceError::Malformed { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn xml_records_use_rounded_size() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><input>\n\
<task>\n   <id>4</id>\n   <t_arrive>2</t_arrive>\n   <size>13</size>\n   <w_size>8</w_size>\n   <t_leave>7</t_leave>\n</task>\n\
</input>\n";
        let p = XmlTraceParser::new(PathBuf::from("unused"));
        let clients = p.parse(xml.as_bytes()).unwrap();
        assert_eq!(clients, vec![Client::new(5, 2, 7, 8)]);
    }

    #[test]
    fn xml_missing_field_is_reported() {
        let xml = "<input>\n<task><id>1</id><t_arrive>2</t_arrive></task>\n</input>";
        let p = XmlTraceParser::new(PathBuf::from("unused"));
        assert!(matches!(p.parse(xml.as_bytes()), Err(TraceError::Malformed { line: 2, .. })));
    }

    #[test]
    fn xml_line_numbers_advance_across_records() {
        let xml = "<input>\n\
<task><id>0</id><t_arrive>1</t_arrive><size>2</size><w_size>2</w_size><t_leave>3</t_leave></task>\n\
\n\
<task><id>1</id><t_arrive>1</t_arrive><size>2</size><w_size>2</w_size><t_leave>3</t_leave></task>\n\
<task><id>2</id><t_arrive>1</t_arrive></task>\n\
</input>";
        let p = XmlTraceParser::new(PathBuf::from("unused"));
        assert!(matches!(p.parse(xml.as_bytes()), Err(TraceError::Malformed { line: 5, .. })));
    }
}
