//! Stream processing: frame → decode → classify → dump → aggregate
//!
//! Error policy per record:
//! - framing or decode failure: logged, processing stops, partial results kept
//! - classification failure: logged, that record is skipped
//! - unsupported call with `abort_on_unsupported`: processing stops with
//!   [`Outcome::Aborted`]; the caller decides how to exit

use std::io::Read;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::{Classification, Classifier};
use crate::config::SnifferConfig;
use crate::dump::DumpWriter;
use crate::framing::FrameReader;
use crate::record::{ProtoDecoder, RecordDecoder};
use crate::results::Results;
use crate::support::is_supported;

/// How a stream run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Input exhausted, or stopped early on a read/decode error
    Completed(Results),
    /// Stopped at the first unsupported call
    Aborted {
        results: Results,
        trigger: Classification,
    },
}

impl Outcome {
    pub fn results(&self) -> &Results {
        match self {
            Outcome::Completed(results) | Outcome::Aborted { results, .. } => results,
        }
    }

    pub fn into_results(self) -> Results {
        match self {
            Outcome::Completed(results) | Outcome::Aborted { results, .. } => results,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted { .. })
    }
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Frames read off the stream
    pub records: u64,
    /// Records that classified successfully
    pub classified: u64,
    /// Records skipped because classification failed
    pub skipped: u64,
    /// Entries appended to the dump file
    pub dumped: u64,
    /// Unsupported calls recorded
    pub unsupported: u64,
}

/// Processes captured call streams against one configuration
#[derive(Debug)]
pub struct Pipeline<D = ProtoDecoder> {
    config: SnifferConfig,
    classifier: Classifier,
    decoder: D,
}

impl Pipeline<ProtoDecoder> {
    pub fn new(config: SnifferConfig) -> Result<Self, regex::Error> {
        Self::with_decoder(config, ProtoDecoder)
    }
}

impl<D: RecordDecoder> Pipeline<D> {
    pub fn with_decoder(config: SnifferConfig, decoder: D) -> Result<Self, regex::Error> {
        Ok(Self {
            config,
            classifier: Classifier::new()?,
            decoder,
        })
    }

    pub fn config(&self) -> &SnifferConfig {
        &self.config
    }

    pub fn process<R: Read>(&self, reader: R) -> Outcome {
        self.process_with_stats(reader).0
    }

    pub fn process_with_stats<R: Read>(&self, reader: R) -> (Outcome, RunStats) {
        let mut results = Results::new();
        let mut stats = RunStats::default();
        let mut dump = self.open_dump();
        let mut frames = FrameReader::new(reader);

        loop {
            let payload = match frames.read_frame() {
                Ok(Some(payload)) => payload,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read record: {}", e);
                    break;
                }
            };
            stats.records += 1;

            let record = match self.decoder.decode(&payload) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Failed to decode record: {}", e);
                    break;
                }
            };

            let c = match self.classifier.classify(&record) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Failed to parse ioctl on {}: {}", record.device_path, e);
                    stats.skipped += 1;
                    continue;
                }
            };
            stats.classified += 1;
            debug!("{}", c.describe(&record));

            if let Some(writer) = dump.as_mut() {
                if record.is_pre_call() && c.category.is_escape() {
                    match writer.write_entry(&record, &c) {
                        Ok(()) => stats.dumped += 1,
                        Err(e) => warn!(
                            "Failed to write dump entry to {}: {}",
                            writer.path().display(),
                            e
                        ),
                    }
                }
            }

            if !is_supported(&c, &self.config.supported) {
                results.add(&c);
                stats.unsupported += 1;
                if self.config.abort_on_unsupported {
                    warn!(
                        "Unsupported ioctl found; stopping immediately: {}",
                        c.describe(&record)
                    );
                    return (
                        Outcome::Aborted {
                            results,
                            trigger: c,
                        },
                        stats,
                    );
                }
            }
        }

        info!(
            "Processed {} records ({} classified, {} skipped, {} dumped, {} unsupported)",
            stats.records, stats.classified, stats.skipped, stats.dumped, stats.unsupported
        );
        (Outcome::Completed(results), stats)
    }

    fn open_dump(&self) -> Option<DumpWriter> {
        let path = self.config.dump_path.as_ref()?;
        match DumpWriter::open(path) {
            Ok(writer) => Some(writer),
            Err(e) => {
                warn!("Failed to open dump file {}: {}", path.display(), e);
                None
            }
        }
    }
}
