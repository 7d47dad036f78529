use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::Record;

/// Wire form of one dump line: attribute names mapped to DynamoDB-typed
/// JSON values (`{"S": ...}`, `{"N": ...}`, ...), so a dump preserves the
/// store's type information exactly.
type WireRecord = HashMap<String, serde_dynamo::AttributeValue>;

/// Encodes one record as a single JSON line (no trailing newline).
pub fn encode_record(record: Record) -> serde_json::Result<String> {
    let wire: WireRecord = record.into_iter().map(|(k, v)| (k, v.into())).collect();
    serde_json::to_string(&wire)
}

/// Decodes one dump line back into a record.
pub fn decode_record(line: &str) -> serde_json::Result<Record> {
    let wire: WireRecord = serde_json::from_str(line)?;
    Ok(wire.into_iter().map(|(k, v)| (k, v.into())).collect())
}

/// `{table}.{partition}.dump[.gz]`
pub fn dump_file_name(table: &str, partition: &str, compress: bool) -> String {
    if compress {
        format!("{table}.{partition}.dump.gz")
    } else {
        format!("{table}.{partition}.dump")
    }
}

/// Line-oriented dump output, gzip-compressed or plain.
///
/// Call [`DumpWriter::finish`] when done; a gzip stream is only valid once
/// its trailer has been written.
pub enum DumpWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl DumpWriter {
    pub fn create(path: &Path, compress: bool) -> io::Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Ok(if compress {
            Self::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Self::Plain(file)
        })
    }

    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut writer) => writer.flush(),
            Self::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for DumpWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(writer) => writer.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(writer) => writer.flush(),
            Self::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Opens a dump file for line-by-line reading; a `.gz` suffix selects
/// gzip decompression.
pub fn open_reader(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    if path.extension().and_then(|ext| ext.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(BufReader::new(
            file,
        )))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
