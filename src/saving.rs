use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{Error, ErrorKind};
use std::path::Path;

use crate::dataset::Dataset;

/// Bumped whenever the snapshot layout changes; snapshots carrying a
/// different version are refused at load time instead of deserializing
/// into garbage.
const SNAPSHOT_VERSION: u16 = 1;

/// Writes a dataset snapshot.
///
/// The gzip stream goes to a temporary file in the target directory which
/// is renamed over the destination once fully written, so a crash mid-write
/// never leaves a truncated snapshot behind.
pub fn save_dataset(dataset: &Dataset, filename: &str) -> std::io::Result<()> {
    let path = Path::new(filename);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
        let mut writer = std::io::BufWriter::new(encoder);

        serialize_into(&mut writer, &(SNAPSHOT_VERSION, dataset))
            .map_err(|e| Error::new(ErrorKind::Other, e))?;

        // The gzip footer must be on disk before the rename.
        writer
            .into_inner()
            .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?
            .finish()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// Loads a dataset snapshot written by [`save_dataset`].
pub fn load_dataset(filename: &str) -> std::io::Result<Dataset> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    let (version, dataset): (u16, Dataset) = deserialize_from(&mut reader)
        .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;

    if version != SNAPSHOT_VERSION {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("unsupported snapshot version {}", version),
        ));
    }

    Ok(dataset)
}
