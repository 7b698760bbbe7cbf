use std::fs::{self, File};
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{NspdError, Result};
use crate::spectrum::{
    parse_cycle, parse_options_table, write_cycle, write_options_table, AmpPhaseOptions, CycleData,
};

/// First bytes of a stand-alone cycle file.
pub const CYCLE_FILE_MAGIC: &[u8; 8] = b"NSPDCYC1";

/// Loads a stand-alone cycle: the magic, the options table, then the
/// spectrum in the same encoding the server sends.
pub fn read_cycle_file(path: &Path) -> Result<(Vec<AmpPhaseOptions>, CycleData)> {
    let bytes = fs::read(path)?;
    let mut cursor = Cursor::new(bytes.as_slice());

    let mut magic = [0u8; 8];
    cursor
        .read_exact(&mut magic)
        .map_err(|_| NspdError::parse(format!("{}: too short for a cycle file", path.display())))?;
    if &magic != CYCLE_FILE_MAGIC {
        return Err(NspdError::parse(format!(
            "{}: not a cycle file",
            path.display()
        )));
    }

    let truncated = |e: io::Error| match e.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
            NspdError::parse(format!("{}: {}", path.display(), e))
        }
        _ => NspdError::Io(e),
    };
    let options = parse_options_table(&mut cursor).map_err(truncated)?;
    let cycle = parse_cycle(&mut cursor).map_err(truncated)?;
    if cursor.position() as usize != bytes.len() {
        debug!(
            "{}: {} trailing bytes ignored",
            path.display(),
            bytes.len() - cursor.position() as usize
        );
    }
    info!(
        "read {} windows of {} from {}",
        cycle.num_windows(),
        cycle.header.source_name,
        path.display()
    );
    Ok((options, cycle))
}

pub fn write_cycle_file(path: &Path, options: &[AmpPhaseOptions], cycle: &CycleData) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(CYCLE_FILE_MAGIC)?;
    write_options_table(&mut writer, options)?;
    write_cycle(&mut writer, cycle)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::{AmpPhaseBlock, Baseline, Pol, WindowOptions, C32};

    fn sample() -> (Vec<AmpPhaseOptions>, CycleData) {
        let block = AmpPhaseBlock::from_raw(
            0,
            "f1",
            Pol::XX,
            0,
            (0..4).map(|c| c as f32).collect(),
            vec![2100.0, 2099.0, 2098.0, 2097.0],
            vec![Baseline::new(1, 1), Baseline::new(1, 2)],
            vec![
                vec![vec![C32::new(2.0, 0.0); 4]],
                vec![vec![C32::new(0.0, 1.0); 4]],
            ],
        );
        let mut cycle = CycleData {
            windows: vec![vec![block]],
            ..CycleData::default()
        };
        cycle.header.obs_date = "2017-09-04".into();
        cycle.header.ut_seconds = 864.0;
        cycle.header.source_name = "1934-638".into();
        let options = vec![AmpPhaseOptions {
            windows: vec![WindowOptions {
                min_tvchannel: 1,
                max_tvchannel: 2,
                ..WindowOptions::default()
            }],
            ..AmpPhaseOptions::default()
        }];
        (options, cycle)
    }

    #[test]
    fn cycle_file_survives_a_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cycle.nspd");
        let (options, cycle) = sample();
        write_cycle_file(&path, &options, &cycle).unwrap();

        let (read_options, read_cycle) = read_cycle_file(&path).unwrap();
        assert_eq!(read_options, options);
        assert_eq!(read_cycle.header.source_name, "1934-638");
        assert!((read_cycle.mjd().unwrap() - 58000.01).abs() < 1e-9);
        assert_eq!(read_cycle.windows[0][0].baselines, cycle.windows[0][0].baselines);
    }

    #[test]
    fn wrong_magic_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.bin");
        fs::write(&path, b"NOTACYCLEFILE").unwrap();
        assert!(matches!(read_cycle_file(&path), Err(NspdError::Parse(_))));
        fs::write(&path, b"NSP").unwrap();
        assert!(matches!(read_cycle_file(&path), Err(NspdError::Parse(_))));
    }

    #[test]
    fn truncated_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.nspd");
        let (options, cycle) = sample();
        write_cycle_file(&path, &options, &cycle).unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(matches!(read_cycle_file(&path), Err(NspdError::Parse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_cycle_file(&dir.path().join("absent")),
            Err(NspdError::Io(_))
        ));
    }
}
