use std::io::{self, Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::{
    read_bool, read_f64_vec, read_len, read_string, write_bool, write_f64_slice, write_len,
    write_string,
};
use crate::utils::{mjd_from_date_ut, parse_obs_date};

/// Per-cycle scan metadata sent with every spectrum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanHeader {
    /// `YYYY-MM-DD` (the correlator writes `YYYY/MM/DD`, both are accepted).
    pub obs_date: String,
    pub ut_seconds: f64,
    pub source_name: String,
    pub obs_type: String,
    /// Nominal integration length in seconds.
    pub cycle_time: f32,
    pub ant_label: Vec<String>,
    /// Geocentric X, Y, Z of each antenna in metres; antenna `n` is index `n - 1`.
    pub ant_cartesian: Vec<[f64; 3]>,
    pub if_centre_freq: Vec<f64>,
    pub if_bandwidth: Vec<f64>,
    pub if_num_channels: Vec<u32>,
    pub if_name: Vec<String>,
}

impl ScanHeader {
    pub fn num_ants(&self) -> usize {
        self.ant_cartesian.len()
    }

    pub fn num_ifs(&self) -> usize {
        self.if_centre_freq.len()
    }

    pub fn mjd(&self) -> Option<f64> {
        let date = parse_obs_date(&self.obs_date)?;
        Some(mjd_from_date_ut(date, self.ut_seconds))
    }

    /// Geometric separation of two antennas (1-based), zero when either is unknown.
    pub fn baseline_length(&self, ant1: u32, ant2: u32) -> f64 {
        let pos = |a: u32| {
            a.checked_sub(1)
                .and_then(|i| self.ant_cartesian.get(i as usize))
                .copied()
        };
        match (pos(ant1), pos(ant2)) {
            (Some(p1), Some(p2)) => {
                let dx = p1[0] - p2[0];
                let dy = p1[1] - p2[1];
                let dz = p1[2] - p2[2];
                (dx * dx + dy * dy + dz * dz).sqrt()
            }
            _ => 0.0,
        }
    }

    /// Centre frequency of the window whose label is `name`, in MHz.
    pub fn centre_frequency_of(&self, name: &str) -> Option<f64> {
        self.if_name
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .and_then(|i| self.if_centre_freq.get(i).copied())
    }
}

pub fn parse_scan_header(cursor: &mut Cursor<&[u8]>) -> io::Result<ScanHeader> {
    let mut header = ScanHeader {
        obs_date: read_string(cursor)?,
        ut_seconds: cursor.read_f64::<LittleEndian>()?,
        source_name: read_string(cursor)?,
        obs_type: read_string(cursor)?,
        cycle_time: cursor.read_f32::<LittleEndian>()?,
        ..ScanHeader::default()
    };

    let num_ants = read_len(cursor)?;
    for _ in 0..num_ants {
        header.ant_label.push(read_string(cursor)?);
        let x = cursor.read_f64::<LittleEndian>()?;
        let y = cursor.read_f64::<LittleEndian>()?;
        let z = cursor.read_f64::<LittleEndian>()?;
        header.ant_cartesian.push([x, y, z]);
    }

    header.if_centre_freq = read_f64_vec(cursor)?;
    header.if_bandwidth = read_f64_vec(cursor)?;
    let num_ifs = read_len(cursor)?;
    for _ in 0..num_ifs {
        header.if_num_channels.push(cursor.read_u32::<LittleEndian>()?);
        header.if_name.push(read_string(cursor)?);
    }
    Ok(header)
}

pub fn write_scan_header<W: Write>(w: &mut W, header: &ScanHeader) -> io::Result<()> {
    write_string(w, &header.obs_date)?;
    w.write_f64::<LittleEndian>(header.ut_seconds)?;
    write_string(w, &header.source_name)?;
    write_string(w, &header.obs_type)?;
    w.write_f32::<LittleEndian>(header.cycle_time)?;

    write_len(w, header.ant_cartesian.len())?;
    for (i, pos) in header.ant_cartesian.iter().enumerate() {
        let label = header.ant_label.get(i).map(String::as_str).unwrap_or("");
        write_string(w, label)?;
        for v in pos {
            w.write_f64::<LittleEndian>(*v)?;
        }
    }

    write_f64_slice(w, &header.if_centre_freq)?;
    write_f64_slice(w, &header.if_bandwidth)?;
    write_len(w, header.if_num_channels.len())?;
    for (i, nchan) in header.if_num_channels.iter().enumerate() {
        w.write_u32::<LittleEndian>(*nchan)?;
        write_string(w, header.if_name.get(i).map(String::as_str).unwrap_or(""))?;
    }
    Ok(())
}

/// Site weather and seeing-monitor readings for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetInfo {
    /// Degrees Celsius.
    pub temperature: f32,
    /// hPa.
    pub air_pressure: f32,
    /// Percent.
    pub humidity: f32,
    /// km/h.
    pub wind_speed: f32,
    /// Degrees east of north.
    pub wind_direction: f32,
    /// mm.
    pub rain_gauge: f32,
    /// Degrees.
    pub seemon_phase: f32,
    /// Microns.
    pub seemon_rms: f32,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetField {
    Temperature,
    Pressure,
    Humidity,
    WindSpeed,
    WindDirection,
    RainGauge,
    SeemonPhase,
    SeemonRms,
}

impl MetInfo {
    pub fn value(&self, field: MetField) -> f32 {
        match field {
            MetField::Temperature => self.temperature,
            MetField::Pressure => self.air_pressure,
            MetField::Humidity => self.humidity,
            MetField::WindSpeed => self.wind_speed,
            MetField::WindDirection => self.wind_direction,
            MetField::RainGauge => self.rain_gauge,
            MetField::SeemonPhase => self.seemon_phase,
            MetField::SeemonRms => self.seemon_rms,
        }
    }
}

pub fn parse_met_info(cursor: &mut Cursor<&[u8]>) -> io::Result<MetInfo> {
    Ok(MetInfo {
        temperature: cursor.read_f32::<LittleEndian>()?,
        air_pressure: cursor.read_f32::<LittleEndian>()?,
        humidity: cursor.read_f32::<LittleEndian>()?,
        wind_speed: cursor.read_f32::<LittleEndian>()?,
        wind_direction: cursor.read_f32::<LittleEndian>()?,
        rain_gauge: cursor.read_f32::<LittleEndian>()?,
        seemon_phase: cursor.read_f32::<LittleEndian>()?,
        seemon_rms: cursor.read_f32::<LittleEndian>()?,
        valid: read_bool(cursor)?,
    })
}

pub fn write_met_info<W: Write>(w: &mut W, met: &MetInfo) -> io::Result<()> {
    for v in [
        met.temperature,
        met.air_pressure,
        met.humidity,
        met.wind_speed,
        met.wind_direction,
        met.rain_gauge,
        met.seemon_phase,
        met.seemon_rms,
    ] {
        w.write_f32::<LittleEndian>(v)?;
    }
    write_bool(w, met.valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> ScanHeader {
        ScanHeader {
            obs_date: "2017/09/04".to_string(),
            ut_seconds: 864.0,
            source_name: "1934-638".to_string(),
            obs_type: "Dwell".to_string(),
            cycle_time: 10.0,
            ant_label: vec!["CA01".into(), "CA02".into(), "CA03".into()],
            ant_cartesian: vec![[0.0, 0.0, 0.0], [30.0, 40.0, 0.0], [0.0, 0.0, 12.0]],
            if_centre_freq: vec![2100.0, 5500.0],
            if_bandwidth: vec![2048.0, 2048.0],
            if_num_channels: vec![2049, 2049],
            if_name: vec!["f1".into(), "f2".into()],
        }
    }

    #[test]
    fn baseline_length_uses_cartesian_positions() {
        let header = sample_header();
        assert_eq!(header.baseline_length(1, 2), 50.0);
        assert_eq!(header.baseline_length(1, 3), 12.0);
        assert_eq!(header.baseline_length(2, 2), 0.0);
        assert_eq!(header.baseline_length(1, 7), 0.0);
    }

    #[test]
    fn header_survives_encoding() {
        let header = sample_header();
        let mut buf = Vec::new();
        write_scan_header(&mut buf, &header).unwrap();
        let mut cursor = Cursor::new(buf.as_slice());
        let parsed = parse_scan_header(&mut cursor).unwrap();
        assert_eq!(parsed, header);
        assert!((parsed.mjd().unwrap() - 58000.01).abs() < 1e-9);
        assert_eq!(parsed.centre_frequency_of("F2"), Some(5500.0));
    }

    #[test]
    fn met_fields_are_addressable() {
        let met = MetInfo {
            temperature: 21.5,
            humidity: 40.0,
            ..MetInfo::default()
        };
        assert_eq!(met.value(MetField::Temperature), 21.5);
        assert_eq!(met.value(MetField::Humidity), 40.0);
    }
}
