use std::io::{self, Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::{capacity_for, read_f32_vec, read_len, write_f32_slice, write_len};
use crate::spectrum::Pol;

/// Flag bit set when an antenna is not on source.
pub const FLAG_OFF_SOURCE: u32 = 1 << 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyscalQuantity {
    OnlineTsys,
    ComputedTsys,
    Gtp,
    Sdo,
    CalJy,
}

/// System calibration tables for one cycle, indexed `[antenna][window][pol]`
/// with pol 0 = X and 1 = Y.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyscalData {
    pub ant_num: Vec<u32>,
    pub num_windows: usize,
    pub online_tsys: Vec<Vec<[f32; 2]>>,
    pub computed_tsys: Vec<Vec<[f32; 2]>>,
    pub gtp: Vec<Vec<[f32; 2]>>,
    pub sdo: Vec<Vec<[f32; 2]>>,
    pub caljy: Vec<Vec<[f32; 2]>>,
    pub flagging: Vec<u32>,
}

fn pol_slot(pol: Pol) -> Option<usize> {
    match pol {
        Pol::XX => Some(0),
        Pol::YY => Some(1),
        Pol::XY | Pol::YX => None,
    }
}

impl SyscalData {
    pub fn num_ants(&self) -> usize {
        self.ant_num.len()
    }

    pub fn ant_index(&self, ant: u32) -> Option<usize> {
        self.ant_num.iter().position(|a| *a == ant)
    }

    fn table(&self, quantity: SyscalQuantity) -> &Vec<Vec<[f32; 2]>> {
        match quantity {
            SyscalQuantity::OnlineTsys => &self.online_tsys,
            SyscalQuantity::ComputedTsys => &self.computed_tsys,
            SyscalQuantity::Gtp => &self.gtp,
            SyscalQuantity::Sdo => &self.sdo,
            SyscalQuantity::CalJy => &self.caljy,
        }
    }

    /// Value for antenna `ant` (1-based number), window slot and parallel pol.
    pub fn value(&self, quantity: SyscalQuantity, ant: u32, window: usize, pol: Pol) -> Option<f32> {
        let a = self.ant_index(ant)?;
        let p = pol_slot(pol)?;
        self.table(quantity)
            .get(a)?
            .get(window)
            .map(|pair| pair[p])
            .filter(|v| v.is_finite())
    }

    pub fn is_on_source(&self, ant: u32) -> bool {
        self.ant_index(ant)
            .and_then(|a| self.flagging.get(a))
            .map(|flag| flag & FLAG_OFF_SOURCE == 0)
            .unwrap_or(false)
    }

    /// One character per antenna 1..=`max_ants`: the digit when on source, `-` otherwise.
    pub fn on_source_string(&self, max_ants: u32) -> String {
        (1..=max_ants)
            .map(|ant| {
                if self.is_on_source(ant) {
                    char::from_digit(ant % 10, 10).unwrap_or('?')
                } else {
                    '-'
                }
            })
            .collect()
    }
}

/// Tsys per window and antenna, ready for display as `XX / YY`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TsysTable {
    pub ant_num: Vec<u32>,
    /// `[window][antenna]`.
    pub cells: Vec<Vec<Option<(f32, f32)>>>,
}

impl TsysTable {
    pub fn num_windows(&self) -> usize {
        self.cells.len()
    }

    pub fn format_cell(&self, window: usize, ant_index: usize) -> String {
        match self.cells.get(window).and_then(|row| row.get(ant_index)).copied().flatten() {
            Some((xx, yy)) => format!("{:.1} / {:.1}", xx, yy),
            None => "- / -".to_string(),
        }
    }
}

/// Collects the Tsys to show for the first `num_windows` windows, preferring
/// the computed value when it is positive.
pub fn compile_tsys(syscal: &SyscalData, num_windows: usize) -> TsysTable {
    let num_windows = num_windows.min(syscal.num_windows);
    let pick = |a: usize, w: usize, p: usize| -> Option<f32> {
        let computed = syscal.computed_tsys.get(a)?.get(w).map(|pair| pair[p]);
        let online = syscal.online_tsys.get(a)?.get(w).map(|pair| pair[p]);
        match computed {
            Some(v) if v.is_finite() && v > 0.0 => Some(v),
            _ => online.filter(|v| v.is_finite()),
        }
    };
    let cells = (0..num_windows)
        .map(|w| {
            (0..syscal.num_ants())
                .map(|a| match (pick(a, w, 0), pick(a, w, 1)) {
                    (Some(xx), Some(yy)) => Some((xx, yy)),
                    _ => None,
                })
                .collect()
        })
        .collect();
    TsysTable {
        ant_num: syscal.ant_num.clone(),
        cells,
    }
}

fn parse_table(
    cursor: &mut Cursor<&[u8]>,
    nants: usize,
    nwin: usize,
) -> io::Result<Vec<Vec<[f32; 2]>>> {
    let flat = read_f32_vec(cursor)?;
    if nwin == 0 {
        return Ok(vec![Vec::new(); nants]);
    }
    if flat.len() != nants * nwin * 2 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "syscal table has {} values, expected {}",
                flat.len(),
                nants * nwin * 2
            ),
        ));
    }
    Ok(flat
        .chunks_exact(nwin * 2)
        .map(|ant| ant.chunks_exact(2).map(|p| [p[0], p[1]]).collect())
        .collect())
}

fn write_table<W: Write>(w: &mut W, table: &[Vec<[f32; 2]>]) -> io::Result<()> {
    let flat: Vec<f32> = table.iter().flatten().flat_map(|p| p.iter().copied()).collect();
    write_f32_slice(w, &flat)
}

pub fn parse_syscal(cursor: &mut Cursor<&[u8]>) -> io::Result<SyscalData> {
    let nants = read_len(cursor)?;
    let mut ant_num = Vec::with_capacity(capacity_for(cursor, nants, 8));
    let mut flagging = Vec::with_capacity(capacity_for(cursor, nants, 8));
    for _ in 0..nants {
        ant_num.push(cursor.read_u32::<LittleEndian>()?);
        flagging.push(cursor.read_u32::<LittleEndian>()?);
    }
    let nwin = read_len(cursor)?;
    let online_tsys = parse_table(cursor, nants, nwin)?;
    let computed_tsys = parse_table(cursor, nants, nwin)?;
    let gtp = parse_table(cursor, nants, nwin)?;
    let sdo = parse_table(cursor, nants, nwin)?;
    let caljy = parse_table(cursor, nants, nwin)?;
    Ok(SyscalData {
        ant_num,
        num_windows: nwin,
        online_tsys,
        computed_tsys,
        gtp,
        sdo,
        caljy,
        flagging,
    })
}

pub fn write_syscal<W: Write>(w: &mut W, syscal: &SyscalData) -> io::Result<()> {
    write_len(w, syscal.ant_num.len())?;
    for (a, ant) in syscal.ant_num.iter().enumerate() {
        w.write_u32::<LittleEndian>(*ant)?;
        w.write_u32::<LittleEndian>(syscal.flagging.get(a).copied().unwrap_or(0))?;
    }
    write_len(w, syscal.num_windows)?;
    for table in [
        &syscal.online_tsys,
        &syscal.computed_tsys,
        &syscal.gtp,
        &syscal.sdo,
        &syscal.caljy,
    ] {
        write_table(w, table)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_antenna_syscal() -> SyscalData {
        SyscalData {
            ant_num: vec![1, 2],
            num_windows: 2,
            online_tsys: vec![
                vec![[30.0, 31.0], [40.0, 41.0]],
                vec![[32.0, 33.0], [42.0, 43.0]],
            ],
            computed_tsys: vec![
                vec![[0.0, 0.0], [45.5, 46.5]],
                vec![[0.0, 0.0], [0.0, 0.0]],
            ],
            gtp: vec![vec![[1.0, 2.0]; 2]; 2],
            sdo: vec![vec![[3.0, 4.0]; 2]; 2],
            caljy: vec![vec![[5.0, 6.0]; 2]; 2],
            flagging: vec![0, FLAG_OFF_SOURCE],
        }
    }

    #[test]
    fn computed_tsys_wins_when_positive() {
        let table = compile_tsys(&two_antenna_syscal(), 2);
        assert_eq!(table.cells[0][0], Some((30.0, 31.0)));
        assert_eq!(table.cells[1][0], Some((45.5, 46.5)));
        assert_eq!(table.cells[1][1], Some((42.0, 43.0)));
        assert_eq!(table.format_cell(1, 0), "45.5 / 46.5");
    }

    #[test]
    fn on_source_string_marks_flagged_antennas() {
        let syscal = two_antenna_syscal();
        assert_eq!(syscal.on_source_string(4), "1---");
        assert!(syscal.is_on_source(1));
        assert!(!syscal.is_on_source(2));
    }

    #[test]
    fn values_are_looked_up_by_antenna_number() {
        let syscal = two_antenna_syscal();
        assert_eq!(syscal.value(SyscalQuantity::Sdo, 2, 1, Pol::YY), Some(4.0));
        assert_eq!(syscal.value(SyscalQuantity::Gtp, 3, 0, Pol::XX), None);
        assert_eq!(syscal.value(SyscalQuantity::CalJy, 1, 0, Pol::XY), None);
    }

    #[test]
    fn syscal_encoding_round_trip() {
        let syscal = two_antenna_syscal();
        let mut buf = Vec::new();
        write_syscal(&mut buf, &syscal).unwrap();
        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(parse_syscal(&mut cursor).unwrap(), syscal);
    }
}
