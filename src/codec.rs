//! Little-endian binary encoding shared by the server protocol and the
//! stand-alone cycle files.
//!
//! Every value is written with `byteorder`; strings and arrays carry a `u32`
//! length prefix. Bit-packed forms (averaging method, polarisation codes)
//! only exist here, the rest of the crate works with enums.

use std::io::{self, Cursor, Error, ErrorKind, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_complex::Complex;

use crate::spectrum::{AveragingDomain, AveragingKind, AveragingMethod, Pol};

// Refuse absurd lengths from a corrupt frame before allocating.
const MAX_ARRAY_LEN: u32 = 1 << 26;

pub fn read_len(cursor: &mut Cursor<&[u8]>) -> io::Result<usize> {
    let n = cursor.read_u32::<LittleEndian>()?;
    if n > MAX_ARRAY_LEN {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("array length {} exceeds limit", n),
        ));
    }
    Ok(n as usize)
}

/// Capacity to reserve for `n` wire elements of at least `elem_size` bytes
/// each, bounded by what is left in the buffer.
pub fn capacity_for(cursor: &Cursor<&[u8]>, n: usize, elem_size: usize) -> usize {
    let remaining = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
    n.min(remaining / elem_size.max(1))
}

pub fn write_len<W: Write>(w: &mut W, n: usize) -> io::Result<()> {
    let n = u32::try_from(n)
        .map_err(|_| Error::new(ErrorKind::InvalidInput, "array too long to encode"))?;
    w.write_u32::<LittleEndian>(n)
}

pub fn read_string(cursor: &mut Cursor<&[u8]>) -> io::Result<String> {
    let n = read_len(cursor)?;
    if capacity_for(cursor, n, 1) < n {
        return Err(Error::new(ErrorKind::UnexpectedEof, "string runs past the end"));
    }
    let mut buf = vec![0u8; n];
    cursor.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).trim_end_matches('\0').to_string())
}

pub fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_len(w, s.len())?;
    w.write_all(s.as_bytes())
}

pub fn read_bool(cursor: &mut Cursor<&[u8]>) -> io::Result<bool> {
    Ok(cursor.read_u8()? != 0)
}

pub fn write_bool<W: Write>(w: &mut W, value: bool) -> io::Result<()> {
    w.write_u8(u8::from(value))
}

pub fn read_f32_vec(cursor: &mut Cursor<&[u8]>) -> io::Result<Vec<f32>> {
    let n = read_len(cursor)?;
    let mut out = Vec::with_capacity(capacity_for(cursor, n, 4));
    for _ in 0..n {
        out.push(cursor.read_f32::<LittleEndian>()?);
    }
    Ok(out)
}

pub fn write_f32_slice<W: Write>(w: &mut W, values: &[f32]) -> io::Result<()> {
    write_len(w, values.len())?;
    for v in values {
        w.write_f32::<LittleEndian>(*v)?;
    }
    Ok(())
}

pub fn read_f64_vec(cursor: &mut Cursor<&[u8]>) -> io::Result<Vec<f64>> {
    let n = read_len(cursor)?;
    let mut out = Vec::with_capacity(capacity_for(cursor, n, 8));
    for _ in 0..n {
        out.push(cursor.read_f64::<LittleEndian>()?);
    }
    Ok(out)
}

pub fn write_f64_slice<W: Write>(w: &mut W, values: &[f64]) -> io::Result<()> {
    write_len(w, values.len())?;
    for v in values {
        w.write_f64::<LittleEndian>(*v)?;
    }
    Ok(())
}

pub fn read_complex_vec(cursor: &mut Cursor<&[u8]>) -> io::Result<Vec<Complex<f32>>> {
    let n = read_len(cursor)?;
    let mut out = Vec::with_capacity(capacity_for(cursor, n, 8));
    for _ in 0..n {
        let re = cursor.read_f32::<LittleEndian>()?;
        let im = cursor.read_f32::<LittleEndian>()?;
        out.push(Complex::new(re, im));
    }
    Ok(out)
}

pub fn write_complex_slice<W: Write>(w: &mut W, values: &[Complex<f32>]) -> io::Result<()> {
    write_len(w, values.len())?;
    for v in values {
        w.write_f32::<LittleEndian>(v.re)?;
        w.write_f32::<LittleEndian>(v.im)?;
    }
    Ok(())
}

// Averaging method bits as the server packs them.
const AVERAGETYPE_MEAN: u32 = 1;
const AVERAGETYPE_MEDIAN: u32 = 2;
const AVERAGETYPE_VECTOR: u32 = 4;
const AVERAGETYPE_SCALAR: u32 = 8;

pub fn averaging_to_bits(method: AveragingMethod) -> u32 {
    let kind = match method.kind {
        AveragingKind::Mean => AVERAGETYPE_MEAN,
        AveragingKind::Median => AVERAGETYPE_MEDIAN,
    };
    let domain = match method.domain {
        AveragingDomain::Vector => AVERAGETYPE_VECTOR,
        AveragingDomain::Scalar => AVERAGETYPE_SCALAR,
    };
    kind | domain
}

pub fn averaging_from_bits(bits: u32) -> AveragingMethod {
    let kind = if bits & AVERAGETYPE_MEDIAN != 0 {
        AveragingKind::Median
    } else {
        AveragingKind::Mean
    };
    let domain = if bits & AVERAGETYPE_SCALAR != 0 {
        AveragingDomain::Scalar
    } else {
        AveragingDomain::Vector
    };
    AveragingMethod { kind, domain }
}

// Polarisation codes as the correlator numbers them.
const POL_XX: u8 = 1;
const POL_YY: u8 = 2;
const POL_XY: u8 = 3;
const POL_YX: u8 = 4;

pub fn pol_to_code(pol: Pol) -> u8 {
    match pol {
        Pol::XX => POL_XX,
        Pol::YY => POL_YY,
        Pol::XY => POL_XY,
        Pol::YX => POL_YX,
    }
}

pub fn pol_from_code(code: u8) -> io::Result<Pol> {
    match code {
        POL_XX => Ok(Pol::XX),
        POL_YY => Ok(Pol::YY),
        POL_XY => Ok(Pol::XY),
        POL_YX => Ok(Pol::YX),
        other => Err(Error::new(
            ErrorKind::InvalidData,
            format!("unknown polarisation code {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_length_prefixed() {
        let mut buf = Vec::new();
        write_string(&mut buf, "1934-638").unwrap();
        assert_eq!(&buf[..4], &[8, 0, 0, 0]);
        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(read_string(&mut cursor).unwrap(), "1934-638");
    }

    #[test]
    fn corrupt_length_is_rejected() {
        let buf = u32::MAX.to_le_bytes();
        let mut cursor = Cursor::new(&buf[..]);
        assert!(read_f32_vec(&mut cursor).is_err());
    }

    #[test]
    fn short_frame_caps_the_reservation() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(1u32 << 26).to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(read_len(&mut cursor).unwrap(), 1 << 26);
        assert_eq!(capacity_for(&cursor, 1 << 26, 8), 2);

        let mut cursor = Cursor::new(buf.as_slice());
        let err = read_complex_vec(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(read_string(&mut cursor).unwrap_err().kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn averaging_bits_match_server_layout() {
        let method = AveragingMethod {
            kind: AveragingKind::Median,
            domain: AveragingDomain::Scalar,
        };
        assert_eq!(averaging_to_bits(method), 10);
        assert_eq!(averaging_from_bits(5), AveragingMethod::default());
    }

    #[test]
    fn unknown_pol_code_fails() {
        assert!(pol_from_code(9).is_err());
        assert_eq!(pol_from_code(pol_to_code(Pol::YX)).unwrap(), Pol::YX);
    }
}
