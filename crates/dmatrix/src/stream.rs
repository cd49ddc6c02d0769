//! Little-endian stream primitives shared by the binary formats.
//!
//! Strings and vectors are length-prefixed with a `u64` element count.

use std::io::{ErrorKind, Read, Write};

use crate::error::{DataError, FormatError, Result};

/// Plain-old-data values with a fixed little-endian encoding.
pub trait Pod: Copy + Default {
    const SIZE: usize;
    fn write_le(self, out: &mut Vec<u8>);
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_pod {
    ($($t:ty),*) => {$(
        impl Pod for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            #[inline]
            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..Self::SIZE]);
                <$t>::from_le_bytes(buf)
            }
        }
    )*};
}

impl_pod!(u8, u32, u64, i32, f32, f64);

/// Map an unexpected EOF onto a truncation error naming `what`.
pub(crate) fn truncated(what: &'static str) -> impl FnOnce(std::io::Error) -> DataError {
    move |e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            FormatError::Truncated(what).into()
        } else {
            DataError::Io(e)
        }
    }
}

pub fn write_pod<W: Write, T: Pod>(w: &mut W, value: T) -> Result<()> {
    let mut buf = Vec::with_capacity(T::SIZE);
    value.write_le(&mut buf);
    w.write_all(&buf)?;
    Ok(())
}

pub fn read_pod<R: Read, T: Pod>(r: &mut R, what: &'static str) -> Result<T> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf[..T::SIZE]).map_err(truncated(what))?;
    Ok(T::read_le(&buf))
}

pub fn write_bool<W: Write>(w: &mut W, value: bool) -> Result<()> {
    write_pod(w, value as u8)
}

pub fn read_bool<R: Read>(r: &mut R, what: &'static str) -> Result<bool> {
    Ok(read_pod::<_, u8>(r, what)? != 0)
}

pub fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> Result<()> {
    write_pod(w, bytes.len() as u64)?;
    w.write_all(bytes)?;
    Ok(())
}

pub fn read_bytes<R: Read>(r: &mut R, what: &'static str) -> Result<Vec<u8>> {
    let len: u64 = read_pod(r, what)?;
    let mut buf = Vec::new();
    r.take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(FormatError::Truncated(what).into());
    }
    Ok(buf)
}

pub fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    write_bytes(w, s.as_bytes())
}

pub fn read_string<R: Read>(r: &mut R, what: &'static str) -> Result<String> {
    let bytes = read_bytes(r, what)?;
    Ok(String::from_utf8(bytes).map_err(FormatError::from)?)
}

pub fn write_vec<W: Write, T: Pod>(w: &mut W, values: &[T]) -> Result<()> {
    write_pod(w, values.len() as u64)?;
    let mut buf = Vec::with_capacity(values.len() * T::SIZE);
    for &v in values {
        v.write_le(&mut buf);
    }
    w.write_all(&buf)?;
    Ok(())
}

pub fn read_vec<R: Read, T: Pod>(r: &mut R, what: &'static str) -> Result<Vec<T>> {
    let len: u64 = read_pod(r, what)?;
    let n_bytes = (len as usize)
        .checked_mul(T::SIZE)
        .ok_or(FormatError::Truncated(what))?;
    let mut buf = Vec::new();
    r.take(n_bytes as u64).read_to_end(&mut buf)?;
    if buf.len() != n_bytes {
        return Err(FormatError::Truncated(what).into());
    }
    Ok(buf.chunks_exact(T::SIZE).map(T::read_le).collect())
}

pub fn write_strings<W: Write>(w: &mut W, values: &[String]) -> Result<()> {
    write_pod(w, values.len() as u64)?;
    for s in values {
        write_string(w, s)?;
    }
    Ok(())
}

pub fn read_strings<R: Read>(r: &mut R, what: &'static str) -> Result<Vec<String>> {
    let len: u64 = read_pod(r, what)?;
    (0..len).map(|_| read_string(r, what)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn strings_are_length_prefixed() {
        let mut buf = Vec::new();
        write_string(&mut buf, "abc").unwrap();
        assert_eq!(&buf[..8], &3u64.to_le_bytes());
        assert_eq!(&buf[8..], b"abc");
    }

    #[test]
    fn vec_roundtrip() {
        let mut buf = Vec::new();
        write_vec(&mut buf, &[1.5f32, -2.0, f32::NAN]).unwrap();
        let out: Vec<f32> = read_vec(&mut Cursor::new(buf), "values").unwrap();
        assert_eq!(out[..2], [1.5, -2.0]);
        assert!(out[2].is_nan());
    }

    #[test]
    fn short_vec_is_truncated() {
        let mut buf = Vec::new();
        write_vec(&mut buf, &[1u32, 2, 3]).unwrap();
        buf.truncate(buf.len() - 2);
        let err = read_vec::<_, u32>(&mut Cursor::new(buf), "values").unwrap_err();
        assert!(matches!(err, DataError::Format(FormatError::Truncated("values"))));
    }

    #[test]
    fn short_scalar_is_truncated() {
        let err = read_pod::<_, u64>(&mut Cursor::new(vec![1u8, 2]), "num_row").unwrap_err();
        assert!(matches!(err, DataError::Format(FormatError::Truncated("num_row"))));
    }
}
