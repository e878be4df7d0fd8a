//! Little endian primitives for the binary entity wire format.
//!
//! Sizes are `u64`, strings are NUL terminated and 3 component vectors are padded to
//! 16 bytes, which is how the native renderer lays out its vector type in memory.

use std::io::{self, Read, Write};

/// Upper bound for speculative allocations driven by counts read from a stream.
const MAX_PREALLOCATION: usize = 4096;

pub trait WireWrite: Write {
    fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.write_all(&[value])
    }

    fn write_bool(&mut self, value: bool) -> io::Result<()> {
        self.write_u8(value as u8)
    }

    fn write_u32(&mut self, value: u32) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_i32(&mut self, value: i32) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_u64(&mut self, value: u64) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_f32(&mut self, value: f32) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_f32s(&mut self, values: &[f32]) -> io::Result<()> {
        values.iter().try_for_each(|v| self.write_f32(*v))
    }

    fn write_cstring(&mut self, value: &str) -> io::Result<()> {
        if value.as_bytes().contains(&0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "string contains an interior NUL byte",
            ));
        }
        self.write_all(value.as_bytes())?;
        self.write_u8(0)
    }

    /// A 3 component vector followed by one float of padding.
    fn write_padded_vec3(&mut self, value: [f32; 3]) -> io::Result<()> {
        self.write_f32s(&value)?;
        self.write_f32(0.0)
    }
}

impl<W: Write + ?Sized> WireWrite for W {}

pub trait WireRead: Read {
    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_bool(&mut self) -> io::Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(invalid_data(format!("invalid bool byte {other}"))),
        }
    }

    fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_i32(&mut self) -> io::Result<i32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> io::Result<u64> {
        let mut buf = [0; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_f32(&mut self) -> io::Result<f32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    fn read_f32_array<const N: usize>(&mut self) -> io::Result<[f32; N]> {
        let mut out = [0.0; N];
        for v in out.iter_mut() {
            *v = self.read_f32()?;
        }
        Ok(out)
    }

    fn read_padded_vec3(&mut self) -> io::Result<[f32; 3]> {
        let [x, y, z, _] = self.read_f32_array::<4>()?;
        Ok([x, y, z])
    }

    fn read_cstring(&mut self) -> io::Result<String> {
        let mut bytes = Vec::new();
        loop {
            match self.read_u8()? {
                0 => break,
                byte => bytes.push(byte),
            }
        }
        String::from_utf8(bytes).map_err(|err| invalid_data(err.to_string()))
    }

    /// Reads `count` items with `read_item`.
    fn read_items<T>(
        &mut self,
        count: u64,
        mut read_item: impl FnMut(&mut Self) -> io::Result<T>,
    ) -> io::Result<Vec<T>>
    where
        Self: Sized,
    {
        let count = usize::try_from(count).map_err(|_| invalid_data("item count overflows"))?;
        let mut items = Vec::with_capacity(count.min(MAX_PREALLOCATION));
        for _ in 0..count {
            items.push(read_item(self)?);
        }
        Ok(items)
    }
}

impl<R: Read + ?Sized> WireRead for R {}

pub fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn primitives_round_trip() {
        let mut buf = Vec::new();
        buf.write_u8(7).unwrap();
        buf.write_u64(1 << 40).unwrap();
        buf.write_cstring("mesh").unwrap();
        buf.write_padded_vec3([1.0, 2.0, 3.0]).unwrap();
        buf.write_bool(true).unwrap();
        assert_eq!(buf.len(), 1 + 8 + 5 + 16 + 1);

        let mut cursor = Cursor::new(buf);
        assert_eq!(cursor.read_u8().unwrap(), 7);
        assert_eq!(cursor.read_u64().unwrap(), 1 << 40);
        assert_eq!(cursor.read_cstring().unwrap(), "mesh");
        assert_eq!(cursor.read_padded_vec3().unwrap(), [1.0, 2.0, 3.0]);
        assert!(cursor.read_bool().unwrap());
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Cursor::new(b"short".to_vec()).read_cstring().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn huge_counts_do_not_preallocate() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        let err = cursor.read_items(u64::MAX >> 8, |r| r.read_u8()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
