use std::io::{self, ErrorKind};

/// Scalars are little-endian; lengths and counts are LEB128 varints.
pub trait Serializable {
    fn serialize<S: Serializer>(&self, serializer: &mut S) -> io::Result<()>;
}

pub trait Deserializable {
    fn deserialize<D: Deserializer>(deserializer: &mut D) -> io::Result<Self>
    where
        Self: Sized;
}

pub trait Serializer {
    fn write_data(&mut self, buffer: &[u8]) -> io::Result<()>;

    fn write_u8(&mut self, val: u8) -> io::Result<()> {
        self.write_data(&[val])
    }

    fn write_bool(&mut self, val: bool) -> io::Result<()> {
        self.write_u8(val as u8)
    }

    fn write_u32(&mut self, val: u32) -> io::Result<()> {
        self.write_data(&val.to_le_bytes())
    }

    fn write_f64(&mut self, val: f64) -> io::Result<()> {
        self.write_data(&val.to_le_bytes())
    }

    fn write_varint(&mut self, mut val: u64) -> io::Result<()> {
        loop {
            let mut byte = (val & 0x7F) as u8;
            val >>= 7;
            if val != 0 {
                byte |= 0x80;
            }
            self.write_u8(byte)?;
            if val == 0 {
                return Ok(());
            }
        }
    }

    fn write_string(&mut self, val: &str) -> io::Result<()> {
        self.write_varint(val.len() as u64)?;
        if !val.is_empty() {
            self.write_data(val.as_bytes())?;
        }
        Ok(())
    }

    fn write_list<T: Serializable>(&mut self, list: &[T]) -> io::Result<()>
    where
        Self: Sized,
    {
        self.write_varint(list.len() as u64)?;
        for item in list {
            item.serialize(self)?;
        }
        Ok(())
    }
}

pub trait Deserializer {
    fn read_data(&mut self, buffer: &mut [u8]) -> io::Result<()>;

    fn read_u8(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.read_data(&mut byte)?;
        Ok(byte[0])
    }

    fn read_bool(&mut self) -> io::Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(io::Error::new(ErrorKind::InvalidData, format!("invalid bool byte {other}"))),
        }
    }

    fn read_u32(&mut self) -> io::Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_data(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_f64(&mut self) -> io::Result<f64> {
        let mut bytes = [0u8; 8];
        self.read_data(&mut bytes)?;
        Ok(f64::from_le_bytes(bytes))
    }

    fn read_varint(&mut self) -> io::Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(io::Error::new(ErrorKind::InvalidData, "varint longer than 10 bytes"))
    }

    fn read_string(&mut self) -> io::Result<String> {
        let len = self.read_varint()? as usize;
        let mut bytes = vec![0u8; len];
        if len > 0 {
            self.read_data(&mut bytes)?;
        }
        String::from_utf8(bytes).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
    }

    fn read_list<T: Deserializable>(&mut self) -> io::Result<Vec<T>>
    where
        Self: Sized,
    {
        let count = self.read_varint()? as usize;
        let mut list = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            list.push(T::deserialize(self)?);
        }
        Ok(list)
    }
}

/// Serializer into a growable in-memory buffer.
#[derive(Debug, Default)]
pub struct MemorySerializer {
    data: Vec<u8>,
}

impl MemorySerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drops the contents but keeps the allocation for reuse.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl Serializer for MemorySerializer {
    fn write_data(&mut self, buffer: &[u8]) -> io::Result<()> {
        self.data.extend_from_slice(buffer);
        Ok(())
    }
}

/// Deserializer over a borrowed byte slice.
#[derive(Debug)]
pub struct SliceDeserializer<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> SliceDeserializer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}

impl Deserializer for SliceDeserializer<'_> {
    fn read_data(&mut self, buffer: &mut [u8]) -> io::Result<()> {
        if buffer.len() > self.remaining() {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("need {} bytes, {} left", buffer.len(), self.remaining()),
            ));
        }
        let end = self.position + buffer.len();
        buffer.copy_from_slice(&self.data[self.position..end]);
        self.position = end;
        Ok(())
    }
}
