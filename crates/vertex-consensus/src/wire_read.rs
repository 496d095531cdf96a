use crate::error::MalformedVertex;

pub struct Reader<'a> {
    b: &'a [u8],
    off: usize,
}

impl<'a> Reader<'a> {
    pub fn new(b: &'a [u8]) -> Self {
        Self { b, off: 0 }
    }

    pub fn offset(&self) -> usize {
        self.off
    }

    pub fn remaining(&self) -> usize {
        self.b.len() - self.off
    }

    fn take<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], MalformedVertex> {
        if self.off + N > self.b.len() {
            return Err(MalformedVertex::UnexpectedEof(what));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.b[self.off..self.off + N]);
        self.off += N;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, MalformedVertex> {
        Ok(self.take::<1>("u8")?[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16, MalformedVertex> {
        Ok(u16::from_be_bytes(self.take("u16be")?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, MalformedVertex> {
        Ok(u32::from_be_bytes(self.take("u32be")?))
    }

    pub fn read_u64_be(&mut self) -> Result<u64, MalformedVertex> {
        Ok(u64::from_be_bytes(self.take("u64be")?))
    }

    pub fn read_u128_be(&mut self) -> Result<u128, MalformedVertex> {
        Ok(u128::from_be_bytes(self.take("u128be")?))
    }

    pub fn read_f64_be(&mut self) -> Result<f64, MalformedVertex> {
        Ok(f64::from_be_bytes(self.take("f64be")?))
    }

    pub fn read_u16_le(&mut self) -> Result<u16, MalformedVertex> {
        Ok(u16::from_le_bytes(self.take("u16le")?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, MalformedVertex> {
        Ok(u32::from_le_bytes(self.take("u32le")?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, MalformedVertex> {
        Ok(u64::from_le_bytes(self.take("u64le")?))
    }

    pub fn read_hash(&mut self) -> Result<[u8; 32], MalformedVertex> {
        self.take("hash")
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], MalformedVertex> {
        if self.off + n > self.b.len() {
            return Err(MalformedVertex::UnexpectedEof("bytes"));
        }
        let v = &self.b[self.off..self.off + n];
        self.off += n;
        Ok(v)
    }

    pub fn finish(&self, what: &'static str) -> Result<(), MalformedVertex> {
        if self.off != self.b.len() {
            return Err(MalformedVertex::TrailingBytes(what));
        }
        Ok(())
    }
}
