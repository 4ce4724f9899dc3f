/// Fixed-capacity byte buffer with an explicit fill cursor.
///
/// The buffer never grows: `push` refuses data that does not fit and leaves
/// it to the owner to drain first.
pub struct FileBuffer {
    data: Box<[u8]>,
    /// Number of bytes currently held, always <= capacity
    len: usize,
}

impl FileBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.len
    }

    pub fn fits(&self, nr_bytes: usize) -> bool {
        nr_bytes <= self.remaining()
    }

    /// Copies `bytes` in at the cursor. Returns false, leaving the buffer
    /// untouched, when they do not fit.
    pub fn push(&mut self, bytes: &[u8]) -> bool {
        if !self.fits(bytes.len()) {
            return false;
        }
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        true
    }

    /// The held bytes, in append order.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut buf = FileBuffer::new(8);
        assert!(buf.push(b"abc"));
        assert!(buf.push(b"defgh"));
        assert_eq!(buf.remaining(), 0);
        assert!(!buf.push(b"i"));
        assert_eq!(buf.as_slice(), b"abcdefgh");
    }

    #[test]
    fn test_rejected_push_leaves_contents() {
        let mut buf = FileBuffer::new(4);
        assert!(buf.push(b"ab"));
        assert!(!buf.push(b"cde"));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.as_slice(), b"ab");

        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.push(b"cde"));
        assert_eq!(buf.as_slice(), b"cde");
    }

    #[test]
    fn test_empty_push_always_fits() {
        let mut buf = FileBuffer::new(0);
        assert!(buf.push(&[]));
        assert!(!buf.push(b"x"));
    }
}
