//! Shared behaviour required between decoder crates.

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Error {
    /// What kind of error happened in decoding an instruction.
    pub kind: ErrorKind,

    /// How many bytes in the stream did the invalid instruction consume.
    size: u8,
}

impl Error {
    pub fn new(kind: ErrorKind, size: usize) -> Self {
        Self {
            kind,
            size: size as u8,
        }
    }

    pub fn size(&self) -> usize {
        self.size as usize
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ErrorKind {
    /// Opcode in instruction is impossible/unknown.
    InvalidOpcode,

    /// Operand in instruction is impossible/unknown.
    InvalidOperand,

    /// Prefix in instruction is impossible/unknown.
    InvalidPrefixes,

    /// Register in instruction is impossible/unknown.
    InvalidRegister,

    /// There weren't any bytes left in the stream to decode.
    ExhaustedInput,

    /// Impossibly long instruction (x86/64 specific).
    TooLong,
}

/// A decoded instruction, reporting at minimum how many bytes it spans.
pub trait Decoded {
    fn width(&self) -> usize;
}

pub trait Decodable {
    type Instruction: Decoded;

    fn decode(&self, reader: &mut Reader) -> Result<Self::Instruction, Error>;
    fn max_width(&self) -> usize;
}

pub struct Reader<'data> {
    start: *const u8,
    position: *const u8,
    end: *const u8,
    mark: *const u8,
    _marker: core::marker::PhantomData<&'data [u8]>,
}

impl<'data> Reader<'data> {
    pub fn new(data: &'data [u8]) -> Self {
        Self {
            start: data.as_ptr(),
            position: data.as_ptr(),
            end: unsafe { data.as_ptr().add(data.len()) },
            mark: data.as_ptr(),
            _marker: core::marker::PhantomData,
        }
    }

    #[inline]
    pub fn next(&mut self) -> Option<u8> {
        let width = self.end as usize - self.position as usize;

        if width == 0 {
            return None;
        }

        unsafe {
            let byte = self.position.read();
            self.position = self.position.add(1);
            Some(byte)
        }
    }

    /// read `buf`-many items from this reader in bulk. if `Reader` cannot read `buf`-many items,
    /// return `None`.
    #[inline]
    pub fn next_n(&mut self, buf: &mut [u8]) -> Option<()> {
        let width = self.end as usize - self.position as usize;

        if buf.len() > width {
            return None;
        }

        unsafe {
            core::ptr::copy_nonoverlapping(self.position, buf.as_mut_ptr(), buf.len());

            self.position = self.position.add(buf.len());
            Some(())
        }
    }

    /// mark the current position as where to measure `offset` against.
    #[inline]
    pub fn mark(&mut self) {
        self.mark = self.position;
    }

    /// the difference, between the current `Reader` position and its last `mark`.
    /// when created, a `Reader`'s initial position is `mark`ed, so creating a `Reader` and
    /// immediately calling `offset()` must return 0.
    #[inline]
    pub fn offset(&self) -> usize {
        self.position as usize - self.mark as usize
    }

    /// the difference, between the current `Reader` position and the initial offset
    /// when constructed.
    #[inline]
    pub fn total_offset(&self) -> usize {
        self.position as usize - self.start as usize
    }
}
