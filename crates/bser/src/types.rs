//! Core types for the BSER binary format

/// Magic bytes opening every PDU exchanged with the daemon.
pub const PDU_HEADER: [u8; 2] = [0x00, 0x01];

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Array = 0x00,
    Object = 0x01,
    String = 0x02,
    Int8 = 0x03,
    Int16 = 0x04,
    Int32 = 0x05,
    Int64 = 0x06,
    Real = 0x07,
    True = 0x08,
    False = 0x09,
    Null = 0x0a,
    Template = 0x0b,
    Skip = 0x0c,
}

impl Tag {
    pub const fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Tag::Array),
            0x01 => Some(Tag::Object),
            0x02 => Some(Tag::String),
            0x03 => Some(Tag::Int8),
            0x04 => Some(Tag::Int16),
            0x05 => Some(Tag::Int32),
            0x06 => Some(Tag::Int64),
            0x07 => Some(Tag::Real),
            0x08 => Some(Tag::True),
            0x09 => Some(Tag::False),
            0x0a => Some(Tag::Null),
            0x0b => Some(Tag::Template),
            0x0c => Some(Tag::Skip),
            _ => None,
        }
    }

    /// Payload width in bytes for the integer tags, `None` otherwise.
    pub const fn int_width(self) -> Option<usize> {
        match self {
            Tag::Int8 => Some(1),
            Tag::Int16 => Some(2),
            Tag::Int32 => Some(4),
            Tag::Int64 => Some(8),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The input ended before a complete value was read.
    Truncated,
    /// A byte in tag position is not a known BSER tag.
    InvalidTag(u8),
    /// A string payload is not valid UTF-8.
    InvalidUtf8,
    /// A value in integer position does not carry an integer tag.
    ExpectedInt(u8),
    /// An object key position does not carry a string tag.
    ExpectedString(u8),
    /// A length is negative or does not fit in memory.
    BadLength(i64),
    /// A PDU did not start with the two magic bytes.
    BadPduHeader([u8; 2]),
    /// A template's key list was not an array of strings.
    BadTemplateKeys,
    /// Input continued past the end of the decoded value.
    TrailingBytes(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated => write!(f, "input truncated mid-value"),
            Self::InvalidTag(b) => write!(f, "invalid bser encoding type 0x{:02x}", b),
            Self::InvalidUtf8 => write!(f, "string payload is not valid utf-8"),
            Self::ExpectedInt(b) => write!(f, "expected integer tag, found 0x{:02x}", b),
            Self::ExpectedString(b) => write!(f, "expected string tag, found 0x{:02x}", b),
            Self::BadLength(n) => write!(f, "invalid length {}", n),
            Self::BadPduHeader(h) => {
                write!(f, "bad pdu header 0x{:02x} 0x{:02x}", h[0], h[1])
            }
            Self::BadTemplateKeys => write!(f, "template key list must be an array of strings"),
            Self::TrailingBytes(n) => write!(f, "{} trailing bytes after value", n),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
