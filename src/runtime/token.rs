//! Metadata tokens as reported by class and function queries.

use std::fmt;

use strum::{Display, FromRepr};

/// Metadata tables a token handed out by the runtime can point into.
///
/// Only the tables the tracer actually receives tokens for are listed. Type definition
/// tokens come from class queries, method definition tokens from function queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum TokenKind {
    /// `mdTypeRef`
    TypeRef = 0x01,
    /// `mdTypeDef`
    TypeDef = 0x02,
    /// `mdMethodDef`
    MethodDef = 0x06,
    /// `mdMemberRef`
    MemberRef = 0x0A,
    /// `mdTypeSpec`
    TypeSpec = 0x1B,
    /// `mdMethodSpec`
    MethodSpec = 0x2B,
}

/// A metadata token representing a reference to a metadata table entry.
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the row index within that table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns the table kind, if it is one the tracer knows about
    #[must_use]
    pub fn kind(&self) -> Option<TokenKind> {
        TokenKind::from_repr(self.table())
    }

    /// Returns true if this is a null token (value 0) or a nil row
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.row() == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
