use std::fmt;

/// Errors that can be thrown by the library
#[derive(Debug)]
pub enum Error {
    /// The stream does not begin with the PSBT magic bytes
    InvalidMagic,
    /// The stream ended in the middle of a record payload
    Truncated,
    /// A compact-size prefix was truncated or not minimally encoded
    MalformedPrefix,
    /// A decoded length exceeds the maximum the codec accepts
    Overflow(u64),
    /// A field would be assigned twice during a decode; carries the raw key
    DuplicateKey(Vec<u8>),
    /// The key material of a record is not a structurally valid public key
    InvalidPubkey,
    /// A BIP32 derivation value is not a whole number of 32-bit indices
    MalformedKeypath,
    /// The length of a key or value does not match the payload it encloses
    SizeMismatch,
    /// The global section ended without an unsigned transaction
    MissingUnsignedTx,
    /// An input of the unsigned transaction carries a script-sig or witness
    UnsignedTxNotEmpty,
    /// The number of input or output sections differs from the transaction
    InputOutputCountMismatch,
    /// A non-witness UTXO does not hash to the txid of its outpoint
    UtxoMismatch,

    /// Error while decoding an embedded transaction or output
    Encode(bitcoin::consensus::encode::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidMagic => write!(f, "invalid PSBT magic bytes"),
            Error::Truncated => write!(f, "stream ended in the middle of a record"),
            Error::MalformedPrefix => write!(f, "malformed compact-size prefix"),
            Error::Overflow(len) => write!(f, "length `{}` exceeds the maximum", len),
            Error::DuplicateKey(key) => write!(f, "duplicate key {:02x?}", key),
            Error::InvalidPubkey => write!(f, "invalid public key in record key"),
            Error::MalformedKeypath => {
                write!(f, "derivation path length is not a multiple of four")
            }
            Error::SizeMismatch => write!(f, "size of a key or value was not the stated size"),
            Error::MissingUnsignedTx => write!(f, "no unsigned transaction was provided"),
            Error::UnsignedTxNotEmpty => {
                write!(f, "unsigned transaction has a non-empty script-sig or witness")
            }
            Error::InputOutputCountMismatch => {
                write!(f, "input or output count does not match the unsigned transaction")
            }
            Error::UtxoMismatch => write!(f, "non-witness UTXO does not match the outpoint"),
            Error::Encode(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<bitcoin::consensus::encode::Error> for Error {
    fn from(err: bitcoin::consensus::encode::Error) -> Self {
        Error::Encode(err)
    }
}
