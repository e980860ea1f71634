#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod errors;

mod key;
pub use key::{PreimageKey, PreimageKeyType};

mod verify;
pub use verify::{verify_preimage, PreimageVerifier, StandardVerifier};

mod oracle;
pub use oracle::{OracleReader, OracleServer, VerifyingFetcher, VerifyingOracleReader};

mod hint;
pub use hint::{HintReader, HintWriter};

mod types;
pub use types::{FileDescriptor, RequestStatus};

mod traits;
pub use traits::{
    Channel, HintReaderServer, HintRouter, HintWriterClient, PreimageFetcher, PreimageOracleClient,
    PreimageOracleServer, PreimageServerBackend,
};

#[cfg(feature = "std")]
mod file_channel;
#[cfg(feature = "std")]
pub use file_channel::{BidirectionalChannel, FileChannel, FpvmChannels, ReadHandle, WriteHandle};

#[cfg(feature = "std")]
mod polling;
#[cfg(feature = "std")]
pub use polling::{PollingChannel, DEFAULT_POLL_INTERVAL};
