//! Zero-Copy Byte Blobs
//!
//! A [`Blob`] wraps a [`Bytes`] handle. Building one from a `Vec<u8>`,
//! `Bytes`, or `&'static [u8]` takes over the allocation without copying;
//! the only copying constructors are the explicitly named ones
//! ([`Blob::copy_from_slice`], [`Blob::from_pod`], [`Blob::from_pod_slice`]).
//!
//! Typed access comes in two flavours:
//! - [`Blob::view`] reinterprets the whole blob as `&[T]` in place, which
//!   requires the bytes to be aligned for `T`
//! - [`Blob::read`] copies out a single element and works at any alignment

use crate::{ProtocolError, Result};
use bytes::Bytes;
use std::fmt;
use zerocopy::{AsBytes, FromBytes};

/// Immutable, cheaply cloneable view over a byte range
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Blob {
    bytes: Bytes,
}

impl Blob {
    /// Take ownership of an allocation without copying
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Alias static memory
    pub const fn from_static(bytes: &'static [u8]) -> Self {
        Self {
            bytes: Bytes::from_static(bytes),
        }
    }

    /// Copy borrowed bytes into a new allocation
    pub fn copy_from_slice(bytes: &[u8]) -> Self {
        Self {
            bytes: Bytes::copy_from_slice(bytes),
        }
    }

    /// Serialize one plain-old-data value
    pub fn from_pod<T: AsBytes>(value: &T) -> Self {
        Self::copy_from_slice(value.as_bytes())
    }

    /// Serialize a slice of plain-old-data values
    pub fn from_pod_slice<T: AsBytes>(values: &[T]) -> Self {
        Self::copy_from_slice(values.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Number of whole `T` elements the blob holds
    pub fn count<T>(&self) -> usize {
        match std::mem::size_of::<T>() {
            0 => 0,
            size => self.bytes.len() / size,
        }
    }

    /// Reinterpret the blob as `&[T]` without copying
    pub fn view<T: FromBytes>(&self) -> Result<&[T]> {
        T::slice_from(&self.bytes).ok_or(ProtocolError::BlobView {
            type_name: std::any::type_name::<T>(),
            len: self.bytes.len(),
        })
    }

    /// Copy out element `index` of the blob viewed as `[T]`
    pub fn read<T: FromBytes>(&self, index: usize) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let out_of_bounds = || ProtocolError::BlobIndex {
            type_name: std::any::type_name::<T>(),
            index,
            len: self.bytes.len(),
        };

        let start = index.checked_mul(size).ok_or_else(out_of_bounds)?;
        let end = start.checked_add(size).ok_or_else(out_of_bounds)?;
        let chunk = self.bytes.get(start..end).ok_or_else(out_of_bounds)?;
        T::read_from(chunk).ok_or_else(out_of_bounds)
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob").field("len", &self.bytes.len()).finish()
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<Bytes> for Blob {
    fn from(bytes: Bytes) -> Self {
        Self::new(bytes)
    }
}
