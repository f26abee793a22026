//! Upstream decoded-data source

/// Byte stream feeding the sample store (file reader or decoder output).
///
/// `read` returning `Ok(0)` means "no data now": end of stream and a
/// transient hiccup look the same to the caller, which disambiguates by
/// retrying.
pub trait StreamSource {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read from the current position into `buf`, returning the byte count.
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>>;

    /// Seek to an absolute byte position.
    fn seek(&mut self, pos: u64) -> impl core::future::Future<Output = Result<u64, Self::Error>>;
}

impl<T: StreamSource + ?Sized> StreamSource for &mut T {
    type Error = T::Error;

    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>> {
        T::read(self, buf)
    }

    fn seek(&mut self, pos: u64) -> impl core::future::Future<Output = Result<u64, Self::Error>> {
        T::seek(self, pos)
    }
}
