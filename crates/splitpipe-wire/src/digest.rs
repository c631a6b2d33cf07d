use md5::{Digest, Md5};

/// Length of an MD5 digest on the wire.
pub const MD5_LEN: usize = 16;

/// Incremental MD5 over the reconstructed payload stream.
///
/// Both sides feed exactly the payload bytes, in emission order: the producer
/// as it writes a `Data` stretch to the writer command, the consumer as it
/// writes reconstructed bytes to stdout. [`snapshot`](Self::snapshot) yields
/// the digest of everything fed so far without disturbing the running state,
/// which is what lands in (and is compared against) each checksum stretch.
///
/// MD5 is kept as the on-wire algorithm for compatibility with existing
/// archives; it guards against media corruption, not adversaries.
#[derive(Clone, Default, Debug)]
pub struct RunningDigest {
    inner: Md5,
    fed: u64,
}

impl RunningDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds payload bytes in stream order.
    #[inline]
    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
        self.fed += bytes.len() as u64;
    }

    /// Total payload bytes fed so far.
    #[inline]
    pub fn bytes_fed(&self) -> u64 {
        self.fed
    }

    /// Digest of everything fed so far; the running state is untouched.
    pub fn snapshot(&self) -> [u8; MD5_LEN] {
        self.inner.clone().finalize().into()
    }
}
