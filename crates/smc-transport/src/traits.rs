use crate::{KeyType, Result, SmcKey};

/// Blocking key/value access to the system-management controller.
///
/// Implementations serialize concurrent calls themselves; callers share a bus by reference.
pub trait SmcBus {
    /// Query the wire type tag of `key`.
    fn key_type(&self, key: SmcKey) -> Result<KeyType>;

    /// Read `len` payload bytes of `key`, in the controller's native byte order.
    fn read_key(&self, key: SmcKey, len: usize) -> Result<Vec<u8>>;
}

/// Blocking byte-addressed register access (regmap style).
pub trait RegisterBus {
    /// Read `len` consecutive registers starting at `addr`.
    fn read(&self, addr: u16, len: usize) -> Result<Vec<u8>>;

    /// Write `data` to consecutive registers starting at `addr` as one bulk operation.
    fn write(&self, addr: u16, data: &[u8]) -> Result<()>;
}

impl<T: SmcBus + ?Sized> SmcBus for &T {
    fn key_type(&self, key: SmcKey) -> Result<KeyType> {
        (**self).key_type(key)
    }

    fn read_key(&self, key: SmcKey, len: usize) -> Result<Vec<u8>> {
        (**self).read_key(key, len)
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for &T {
    fn read(&self, addr: u16, len: usize) -> Result<Vec<u8>> {
        (**self).read(addr, len)
    }

    fn write(&self, addr: u16, data: &[u8]) -> Result<()> {
        (**self).write(addr, data)
    }
}

impl<T: SmcBus + ?Sized> SmcBus for std::sync::Arc<T> {
    fn key_type(&self, key: SmcKey) -> Result<KeyType> {
        (**self).key_type(key)
    }

    fn read_key(&self, key: SmcKey, len: usize) -> Result<Vec<u8>> {
        (**self).read_key(key, len)
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for std::sync::Arc<T> {
    fn read(&self, addr: u16, len: usize) -> Result<Vec<u8>> {
        (**self).read(addr, len)
    }

    fn write(&self, addr: u16, data: &[u8]) -> Result<()> {
        (**self).write(addr, data)
    }
}
