use {
    crate::MotorError,
    base::log,
    std::{
        fs::{File, OpenOptions},
        io::{Read, Write},
        os::fd::AsRawFd,
        path::PathBuf,
    },
};

// ioctl request that binds an i2c-dev file descriptor to a slave address
const I2C_SLAVE: u64 = 0x0703;

/// Byte-level access to one device on an I2C bus.
pub trait I2cBus: Send {
    /// Write `bytes` to the device in a single transfer.
    fn write(&mut self, bytes: &[u8]) -> Result<(), MotorError>;

    /// Write `bytes`, then read `buffer.len()` bytes back.
    fn write_read(&mut self, bytes: &[u8], buffer: &mut [u8]) -> Result<(), MotorError>;
}

/// Linux i2c-dev bus (`/dev/i2c-<bus>`) bound to a single slave address.
pub struct LinuxI2c {
    path: PathBuf,
    address: u16,
    file: File,
}

impl std::fmt::Debug for LinuxI2c {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinuxI2c")
            .field("path", &self.path)
            .field("address", &format_args!("{:#04x}", self.address))
            .finish()
    }
}

impl LinuxI2c {
    pub fn open(bus: u8, address: u16) -> Result<Self, MotorError> {
        let path = PathBuf::from(format!("/dev/i2c-{}", bus));
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // SAFETY: the descriptor is owned by `file` and stays open for the call;
        // I2C_SLAVE takes the address by value.
        let result = unsafe {
            libc::ioctl(file.as_raw_fd(), I2C_SLAVE as _, address as libc::c_ulong)
        };
        if result < 0 {
            return Err(MotorError::I2c(std::io::Error::last_os_error()));
        }

        log::debug!("opened {} at address {:#04x}", path.display(), address);
        Ok(Self {
            path,
            address,
            file,
        })
    }
}

impl I2cBus for LinuxI2c {
    fn write(&mut self, bytes: &[u8]) -> Result<(), MotorError> {
        self.file.write_all(bytes)?;
        Ok(())
    }

    fn write_read(&mut self, bytes: &[u8], buffer: &mut [u8]) -> Result<(), MotorError> {
        self.file.write_all(bytes)?;
        self.file.read_exact(buffer)?;
        Ok(())
    }
}
