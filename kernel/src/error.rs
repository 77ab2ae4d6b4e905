//! Kernel error types

use core::fmt;

/// Errors produced by process management, file operations and devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// No free pid, descriptor slot or terminal capacity
    ResourceExhausted,
    /// Command line has no isolatable program name
    MalformedCommand,
    /// Name does not resolve in the file system
    FileNotFound,
    /// File is not a loadable executable image
    NotExecutable,
    /// Descriptor out of range, not open, or reserved
    InvalidDescriptor,
    /// Released a pid that was already free
    DoubleFree,
    /// Bad user pointer, buffer size or device parameter
    InvalidArgument,
    /// Operation must be retried once the device signals readiness
    WouldBlock,
    /// Operation not supported by this file type
    Unsupported,
    /// No process is scheduled
    NoCurrentProcess,
    /// Boot file-system image is malformed
    CorruptImage,
}

impl KernelError {
    /// Short, stable name used in log lines.
    pub const fn as_str(&self) -> &'static str {
        match self {
            KernelError::ResourceExhausted => "resource exhausted",
            KernelError::MalformedCommand => "malformed command",
            KernelError::FileNotFound => "file not found",
            KernelError::NotExecutable => "not executable",
            KernelError::InvalidDescriptor => "invalid descriptor",
            KernelError::DoubleFree => "double free",
            KernelError::InvalidArgument => "invalid argument",
            KernelError::WouldBlock => "would block",
            KernelError::Unsupported => "unsupported",
            KernelError::NoCurrentProcess => "no current process",
            KernelError::CorruptImage => "corrupt file-system image",
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result alias used throughout the kernel.
pub type KResult<T> = Result<T, KernelError>;
