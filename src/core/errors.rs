use crate::rt::hints::DeviceId;
use thiserror::Error;

/// Unified error type for the offload runtime.
///
/// The `category()` of an error is what the submission fallback path keys
/// on: only kernel-classified failures cause a retry on the secondary
/// queue, everything else (allocation failures, invalid objects, ...)
/// propagates as-is.
#[derive(Debug, Error)]
pub enum OffloadError {
    /// A kernel launch or kernel body failed on a device.
    #[error("kernel execution failed: {message}")]
    Kernel {
        message: String,
        device: Option<DeviceId>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A non-kernel runtime operation (custom/interop work) failed.
    #[error("runtime operation failed: {message}")]
    Runtime {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Memory allocation failures.
    #[error("memory allocation failed: {message}")]
    MemoryAllocation { message: String },

    /// An object was used in a state or pairing that is not valid,
    /// e.g. constructing a queue for a device outside its context.
    #[error("invalid object: {message}")]
    InvalidObject { message: String },

    /// A caller-supplied parameter was rejected.
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// The submission callback itself failed before any operation was
    /// handed to the runtime.
    #[error("submission failed: {message}")]
    Submission {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Asynchronous errors drained from the runtime error registry with
    /// no async handler installed to consume them.
    #[error("{} asynchronous errors pending", .errors.len())]
    AsyncErrors { errors: Vec<OffloadError> },

    /// Generic internal errors.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl OffloadError {
    /// Create a kernel-classified error.
    pub fn kernel<S: Into<String>>(message: S, device: Option<DeviceId>) -> Self {
        Self::Kernel {
            message: message.into(),
            device,
            source: None,
        }
    }

    /// Create a kernel-classified error carrying the failure reported by
    /// the kernel body.
    pub fn kernel_with_source<S: Into<String>>(
        message: S,
        device: Option<DeviceId>,
        source: anyhow::Error,
    ) -> Self {
        Self::Kernel {
            message: message.into(),
            device,
            source: Some(source.into()),
        }
    }

    /// Create a non-kernel runtime error.
    pub fn runtime_op<S: Into<String>>(message: S) -> Self {
        Self::Runtime {
            message: message.into(),
            source: None,
        }
    }

    /// Create a non-kernel runtime error with the underlying failure.
    pub fn runtime_op_with_source<S: Into<String>>(message: S, source: anyhow::Error) -> Self {
        Self::Runtime {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a memory allocation error.
    pub fn memory_allocation<S: Into<String>>(message: S) -> Self {
        Self::MemoryAllocation {
            message: message.into(),
        }
    }

    /// Create an invalid object error.
    pub fn invalid_object<S: Into<String>>(message: S) -> Self {
        Self::InvalidObject {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Wrap a failed submission callback.
    pub fn submission(source: anyhow::Error) -> Self {
        Self::Submission {
            message: source.to_string(),
            source: Some(source.into()),
        }
    }

    /// Aggregate drained asynchronous errors.
    pub fn async_errors(errors: Vec<OffloadError>) -> Self {
        Self::AsyncErrors { errors }
    }

    /// Create an internal error.
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Error category for classification and logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Kernel { .. } => "kernel",
            Self::Runtime { .. } => "runtime",
            Self::MemoryAllocation { .. } => "memory",
            Self::InvalidObject { .. } => "invalid-object",
            Self::InvalidParameter { .. } => "invalid-parameter",
            Self::Submission { .. } => "submission",
            Self::AsyncErrors { .. } => "async",
            Self::Internal { .. } => "internal",
        }
    }

    /// Whether this error is kernel-classified. The fallback submission
    /// path retries on the secondary queue only for these.
    pub fn is_kernel_error(&self) -> bool {
        matches!(self, Self::Kernel { .. })
    }
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, OffloadError>;
