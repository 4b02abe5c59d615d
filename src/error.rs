use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant is fatal for the patch session that produced it. Nothing in this crate
/// retries an operation or swallows an error; the caller is expected to abandon the
/// session and report the error.
///
/// # Error Categories
///
/// ## Allocation Errors
/// - [`Error::InsufficientSpace`] - No free range can hold the requested number of bytes
/// - [`Error::AllocationConflict`] - A range that is not entirely free was marked used
/// - [`Error::InvalidRange`] - A byte range with `start >= end` was constructed
///
/// ## Assembly and Patching Errors
/// - [`Error::Assembly`] - An instruction list could not be assembled
/// - [`Error::InvalidInstruction`] - An instruction was built with an unsupported mode or operand
/// - [`Error::PatchSiteTooSmall`] - The redirect does not fit between hook and return address
/// - [`Error::SessionCorrupted`] - A write failed after space had already been committed
///
/// ## Addressing Errors
/// - [`Error::OutOfRange`] - Address translation outside of the mapped banks
/// - [`Error::OutOfBounds`] - Access beyond the end of the image
///
/// ## Image and I/O Errors
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::HashMismatch`] - The loaded image is not the expected dump
/// - [`Error::Malformed`] - Corrupted or inconsistent image structure
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::WriteMmapFailed`] / [`Error::WriteFinalizationFailed`] - Output file errors
///
/// # Examples
///
/// ```rust
/// use snespatch::{Error, FreeSpaceManager};
///
/// let mut space = FreeSpaceManager::new();
/// space.mark_free(snespatch::ByteRange::new(0x1000, 0x1100)?);
///
/// match space.get_free_addr(0x200, None) {
///     Ok(addr) => println!("allocated at {addr:#X}"),
///     Err(Error::InsufficientSpace { requested, free_bytes, largest_block }) => {
///         eprintln!("need {requested:#X} bytes, {free_bytes:#X} free, largest {largest_block:#X}");
///     }
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # Ok::<(), snespatch::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Allocation errors
    /// No free range is large enough to satisfy an allocation.
    ///
    /// The error carries enough information to report how close the session came:
    /// the number of bytes requested, the total number of free bytes left in the
    /// image and the size of the largest block one allocation could have received.
    #[error("Insufficient free space - requested {requested:#X} bytes, {free_bytes:#X} free, largest block {largest_block:#X}")]
    InsufficientSpace {
        /// Number of contiguous bytes that were requested
        requested: u32,
        /// Total number of free bytes remaining
        free_bytes: u32,
        /// Size of the largest placeable block, honoring any bank boundary
        largest_block: u32,
    },

    /// A range disagrees with the free set.
    ///
    /// Raised when a range is marked used although it is not fully free, or when a patch
    /// site that should hold existing code still lies partly in free space. Either way it
    /// would let a byte be handed out twice, and it is always a bug in the caller.
    #[error("Allocation conflict - range [{start:#X}, {end:#X}) conflicts with the free set")]
    AllocationConflict {
        /// First byte of the conflicting range
        start: u32,
        /// One past the last byte of the conflicting range
        end: u32,
    },

    /// A byte range was constructed with `start >= end`.
    #[error("Invalid byte range [{start:#X}, {end:#X})")]
    InvalidRange {
        /// The requested start offset
        start: u32,
        /// The requested end offset
        end: u32,
    },

    // Assembly and patching errors
    /// An instruction list could not be assembled.
    ///
    /// Raised for invalid mnemonic/addressing mode combinations, operands that do not
    /// fit the addressing mode, undefined or duplicate labels and branch targets that
    /// are out of reach. Assembly never truncates silently.
    ///
    /// # Fields
    ///
    /// * `index` - Position of the offending item in the instruction list
    /// * `instruction` - Textual form of the offending instruction
    /// * `message` - What was wrong with it
    #[error("Assembly failed at item {index} ({instruction}): {message}")]
    Assembly {
        /// Position of the offending item in the instruction list
        index: usize,
        /// Textual form of the offending instruction
        instruction: String,
        /// Description of the failure
        message: String,
    },

    /// An instruction was built from an invalid mnemonic/mode/operand combination.
    ///
    /// Raised by [`crate::asm::Instruction::new`] and its helpers, so malformed
    /// instructions are rejected before they are ever put into an instruction list.
    #[error("Invalid instruction {mnemonic} ({mode}): {message}")]
    InvalidInstruction {
        /// The mnemonic that was requested
        mnemonic: String,
        /// The addressing mode that was requested
        mode: String,
        /// Description of the failure
        message: String,
    },

    /// The redirect written at a hook does not fit before the return address.
    #[error("Patch site too small - hook {hook_addr:#X} needs {required} bytes but return address is {return_addr:#X}")]
    PatchSiteTooSmall {
        /// The file offset of the hook
        hook_addr: u32,
        /// The requested return address
        return_addr: u32,
        /// Number of bytes the redirect instruction occupies
        required: u32,
    },

    /// A write failed after free space had already been committed.
    ///
    /// The image can no longer be trusted; the session must be aborted.
    #[error("Patch session corrupted: {0}")]
    SessionCorrupted(String),

    // Addressing errors
    /// An address could not be translated between file offset and banked form.
    #[error("Address {0:#08X} is outside the mapped banks")]
    OutOfRange(u32),

    /// An out of bound access was attempted on the image.
    #[error("Out of Bound access would have occurred!")]
    OutOfBounds,

    // Image and I/O errors
    /// Provided input was empty.
    ///
    /// Raised for empty images, empty routines and zero-length allocations.
    #[error("Provided input was empty")]
    Empty,

    /// The image digest does not match the configured one.
    #[error("Image hash mismatch - expected {expected}, found {actual}")]
    HashMismatch {
        /// The configured MD5 digest (lowercase hex)
        expected: String,
        /// The MD5 digest of the loaded image (lowercase hex)
        actual: String,
    },

    /// The image is damaged or inconsistent.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Failed to create or access the memory-mapped output file.
    #[error("Memory mapping failed: {message}")]
    WriteMmapFailed {
        /// Description of the failure
        message: String,
    },

    /// Failed to finalize the output file.
    #[error("Finalization failed: {message}")]
    WriteFinalizationFailed {
        /// Description of the failure
        message: String,
    },
}
