//! Target machine interface.
//!
//! The compiler consumes exactly two properties of a target: the LLVM
//! triple written into the module prologue, and the native register width
//! that `int`/`uint` and array indexing default to.

/// A compilation target.
pub trait TargetMachine {
    /// The LLVM triple the target uses.
    fn llvm_target_triple(&self) -> &'static str;

    /// The native width of machine registers in bits.
    ///
    /// This is used for the default int size and the default array index
    /// type. Only 32 and 64 are meaningful.
    fn default_int_bit_width(&self) -> u32;
}

/// x86-64 Linux, the default development target.
#[allow(non_camel_case_types)]
pub struct X86_64Linux;

impl TargetMachine for X86_64Linux {
    fn llvm_target_triple(&self) -> &'static str {
        "x86_64-pc-linux-gnu"
    }

    fn default_int_bit_width(&self) -> u32 {
        64
    }
}

/// Returns the target matching the host platform.
///
/// # Panics
///
/// Panics on platforms no target table entry exists for.
pub fn native_target() -> Box<dyn TargetMachine> {
    if cfg!(target_os = "linux") {
        Box::new(X86_64Linux)
    } else {
        panic!("unknown platform");
    }
}
