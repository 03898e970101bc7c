/// Compile-target description. The front-end only consumes the pointer
/// width (for `usize`/`isize` and pointer/reference layout).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub triple: String,
    pub ptr_width: u8,
}

impl Target {
    pub fn host() -> Target {
        Target {
            triple: host_triple(),
            ptr_width: (usize::BITS / 8) as u8,
        }
    }

    /// Parses a descriptor; unknown architectures default to 64-bit.
    pub fn from_triple(triple: &str) -> Target {
        let arch = triple.split('-').next().unwrap_or("");
        let ptr_width = match arch {
            "i386" | "i586" | "i686" | "arm" | "armv7" | "thumbv7" | "riscv32" | "wasm32"
            | "mips" | "powerpc" => 4,
            _ => 8,
        };
        Target {
            triple: triple.to_string(),
            ptr_width,
        }
    }
}

fn host_triple() -> String {
    format!(
        "{}-unknown-{}",
        std::env::consts::ARCH,
        std::env::consts::OS
    )
}
