#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error when performing I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("Program image is {0} bytes, not a multiple of the 4-byte instruction word")]
    WordSize(usize),
    #[error("Error when parsing program listing: {0}")]
    Parse(String),
    #[error("Fetch past the end of the program store at pc {0}")]
    Fetch(u32),
    #[error("Port never became ready: {cycles} stall cycles at pc {pc}")]
    StallTimeout { pc: u32, cycles: u32 },
    #[error("No interrupt after {0} cycles")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, Error>;
