pub mod crypt;
pub mod digits;
pub mod info;
pub mod keygen;
pub mod search;
pub mod stats;
pub mod verify;

pub use crypt::*;
pub use digits::*;
pub use info::*;
pub use keygen::*;
pub use search::*;
pub use stats::*;
pub use verify::*;
