mod line;
mod plane;

pub use line::*;
pub use plane::*;
