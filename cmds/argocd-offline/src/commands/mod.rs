pub mod appset;

pub mod util;
