pub mod tus_options;

pub use tus_options::tus_options_middleware;
