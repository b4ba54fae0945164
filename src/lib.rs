pub mod capture;
pub mod cli;
pub mod detector;
pub mod model;
pub mod pipeline;
pub mod sink;
