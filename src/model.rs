pub mod active_path;
pub mod fifo;
pub mod position;
pub mod rows;
pub mod tree;
