pub mod checkpoint;
pub mod company;
pub mod job;
