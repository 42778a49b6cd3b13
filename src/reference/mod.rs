// Reference datasets: record types, the startup loader and the join indexes.

pub mod index;
pub mod records;
pub mod store;
