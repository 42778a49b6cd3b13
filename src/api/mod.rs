// Entry points for front ends.

pub mod simple;
