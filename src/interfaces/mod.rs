//! Outer surfaces: the console front end and the CSV catalog fixture reader.

pub mod console;
pub mod csv;
